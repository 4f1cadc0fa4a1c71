// lib/src/services/identity_service.rs
//! Accounts, password hashing and bearer tokens.

use std::sync::Arc;
use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use models::errors::{HospitalError, HospitalResult, ValidationError};
use models::medical::{
    validate_account_fields, Doctor, NewDoctor, NewPatient, NewUser, Patient, Role, User,
};
use models::views::AccountView;
use crate::config::{resolve_jwt_secret, HospitalConfig, DEFAULT_BCRYPT_COST, DEFAULT_TOKEN_TTL_DAYS};
use crate::storage_engine::HospitalStorage;

pub const NO_TOKEN: &str = "Not authorized, no token";
pub const TOKEN_FAILED: &str = "Not authorized, token failed";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    pub fn from_config(config: &HospitalConfig) -> HospitalResult<Self> {
        Ok(AuthSettings {
            jwt_secret: resolve_jwt_secret(config)?,
            token_ttl_days: config.auth.token_ttl_days,
            bcrypt_cost: config.auth.bcrypt_cost,
        })
    }

    pub fn with_secret(secret: &str) -> Self {
        AuthSettings {
            jwt_secret: secret.to_string(),
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// bcrypt on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        PasswordHasher { cost }
    }

    pub async fn hash(&self, password: &str) -> HospitalResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| HospitalError::InternalError(format!("Password hashing task failed: {}", e)))?
            .map_err(|_| HospitalError::Validation(ValidationError::PasswordHashingFailed))
    }

    /// A malformed stored hash counts as a mismatch.
    pub async fn verify(&self, password: &str, hash: &str) -> HospitalResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| HospitalError::InternalError(format!("Password check task failed: {}", e)))?;
        Ok(verified.unwrap_or(false))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: i64,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

pub struct IdentityService {
    storage: Arc<dyn HospitalStorage>,
    hasher: PasswordHasher,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl IdentityService {
    pub fn new(storage: Arc<dyn HospitalStorage>, settings: &AuthSettings) -> Self {
        IdentityService {
            storage,
            hasher: PasswordHasher::new(settings.bcrypt_cost),
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            token_ttl: Duration::days(settings.token_ttl_days),
        }
    }

    pub fn hasher(&self) -> PasswordHasher {
        self.hasher
    }

    /// Creates the account and, for patients and doctors, an empty profile.
    /// No token is issued; the caller logs in separately.
    pub async fn register(&self, registration: Registration) -> HospitalResult<User> {
        validate_account_fields(&registration.name, &registration.email, &registration.password)?;
        let role = Role::from_email(&registration.email);
        let password_hash = self.hasher.hash(&registration.password).await?;

        let mut tx = self.storage.begin().await?;
        if tx.find_user_by_email(&registration.email).await?.is_some() {
            return Err(HospitalError::Conflict("User already exists".to_string()));
        }
        let user = tx
            .insert_user(NewUser {
                name: registration.name,
                email: registration.email,
                password_hash,
                phone: registration.phone,
                role,
            })
            .await?;
        match role {
            Role::Patient => {
                tx.insert_patient(NewPatient { user_id: user.id, dob: registration.dob, gender: registration.gender })
                    .await?;
            }
            Role::Doctor => {
                tx.insert_doctor(NewDoctor { user_id: user.id, ..Default::default() }).await?;
            }
            Role::Admin => {}
        }
        tx.commit().await?;
        info!("Registered user {} as {}", user.id, role);
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> HospitalResult<Session> {
        let mut tx = self.storage.begin().await?;
        let credentials = tx.find_user_by_email(email).await?;
        drop(tx);

        let credentials = match credentials {
            Some(credentials) => credentials,
            None => {
                debug!("Login attempt for unknown e-mail");
                return Err(HospitalError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };
        if !self.hasher.verify(password, &credentials.password_hash).await? {
            warn!("Failed login for user {}", credentials.user.id);
            return Err(HospitalError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        let token = self.issue_token(credentials.user.id)?;
        Ok(Session { user: credentials.user, token })
    }

    pub fn issue_token(&self, user_id: i64) -> HospitalResult<String> {
        let now = Utc::now();
        let claims = Claims { id: user_id, iat: now.timestamp(), exp: (now + self.token_ttl).timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| HospitalError::InternalError(format!("Failed to sign token: {}", e)))
    }

    /// Resolves a bearer token to its user.
    pub async fn authenticate(&self, token: Option<&str>) -> HospitalResult<User> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| HospitalError::Unauthorized(NO_TOKEN.to_string()))?;
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256)).map_err(|e| {
            debug!("Rejected token: {}", e);
            HospitalError::Unauthorized(TOKEN_FAILED.to_string())
        })?;

        let mut tx = self.storage.begin().await?;
        tx.get_user(data.claims.id)
            .await?
            .ok_or_else(|| HospitalError::Unauthorized(TOKEN_FAILED.to_string()))
    }

    pub fn authorize(&self, user: &User, role: Role) -> HospitalResult<()> {
        if user.role != role {
            return Err(HospitalError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                user.role
            )));
        }
        Ok(())
    }

    pub async fn patient_profile(&self, user: &User) -> HospitalResult<Patient> {
        let mut tx = self.storage.begin().await?;
        tx.find_patient_by_user(user.id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Patient profile not found".to_string()))
    }

    pub async fn doctor_profile(&self, user: &User) -> HospitalResult<Doctor> {
        let mut tx = self.storage.begin().await?;
        tx.find_doctor_by_user(user.id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Doctor profile not found".to_string()))
    }

    pub async fn account(&self, user: &User) -> HospitalResult<AccountView> {
        let mut tx = self.storage.begin().await?;
        let fresh = tx
            .get_user(user.id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("User not found".to_string()))?;
        let patient = tx.find_patient_by_user(user.id).await?;
        let doctor = tx.find_doctor_by_user(user.id).await?;
        Ok(AccountView { user: fresh, patient, doctor })
    }
}
