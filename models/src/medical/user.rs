// models/src/medical/user.rs
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::errors::{ValidationError, ValidationResult};

pub const MIN_PASSWORD_LENGTH: usize = 6;

const DOCTOR_EMAIL_SUFFIX: &str = "@doctor.com";
const ADMIN_EMAIL_SUFFIX: &str = "@admin.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

impl Role {
    /// Role is fixed at registration from the e-mail domain suffix.
    /// The comparison is case-sensitive, matching the stored address verbatim.
    pub fn from_email(email: &str) -> Self {
        if email.ends_with(DOCTOR_EMAIL_SUFFIX) {
            Role::Doctor
        } else if email.ends_with(ADMIN_EMAIL_SUFFIX) {
            Role::Admin
        } else {
            Role::Patient
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(ValidationError::InvalidEnumValue {
                field: "role".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A user account as exposed to callers. The password hash never leaves storage
/// except through [`UserCredentials`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Name / e-mail / password checks applied before any account is created.
pub fn validate_account_fields(name: &str, email: &str, password: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingField("name".to_string()));
    }
    validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(ValidationError::InvalidEmail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_follows_email_domain_suffix() {
        assert_eq!(Role::from_email("house@doctor.com"), Role::Doctor);
        assert_eq!(Role::from_email("root@admin.com"), Role::Admin);
        assert_eq!(Role::from_email("jane@example.com"), Role::Patient);
        // suffix must match exactly, including case
        assert_eq!(Role::from_email("house@Doctor.com"), Role::Patient);
        assert_eq!(Role::from_email("doctor.com@example.com"), Role::Patient);
    }

    #[test]
    fn role_parses_its_own_labels() {
        for role in [Role::Admin, Role::Doctor, Role::Patient] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn account_validation() {
        assert!(validate_account_fields("Jane", "jane@example.com", "secret1").is_ok());
        assert_eq!(
            validate_account_fields(" ", "jane@example.com", "secret1"),
            Err(ValidationError::MissingField("name".into()))
        );
        assert_eq!(
            validate_account_fields("Jane", "jane.example.com", "secret1"),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(
            validate_account_fields("Jane", "jane@example.com", "123"),
            Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LENGTH))
        );
    }
}
