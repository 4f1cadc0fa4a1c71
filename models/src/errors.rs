// models/src/errors.rs
// Error taxonomy shared by the storage engines, the services and the HTTP layer.

use std::io;
pub use thiserror::Error;
use serde::{Serialize, Deserialize};
use serde_json::Error as SerdeJsonError;

#[derive(Debug, Serialize, Deserialize, Error, Clone, PartialEq)]
pub enum HospitalError {
    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("{0}")]
    NotFound(String),
    /// Duplicate registration, double booking, duplicate catalog/unique key.
    #[error("{0}")]
    Conflict(String),
    /// Role or ownership mismatch.
    #[error("{0}")]
    Forbidden(String),
    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),
    /// Illegal status transition.
    #[error("{0}")]
    InvalidState(String),
    /// Missing required input (e.g. no uploaded file).
    #[error("{0}")]
    BadInput(String),
    #[error("Validation error: {0}")]
    Validation(ValidationError),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),
}

impl HospitalError {
    /// True for the client-facing variants that carry a message meant for the caller.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HospitalError::NotFound(_)
                | HospitalError::Conflict(_)
                | HospitalError::Forbidden(_)
                | HospitalError::Unauthorized(_)
                | HospitalError::InvalidState(_)
                | HospitalError::BadInput(_)
                | HospitalError::Validation(_)
        )
    }
}

impl From<SerdeJsonError> for HospitalError {
    fn from(err: SerdeJsonError) -> Self {
        HospitalError::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<io::Error> for HospitalError {
    fn from(err: io::Error) -> Self {
        HospitalError::Io(err.to_string())
    }
}

impl From<ValidationError> for HospitalError {
    fn from(err: ValidationError) -> Self {
        HospitalError::Validation(err)
    }
}

#[derive(Debug, Serialize, Deserialize, Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(String),
    #[error("please include a valid email")]
    InvalidEmail,
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("password hashing failed")]
    PasswordHashingFailed,
    #[error("invalid date format: {0} (expected YYYY-MM-DD)")]
    InvalidDateFormat(String),
    #[error("invalid time format: {0} (expected HH:MM or HH:MM:SS)")]
    InvalidTimeFormat(String),
    #[error("invalid {field} value: {value}")]
    InvalidEnumValue { field: String, value: String },
    #[error("{0} must not be negative")]
    NegativeAmount(String),
}

/// A type alias for a `Result` that returns a `HospitalError` on failure.
pub type HospitalResult<T> = Result<T, HospitalError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;
