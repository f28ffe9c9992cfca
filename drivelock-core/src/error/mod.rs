pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported document version {found} (latest supported is {supported})")]
    UnsupportedVersion { found: u64, supported: u64 },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Password does not meet policy: {}", .0.join("; "))]
    PolicyViolation(Vec<String>),

    #[error("Invalid one-time passcode: {0}")]
    InvalidOtp(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password was used recently")]
    PasswordReused,

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("use_security must be used within a security provider")]
    MissingProvider,
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Policy violation messages, if this is a policy validation failure.
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            Error::Validation(ValidationError::PolicyViolation(messages)) => Some(messages.as_slice()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
