// Error types module
use thiserror::Error;

/// Main error type for the TempoDB maintenance scheduler.
///
/// The first five variants form the taxonomy surfaced by the job
/// administration API and the policy executors. `Storage` and
/// `SerializationError` carry failures bubbling up from the key/value layer.
#[derive(Error, Debug)]
pub enum TempoDbError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("object not found: {0}")]
    UndefinedObject(String),

    #[error("insufficient privilege: {0}")]
    InsufficientPrivilege(String),

    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type used throughout the scheduler crates.
pub type Result<T> = std::result::Result<T, TempoDbError>;

impl TempoDbError {
    /// Create an invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        TempoDbError::InvalidParameter(msg.into())
    }

    /// Create an undefined object error
    pub fn undefined_object<S: Into<String>>(msg: S) -> Self {
        TempoDbError::UndefinedObject(msg.into())
    }

    /// Create an insufficient privilege error
    pub fn insufficient_privilege<S: Into<String>>(msg: S) -> Self {
        TempoDbError::InsufficientPrivilege(msg.into())
    }

    /// Create a feature not supported error
    pub fn feature_not_supported<S: Into<String>>(msg: S) -> Self {
        TempoDbError::FeatureNotSupported(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        TempoDbError::Internal(msg.into())
    }
}

impl From<serde_json::Error> for TempoDbError {
    fn from(err: serde_json::Error) -> Self {
        TempoDbError::SerializationError(err.to_string())
    }
}
