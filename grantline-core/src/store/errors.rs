/*
    errors.rs - Error types for the store gateway and its backends

    Not-found is deliberately absent: a missing entity is a normal load
    outcome (`LoadOutcome::NotFound`), never an error.
*/

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Entity could not be constructed (bad name)
    #[error("Invalid entity: {0}")]
    Invalid(#[from] crate::model::ModelError),

    /// Stored record does not describe the requested entity
    #[error("Corrupted record {key}: {reason}")]
    Corrupted { key: String, reason: String },

    /// Backend did not answer within the operation timeout
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The task carrying the operation went away without reporting
    #[error("Operation abandoned before completion")]
    Abandoned,

    /// No async runtime to schedule store work on
    #[error("No async runtime available: {0}")]
    Runtime(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "Operation timed out after 2s");

        let err = StoreError::Corrupted {
            key: "groups/admin".to_string(),
            reason: "name mismatch".to_string(),
        };
        assert!(err.to_string().contains("groups/admin"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
