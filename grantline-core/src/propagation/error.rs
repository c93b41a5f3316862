use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropagationError {
    #[error("Messaging service '{service}' failed to publish: {reason}")]
    Publish {
        service: &'static str,
        reason: String,
    },

    #[error("Failed to encode update signal: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("No async runtime available: {0}")]
    Runtime(String),
}
