use thiserror::Error;

/// Errors that can occur when building or publishing events.
#[derive(Debug, Error)]
pub enum EventError {
    /// A required envelope field was not set on the builder.
    #[error("Missing envelope field: {0}")]
    MissingField(&'static str),

    /// The message bus rejected or could not accept the event.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event operations.
pub type Result<T> = std::result::Result<T, EventError>;
