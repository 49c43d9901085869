use thiserror::Error;

/// Error returned when a raw identifier string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind}: '{value}'")]
pub struct IdError {
    /// The kind of identifier (e.g. "user id").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl IdError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
