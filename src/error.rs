//! Error types for the exposure probe

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the exposure probe
#[derive(Error, Debug)]
pub enum Error {
    // Origin errors
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    // Execution context errors
    #[error("Execution context closed: {0}")]
    ContextClosed(String),

    // Cross-context transport errors
    #[error("Message post failed: {0}")]
    Transport(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Check if this error happened while moving a report between contexts
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Error::ContextClosed(_)
                | Error::Transport(_)
                | Error::Serialization(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from url parse errors
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidOrigin(e.to_string())
    }
}
