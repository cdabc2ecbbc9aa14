//! Error types for graphkb.

use thiserror::Error;

/// Result type alias using graphkb's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for graphkb operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-bounds input (empty input path, unknown mode).
    #[error("Validation error: {0}")]
    Validation(String),

    /// LLM configuration would be left unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The resolved LLM endpoint could not be reached or answered with an error.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A pipeline stage failed.
    #[error("Stage '{stage}' failed: {message}")]
    StageExecution { stage: String, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Graph or vector store write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a stage failure from any displayable cause.
    pub fn stage(stage: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::StageExecution {
            stage: stage.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Connectivity(format!("request timed out: {}", e))
        } else {
            Error::Connectivity(e.to_string())
        }
    }
}
