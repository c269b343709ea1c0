//! Domain-specific error types for wcag-mend

use thiserror::Error;

/// Main error type for the wcag-mend service
#[derive(Error, Debug)]
pub enum MendError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<anyhow::Error> for MendError {
    fn from(err: anyhow::Error) -> Self {
        MendError::Internal {
            message: err.to_string(),
        }
    }
}

/// Result type alias for wcag-mend operations
pub type Result<T> = std::result::Result<T, MendError>;
