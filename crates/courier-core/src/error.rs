//! Core error types.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum CoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path resolution error
    #[error("Path error: {0}")]
    Path(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
