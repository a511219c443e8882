//! Transport error types.

use thiserror::Error;

/// Transport error type.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection attempt failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Send failed on a live connection
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Operation attempted on a connection that is already gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// Credentials were rejected by the server
    #[error("Credentials rejected: {0}")]
    CredentialsRejected(String),

    /// Operation timed out
    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;
