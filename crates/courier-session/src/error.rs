//! Session error types.

use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// An operation that requires an open session ran without one
    #[error("Not connected")]
    NotConnected,

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] courier_transport::TransportError),

    /// The control loop is gone; the manager was stopped
    #[error("Session control loop is not running")]
    ControlLoopStopped,

    /// Credentials could not be persisted or removed
    #[error("Credentials store error: {0}")]
    CredentialsStore(String),
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
