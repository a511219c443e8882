//! Queue error types.

use thiserror::Error;

/// Queue error type.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Enqueue input was rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Underlying job store error
    #[error(transparent)]
    Database(#[from] courier_database::DatabaseError),
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;
