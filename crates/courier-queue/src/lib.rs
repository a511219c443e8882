//! Durable outbound message queue.
//!
//! Wraps the job store with enqueue validation, claim/complete/fail
//! transitions under a single-consumer lock, and the retention sweeper that
//! keeps terminal jobs from accumulating forever.

mod error;
mod queue;
mod sweeper;
mod validate;

pub use error::{QueueError, QueueResult};
pub use queue::{EnqueueOptions, JobQueue, QueuePolicy};
pub use sweeper::{spawn_sweeper, RetentionPolicy};
pub use validate::{validate_body, validate_recipient, MAX_BODY_LEN};
