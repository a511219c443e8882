//! Single-concurrency message dispatcher.
//!
//! Pulls jobs from the durable queue one at a time, paces dispatch starts
//! so sends never burst, and wraps each send in a humanized presence
//! sequence. Send failures feed the queue's retry machinery; nothing a job
//! does can take the loop down.

mod dispatcher;
mod humanizer;
mod pacer;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherError};
pub use humanizer::{Humanizer, HumanizerConfig};
pub use pacer::DispatchPacer;
