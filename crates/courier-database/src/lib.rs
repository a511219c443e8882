//! Durable job store for outbound message dispatch.
//!
//! This crate provides:
//! - Database: SQLite-backed job store with atomic state transitions
//! - Job / JobState: job records and their lifecycle states
//! - Retention sweeps for completed and terminally failed jobs

mod db;
mod error;
mod migrations;
mod models;

pub use db::Database;
pub use error::{DatabaseError, DatabaseResult};
pub use models::{exponential_backoff, Job, JobCounts, JobState, NewJob};
