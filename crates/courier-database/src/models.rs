//! Job store model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job lifecycle state.
///
/// Valid transitions: `Waiting`/`Delayed` → `Active` → `Completed`,
/// `Delayed` (retry scheduled) or `Failed`. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Eligible for dispatch now.
    Waiting,
    /// Scheduled for a future dispatch (initial delay or retry backoff).
    Delayed,
    /// Claimed by the dispatcher, protected by its lock.
    Active,
    /// Sent successfully.
    Completed,
    /// Exhausted all attempts.
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Delayed => "delayed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "delayed" => Self::Delayed,
            "active" => Self::Active,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Waiting,
        }
    }

    /// True for states that will never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Job record - one outbound message and its retry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub recipient: String,
    pub body: String,
    pub state: JobState,
    /// Not eligible for dispatch before this time.
    pub scheduled_at: DateTime<Utc>,
    /// Dispatch attempts made so far.
    pub attempts: i32,
    /// Immutable attempt budget set at enqueue time.
    pub max_attempts: i32,
    /// Base delay of the exponential retry schedule, in milliseconds.
    pub backoff_base_ms: i64,
    /// While set and in the future, no other consumer may claim the job.
    pub lock_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for inserting a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub recipient: String,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
}

/// Per-state job counts, for inspection and housekeeping decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: i64,
    pub delayed: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Computes the exponential retry delay for the n-th failed attempt.
///
/// `delay = base * 2^(attempt - 1)`, saturating instead of overflowing.
/// Attempt counts at or below zero yield a zero delay.
pub fn exponential_backoff(base_ms: i64, attempt: i32) -> chrono::Duration {
    if attempt <= 0 || base_ms <= 0 {
        return chrono::Duration::zero();
    }

    let shift = attempt.saturating_sub(1) as u32;
    let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    let delay_ms = (base_ms as u64)
        .saturating_mul(multiplier)
        .min(i64::MAX as u64);

    chrono::Duration::milliseconds(delay_ms as i64)
}
