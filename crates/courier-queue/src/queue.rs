//! Job queue over the durable store.

use crate::{validate_body, validate_recipient, QueueResult};
use chrono::{DateTime, Utc};
use courier_database::{Database, Job, JobCounts, JobState, NewJob};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Retry and locking parameters stamped onto every job at enqueue time.
#[derive(Debug, Clone)]
pub struct QueuePolicy {
    /// Total attempt budget per job.
    pub max_attempts: i32,
    /// Base delay of the exponential retry schedule.
    pub backoff_base: chrono::Duration,
    /// How long a claim protects a job from being claimed again.
    pub lock_duration: chrono::Duration,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: chrono::Duration::seconds(2),
            lock_duration: chrono::Duration::seconds(60),
        }
    }
}

impl QueuePolicy {
    pub fn from_config(config: &courier_core::Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base: chrono::Duration::milliseconds(config.backoff_base_ms as i64),
            lock_duration: chrono::Duration::milliseconds(config.lock_duration_ms as i64),
        }
    }
}

/// Per-job overrides accepted by [`JobQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Hold the job back this long before it becomes eligible.
    pub delay: Option<chrono::Duration>,
    /// Attempt budget for this job; defaults to the queue policy.
    pub max_attempts: Option<i32>,
}

/// Durable message queue.
///
/// Producers call [`submit`](JobQueue::submit); the dispatcher loop drives
/// [`claim_next`](JobQueue::claim_next) /
/// [`complete`](JobQueue::complete) / [`fail`](JobQueue::fail).
#[derive(Clone)]
pub struct JobQueue {
    db: Arc<Database>,
    policy: QueuePolicy,
}

impl JobQueue {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_policy(db, QueuePolicy::default())
    }

    pub fn with_policy(db: Arc<Database>, policy: QueuePolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Validate and enqueue an outbound message.
    ///
    /// A `scheduled_at` in the past (or absent) means dispatch as soon as
    /// possible; the schedule is clamped to now rather than rejected.
    pub fn submit(
        &self,
        recipient: &str,
        body: &str,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> QueueResult<Job> {
        let now = Utc::now();
        let scheduled_at = match scheduled_at {
            Some(at) if at > now => at,
            _ => now,
        };
        self.insert_validated(recipient, body, scheduled_at, now, self.policy.max_attempts)
    }

    /// Producer API underneath [`submit`](Self::submit), with per-job
    /// overrides.
    pub fn enqueue(
        &self,
        recipient: &str,
        body: &str,
        options: EnqueueOptions,
    ) -> QueueResult<Job> {
        let now = Utc::now();
        let scheduled_at = match options.delay {
            Some(delay) if delay > chrono::Duration::zero() => now + delay,
            _ => now,
        };
        let max_attempts = options.max_attempts.unwrap_or(self.policy.max_attempts);
        self.insert_validated(recipient, body, scheduled_at, now, max_attempts)
    }

    fn insert_validated(
        &self,
        recipient: &str,
        body: &str,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> QueueResult<Job> {
        validate_recipient(recipient)?;
        validate_body(body)?;

        let new_job = NewJob {
            id: Uuid::new_v4().to_string(),
            recipient: recipient.to_string(),
            body: body.to_string(),
            scheduled_at,
            max_attempts,
            backoff_base_ms: self.policy.backoff_base.num_milliseconds(),
        };

        let job = self.db.insert_job(&new_job, now)?;
        info!(
            job_id = %job.id,
            state = job.state.as_str(),
            scheduled_at = %job.scheduled_at,
            "Message enqueued"
        );
        Ok(job)
    }

    /// Claim the next due job, locking it for this consumer.
    pub fn claim_next(&self) -> QueueResult<Option<Job>> {
        Ok(self
            .db
            .claim_next_job(Utc::now(), self.policy.lock_duration)?)
    }

    /// Mark a claimed job as sent.
    pub fn complete(&self, id: &str) -> QueueResult<()> {
        self.db.complete_job(id, Utc::now())?;
        info!(job_id = %id, "Message sent");
        Ok(())
    }

    /// Record a failed attempt; schedules a retry or fails terminally.
    pub fn fail(&self, id: &str, error: &str) -> QueueResult<Job> {
        let job = self.db.fail_job(id, error, Utc::now())?;
        Ok(job)
    }

    /// Look up a job by ID.
    pub fn get(&self, id: &str) -> QueueResult<Option<Job>> {
        Ok(self.db.get_job(id)?)
    }

    /// Per-state job counts.
    pub fn counts(&self) -> QueueResult<JobCounts> {
        Ok(self.db.count_jobs_by_state()?)
    }

    /// Recently failed jobs, newest first. Terminal failures stay in the
    /// store (up to the retention cap) so they can be inspected.
    pub fn failed_jobs(&self, limit: usize) -> QueueResult<Vec<Job>> {
        Ok(self.db.list_jobs_in_state(JobState::Failed, limit)?)
    }
}
