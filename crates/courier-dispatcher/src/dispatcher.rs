//! Dispatcher worker loop.

use crate::{DispatchPacer, Humanizer, HumanizerConfig};
use courier_database::JobState;
use courier_queue::JobQueue;
use courier_session::MessageSender;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Dispatcher error type.
#[derive(Error, Debug)]
pub enum DispatcherError {
    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Worker loop timing.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Minimum interval between dispatch starts.
    pub min_spacing: Duration,
    /// How long to idle when the queue has nothing due.
    pub poll_interval: Duration,
    /// How long to back off after a store error before polling again.
    pub store_retry_delay: Duration,
    /// Budget for one humanized send, jitter included.
    pub transport_timeout: Duration,
    /// Claim lock duration. Must match the queue policy's lock so the
    /// validation below actually protects the claimed job.
    pub lock_duration: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            store_retry_delay: Duration::from_secs(5),
            transport_timeout: Duration::from_secs(30),
            lock_duration: Duration::from_secs(60),
        }
    }
}

impl DispatcherConfig {
    pub fn from_config(config: &courier_core::Config) -> Self {
        Self {
            min_spacing: config.send_spacing(),
            lock_duration: config.lock_duration(),
            ..Self::default()
        }
    }

    /// Reject a lock that a single attempt could outlive. If the lock
    /// expired mid-attempt, a second consumer could claim the job while
    /// the first is still sending.
    pub fn validate(&self, humanizer: &HumanizerConfig) -> Result<(), DispatcherError> {
        let worst_case = humanizer.jitter_max + self.transport_timeout;
        if self.lock_duration <= worst_case {
            return Err(DispatcherError::Config(format!(
                "Lock duration {:?} must exceed max jitter + transport timeout ({:?})",
                self.lock_duration, worst_case
            )));
        }
        Ok(())
    }
}

/// Single-concurrency dispatch loop.
///
/// One claimed job at a time; the pacer spaces dispatch starts. A failed
/// attempt is recorded against the job and the loop moves on. Store errors
/// pause the loop briefly instead of killing it.
pub struct Dispatcher {
    queue: JobQueue,
    sender: Arc<dyn MessageSender>,
    config: DispatcherConfig,
    humanizer: Humanizer,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        queue: JobQueue,
        sender: Arc<dyn MessageSender>,
        config: DispatcherConfig,
        humanizer_config: HumanizerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, DispatcherError> {
        config.validate(&humanizer_config)?;
        Ok(Self {
            queue,
            sender,
            config,
            humanizer: Humanizer::new(humanizer_config),
            shutdown,
        })
    }

    /// Run until shutdown. Shutdown is observed between dispatches; an
    /// in-flight attempt always runs to its own completion or timeout.
    pub async fn run(mut self) {
        let mut pacer = DispatchPacer::new(self.config.min_spacing);
        info!("Dispatcher started");

        while !*self.shutdown.borrow() {
            tokio::select! {
                _ = pacer.acquire() => {}
                result = self.shutdown.changed() => {
                    // A dropped sender means the embedding process is
                    // gone; treat it like a shutdown signal.
                    if result.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match self.queue.claim_next() {
                Ok(Some(job)) => self.dispatch(job).await,
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(err) => {
                    warn!(error = %err, "Job claim failed, backing off");
                    tokio::time::sleep(self.config.store_retry_delay).await;
                }
            }
        }

        info!("Dispatcher stopped");
    }

    async fn dispatch(&self, job: courier_database::Job) {
        info!(job_id = %job.id, attempt = job.attempts + 1, "Dispatching message");

        let outcome = tokio::time::timeout(
            self.config.transport_timeout,
            self.humanizer
                .run(self.sender.as_ref(), &job.recipient, &job.body),
        )
        .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some(format!(
                "Send timed out after {}ms",
                self.config.transport_timeout.as_millis()
            )),
        };

        match failure {
            None => {
                if let Err(err) = self.queue.complete(&job.id) {
                    // Lock expiry makes the job claimable again; worst
                    // case is a duplicate send, not a lost job.
                    warn!(job_id = %job.id, error = %err, "Failed to record completion");
                }
            }
            Some(reason) => {
                warn!(job_id = %job.id, error = %reason, "Dispatch attempt failed");
                match self.queue.fail(&job.id, &reason) {
                    Ok(updated) if updated.state == JobState::Failed => {
                        error!(
                            job_id = %job.id,
                            attempts = updated.attempts,
                            "Job failed terminally"
                        );
                    }
                    Ok(updated) => {
                        debug!(
                            job_id = %job.id,
                            attempts = updated.attempts,
                            retry_at = %updated.scheduled_at,
                            "Retry scheduled"
                        );
                    }
                    Err(err) => {
                        warn!(job_id = %job.id, error = %err, "Failed to record failure");
                    }
                }
            }
        }
    }
}
