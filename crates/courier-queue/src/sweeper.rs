//! Retention sweeper for terminal jobs.

use chrono::Utc;
use courier_database::Database;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// How many terminal jobs to keep around, and for how long.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Keep at most this many completed jobs.
    pub completed_keep: usize,
    /// Purge completed jobs older than this regardless of count.
    pub completed_max_age: chrono::Duration,
    /// Keep at most this many failed jobs for inspection.
    pub failed_keep: usize,
    /// How often the sweep runs.
    pub interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_keep: 100,
            completed_max_age: chrono::Duration::hours(24),
            failed_keep: 500,
            interval: Duration::from_secs(60),
        }
    }
}

/// Spawn the background sweep loop.
///
/// Runs until the shutdown signal flips to `true`. Sweep errors are logged
/// and the loop keeps going; retention is housekeeping, not correctness.
pub fn spawn_sweeper(
    db: Arc<Database>,
    policy: RetentionPolicy,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(policy.interval) => {
                    run_sweep(&db, &policy);
                }
                result = shutdown.changed() => {
                    // A closed channel counts as shutdown too
                    if result.is_err() || *shutdown.borrow() {
                        debug!("Retention sweeper stopping");
                        break;
                    }
                }
            }
        }
    })
}

fn run_sweep(db: &Database, policy: &RetentionPolicy) {
    let now = Utc::now();

    match db.sweep_completed(policy.completed_keep, policy.completed_max_age, now) {
        Ok(purged) if purged > 0 => debug!(purged, "Purged completed jobs"),
        Ok(_) => {}
        Err(err) => error!(error = %err, "Completed-job sweep failed"),
    }

    match db.sweep_failed(policy.failed_keep) {
        Ok(purged) if purged > 0 => debug!(purged, "Purged failed jobs"),
        Ok(_) => {}
        Err(err) => error!(error = %err, "Failed-job sweep failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobQueue;

    fn completed_jobs(queue: &JobQueue, n: usize) {
        for i in 0..n {
            let job = queue
                .submit("081234567890", &format!("message {}", i), None)
                .unwrap();
            queue.claim_next().unwrap().unwrap();
            queue.complete(&job.id).unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_on_interval() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let queue = JobQueue::new(db.clone());
        completed_jobs(&queue, 5);

        let policy = RetentionPolicy {
            completed_keep: 2,
            completed_max_age: chrono::Duration::hours(24),
            failed_keep: 500,
            interval: Duration::from_secs(60),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_sweeper(db.clone(), policy, shutdown_rx);

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(db.count_jobs_by_state().unwrap().completed, 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_shutdown() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_sweeper(db, RetentionPolicy::default(), shutdown_rx);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_exits_when_shutdown_sender_dropped() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_sweeper(db, RetentionPolicy::default(), shutdown_rx);

        drop(shutdown_tx);

        // Must exit instead of spinning on the closed channel
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper kept running after its shutdown channel closed")
            .unwrap();
    }

    #[test]
    fn sweep_enforces_both_retention_rules() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let queue = JobQueue::new(db.clone());
        completed_jobs(&queue, 3);

        let policy = RetentionPolicy {
            completed_keep: 1,
            ..RetentionPolicy::default()
        };
        run_sweep(&db, &policy);

        assert_eq!(db.count_jobs_by_state().unwrap().completed, 1);
    }
}
