//! Database connection and job store operations.
//!
//! State-changing operations take `now` as a parameter so the retry and
//! locking behavior can be tested against fixed instants; production callers
//! pass `Utc::now()`.

use crate::{exponential_backoff, migrations, DatabaseError, DatabaseResult};
use crate::{Job, JobCounts, JobState, NewJob};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Job store wrapper with query methods.
///
/// The connection sits behind a mutex so an `Arc<Database>` can be shared
/// between the producer side and the dispatcher loop.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode and performance pragmas
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new job.
    ///
    /// The initial state is `Waiting` when the job is already eligible and
    /// `Delayed` when `scheduled_at` lies in the future.
    pub fn insert_job(&self, job: &NewJob, now: DateTime<Utc>) -> DatabaseResult<Job> {
        let state = if job.scheduled_at <= now {
            JobState::Waiting
        } else {
            JobState::Delayed
        };

        {
            let conn = self.conn.lock().expect("lock poisoned");
            conn.execute(
                "INSERT INTO jobs (id, recipient, body, state, scheduled_at, attempts,
                                   max_attempts, backoff_base_ms, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?8)",
                params![
                    job.id,
                    job.recipient,
                    job.body,
                    state.as_str(),
                    fmt_ts(&job.scheduled_at),
                    job.max_attempts,
                    job.backoff_base_ms,
                    fmt_ts(&now),
                ],
            )?;
        }

        self.get_job(&job.id)?
            .ok_or_else(|| DatabaseError::NotFound("Job not found after insert".to_string()))
    }

    /// Get a job by ID.
    pub fn get_job(&self, id: &str) -> DatabaseResult<Option<Job>> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, recipient, body, state, scheduled_at, attempts, max_attempts,
                    backoff_base_ms, lock_until, last_error, created_at, updated_at
             FROM jobs WHERE id = ?1",
        )?;

        let result = stmt.query_row(params![id], job_from_row).optional()?;
        Ok(result)
    }

    /// Atomically claim the next eligible job.
    ///
    /// Any `active` row whose lock has expired (crashed worker) is first
    /// reset to `waiting`, so no stale `active` row can outlive its lock.
    /// Then the oldest due job (`scheduled_at <= now`, no unexpired lock)
    /// is marked `Active` with `lock_until = now + lock_duration`.
    ///
    /// Returns `None` when nothing is due, or while another job holds an
    /// unexpired lock: at most one job is live at any instant.
    pub fn claim_next_job(
        &self,
        now: DateTime<Utc>,
        lock_duration: chrono::Duration,
    ) -> DatabaseResult<Option<Job>> {
        let lock_until = now + lock_duration;

        let conn = self.conn.lock().expect("lock poisoned");

        let released = conn.execute(
            "UPDATE jobs
                SET state = 'waiting', lock_until = NULL, updated_at = ?1
              WHERE state = 'active' AND lock_until <= ?1",
            params![fmt_ts(&now)],
        )?;
        if released > 0 {
            debug!(released, "Released expired job locks");
        }

        let mut stmt = conn.prepare(
            "UPDATE jobs
                SET state = 'active', lock_until = ?2, updated_at = ?1
              WHERE id = (
                    SELECT id FROM jobs
                     WHERE state IN ('waiting', 'delayed')
                       AND scheduled_at <= ?1
                       AND (lock_until IS NULL OR lock_until <= ?1)
                     ORDER BY scheduled_at ASC, created_at ASC
                     LIMIT 1
                    )
                AND NOT EXISTS (
                    SELECT 1 FROM jobs
                     WHERE state = 'active' AND lock_until > ?1
                    )
              RETURNING id, recipient, body, state, scheduled_at, attempts, max_attempts,
                        backoff_base_ms, lock_until, last_error, created_at, updated_at",
        )?;

        let job = stmt
            .query_row(params![fmt_ts(&now), fmt_ts(&lock_until)], job_from_row)
            .optional()?;

        if let Some(ref job) = job {
            debug!(job_id = %job.id, attempts = job.attempts, "Claimed job");
        }

        Ok(job)
    }

    /// Mark an active job as completed and release its lock.
    pub fn complete_job(&self, id: &str, now: DateTime<Utc>) -> DatabaseResult<()> {
        let conn = self.conn.lock().expect("lock poisoned");
        let updated = conn.execute(
            "UPDATE jobs
                SET state = 'completed', lock_until = NULL, updated_at = ?2
              WHERE id = ?1 AND state = 'active'",
            params![id, fmt_ts(&now)],
        )?;

        if updated == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Active job {} not found",
                id
            )));
        }
        Ok(())
    }

    /// Record a failed attempt on an active job.
    ///
    /// Increments `attempts`. While attempts remain, the job goes back to
    /// `Delayed` with `scheduled_at = now + base * 2^(attempts - 1)`; once
    /// the budget is exhausted it becomes `Failed` (terminal, retained for
    /// inspection). Returns the updated job.
    pub fn fail_job(&self, id: &str, error: &str, now: DateTime<Utc>) -> DatabaseResult<Job> {
        let mut conn = self.conn.lock().expect("lock poisoned");
        let tx = conn.transaction()?;

        let row: Option<(i32, i32, i64)> = tx
            .query_row(
                "SELECT attempts, max_attempts, backoff_base_ms
                 FROM jobs WHERE id = ?1 AND state = 'active'",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let (attempts, max_attempts, backoff_base_ms) = row.ok_or_else(|| {
            DatabaseError::NotFound(format!("Active job {} not found", id))
        })?;

        let attempts = attempts + 1;

        if attempts < max_attempts {
            let delay = exponential_backoff(backoff_base_ms, attempts);
            let next_at = now + delay;
            tx.execute(
                "UPDATE jobs
                    SET state = 'delayed', attempts = ?2, scheduled_at = ?3,
                        lock_until = NULL, last_error = ?4, updated_at = ?5
                  WHERE id = ?1",
                params![id, attempts, fmt_ts(&next_at), error, fmt_ts(&now)],
            )?;
            debug!(
                job_id = %id,
                attempts,
                retry_in_ms = delay.num_milliseconds(),
                "Job failed, retry scheduled"
            );
        } else {
            tx.execute(
                "UPDATE jobs
                    SET state = 'failed', attempts = ?2,
                        lock_until = NULL, last_error = ?3, updated_at = ?4
                  WHERE id = ?1",
                params![id, attempts, error, fmt_ts(&now)],
            )?;
            debug!(job_id = %id, attempts, "Job failed terminally");
        }

        let job = tx.query_row(
            "SELECT id, recipient, body, state, scheduled_at, attempts, max_attempts,
                    backoff_base_ms, lock_until, last_error, created_at, updated_at
             FROM jobs WHERE id = ?1",
            params![id],
            job_from_row,
        )?;

        tx.commit()?;
        Ok(job)
    }

    /// List jobs in a given state, newest first.
    pub fn list_jobs_in_state(&self, state: JobState, limit: usize) -> DatabaseResult<Vec<Job>> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, recipient, body, state, scheduled_at, attempts, max_attempts,
                    backoff_base_ms, lock_until, last_error, created_at, updated_at
             FROM jobs WHERE state = ?1
             ORDER BY updated_at DESC LIMIT ?2",
        )?;

        let jobs = stmt
            .query_map(params![state.as_str(), limit as i64], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Count jobs per state.
    pub fn count_jobs_by_state(&self) -> DatabaseResult<JobCounts> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM jobs GROUP BY state")?;

        let mut counts = JobCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (state, count) = row?;
            match JobState::from_str(&state) {
                JobState::Waiting => counts.waiting = count,
                JobState::Delayed => counts.delayed = count,
                JobState::Active => counts.active = count,
                JobState::Completed => counts.completed = count,
                JobState::Failed => counts.failed = count,
            }
        }

        Ok(counts)
    }

    /// Purge completed jobs beyond the newest `keep_count` or older than
    /// `max_age`. Returns the number of purged rows.
    pub fn sweep_completed(
        &self,
        keep_count: usize,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> DatabaseResult<usize> {
        let cutoff = now - max_age;
        let conn = self.conn.lock().expect("lock poisoned");
        let purged = conn.execute(
            "DELETE FROM jobs
              WHERE state = 'completed'
                AND (updated_at < ?1
                     OR id NOT IN (
                         SELECT id FROM jobs WHERE state = 'completed'
                          ORDER BY updated_at DESC LIMIT ?2))",
            params![fmt_ts(&cutoff), keep_count as i64],
        )?;
        Ok(purged)
    }

    #[cfg(test)]
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.conn.lock().expect("lock poisoned"))
    }

    /// Purge failed jobs beyond the newest `keep_count`. Returns the number
    /// of purged rows.
    pub fn sweep_failed(&self, keep_count: usize) -> DatabaseResult<usize> {
        let conn = self.conn.lock().expect("lock poisoned");
        let purged = conn.execute(
            "DELETE FROM jobs
              WHERE state = 'failed'
                AND id NOT IN (
                    SELECT id FROM jobs WHERE state = 'failed'
                     ORDER BY updated_at DESC LIMIT ?1)",
            params![keep_count as i64],
        )?;
        Ok(purged)
    }
}

/// Serialize a timestamp in a fixed-width RFC 3339 format so lexicographic
/// comparison inside SQL matches chronological order.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. A row that fails here is corrupt; surfacing
/// the error beats silently substituting a wrong time into retry math.
fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

fn job_from_row(row: &Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        recipient: row.get(1)?,
        body: row.get(2)?,
        state: JobState::from_str(&row.get::<_, String>(3)?),
        scheduled_at: parse_ts(4, row.get::<_, String>(4)?)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        backoff_base_ms: row.get(7)?,
        lock_until: match row.get::<_, Option<String>>(8)? {
            Some(raw) => Some(parse_ts(8, raw)?),
            None => None,
        },
        last_error: row.get(9)?,
        created_at: parse_ts(10, row.get::<_, String>(10)?)?,
        updated_at: parse_ts(11, row.get::<_, String>(11)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn new_job(id: &str, scheduled_at: DateTime<Utc>) -> NewJob {
        NewJob {
            id: id.to_string(),
            recipient: "081234567890".to_string(),
            body: "hello".to_string(),
            scheduled_at,
            max_attempts: 3,
            backoff_base_ms: 2_000,
        }
    }

    fn lock() -> chrono::Duration {
        chrono::Duration::seconds(60)
    }

    #[test]
    fn insert_and_get_job() {
        let db = Database::open_in_memory().unwrap();
        let job = db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        assert_eq!(job.id, "job-1");
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, 3);
        assert!(job.lock_until.is_none());

        let fetched = db.get_job("job-1").unwrap().unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.scheduled_at, t0());
    }

    #[test]
    fn get_missing_job_returns_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_job("nope").unwrap().is_none());
    }

    #[test]
    fn future_schedule_inserts_as_delayed() {
        let db = Database::open_in_memory().unwrap();
        let later = t0() + chrono::Duration::hours(1);
        let job = db.insert_job(&new_job("job-1", later), t0()).unwrap();
        assert_eq!(job.state, JobState::Delayed);
    }

    #[test]
    fn claim_marks_active_and_locks() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        let job = db.claim_next_job(t0(), lock()).unwrap().unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.lock_until, Some(t0() + lock()));
    }

    #[test]
    fn claim_empty_store_returns_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.claim_next_job(t0(), lock()).unwrap().is_none());
    }

    #[test]
    fn claim_prefers_oldest_scheduled() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("newer", t0() + chrono::Duration::seconds(10)), t0())
            .unwrap();
        db.insert_job(&new_job("older", t0()), t0()).unwrap();

        let now = t0() + chrono::Duration::seconds(20);
        let job = db.claim_next_job(now, lock()).unwrap().unwrap();
        assert_eq!(job.id, "older");
    }

    #[test]
    fn delayed_job_not_claimable_before_schedule() {
        let db = Database::open_in_memory().unwrap();
        let later = t0() + chrono::Duration::hours(1);
        db.insert_job(&new_job("job-1", later), t0()).unwrap();

        assert!(db.claim_next_job(t0(), lock()).unwrap().is_none());
        assert!(db
            .claim_next_job(t0() + chrono::Duration::minutes(59), lock())
            .unwrap()
            .is_none());

        let job = db.claim_next_job(later, lock()).unwrap().unwrap();
        assert_eq!(job.id, "job-1");
    }

    #[test]
    fn at_most_one_job_active() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();
        db.insert_job(&new_job("job-2", t0()), t0()).unwrap();

        let first = db.claim_next_job(t0(), lock()).unwrap();
        assert!(first.is_some());

        // Second claim while the first lock is live returns nothing
        assert!(db.claim_next_job(t0(), lock()).unwrap().is_none());

        let counts = db.count_jobs_by_state().unwrap();
        assert_eq!(counts.active, 1);
        assert_eq!(counts.waiting, 1);
    }

    #[test]
    fn expired_lock_makes_job_reclaimable() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        let first = db.claim_next_job(t0(), lock()).unwrap().unwrap();
        assert_eq!(first.id, "job-1");

        // Worker crashed; after the lock expires the same job is claimed again
        let after_expiry = t0() + lock() + chrono::Duration::seconds(1);
        let second = db.claim_next_job(after_expiry, lock()).unwrap().unwrap();
        assert_eq!(second.id, "job-1");
        assert_eq!(second.state, JobState::Active);
    }

    #[test]
    fn expired_lock_is_released_even_when_another_job_wins_the_claim() {
        let db = Database::open_in_memory().unwrap();
        let late_at = t0() + chrono::Duration::seconds(5);
        db.insert_job(&new_job("late", late_at), t0()).unwrap();

        let claimed = db.claim_next_job(late_at, lock()).unwrap().unwrap();
        assert_eq!(claimed.id, "late");

        // An older job arrives while "late" sits crashed under its lock
        db.insert_job(&new_job("early", t0()), late_at).unwrap();

        let after_expiry = late_at + lock() + chrono::Duration::seconds(1);
        let second = db.claim_next_job(after_expiry, lock()).unwrap().unwrap();
        assert_eq!(second.id, "early");

        // The stale row went back to waiting instead of staying active
        let late = db.get_job("late").unwrap().unwrap();
        assert_eq!(late.state, JobState::Waiting);
        assert!(late.lock_until.is_none());
        assert_eq!(db.count_jobs_by_state().unwrap().active, 1);
    }

    #[test]
    fn complete_releases_lock() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();
        db.claim_next_job(t0(), lock()).unwrap().unwrap();

        db.complete_job("job-1", t0()).unwrap();

        let job = db.get_job("job-1").unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(job.lock_until.is_none());
    }

    #[test]
    fn complete_requires_active_state() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        let result = db.complete_job("job-1", t0());
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));
    }

    #[test]
    fn fail_schedules_exponential_retry() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        db.claim_next_job(t0(), lock()).unwrap().unwrap();
        let job = db.fail_job("job-1", "send timed out", t0()).unwrap();

        assert_eq!(job.state, JobState::Delayed);
        assert_eq!(job.attempts, 1);
        // First retry: base * 2^0 = 2s
        assert_eq!(job.scheduled_at, t0() + chrono::Duration::seconds(2));
        assert_eq!(job.last_error.as_deref(), Some("send timed out"));
        assert!(job.lock_until.is_none());
    }

    #[test]
    fn backoff_schedule_follows_powers_of_two() {
        let db = Database::open_in_memory().unwrap();
        let mut job = new_job("job-1", t0());
        job.max_attempts = 4;
        db.insert_job(&job, t0()).unwrap();

        let mut now = t0();
        for (n, expected_secs) in [(1, 2), (2, 4), (3, 8)] {
            let claimed = db.claim_next_job(now, lock()).unwrap().unwrap();
            assert_eq!(claimed.attempts, n - 1);

            let failed = db.fail_job("job-1", "boom", now).unwrap();
            assert_eq!(failed.attempts, n);
            assert_eq!(failed.state, JobState::Delayed);
            assert_eq!(
                failed.scheduled_at,
                now + chrono::Duration::seconds(expected_secs),
                "attempt {} backoff",
                n
            );
            now = failed.scheduled_at;
        }
    }

    #[test]
    fn job_fails_terminally_after_max_attempts() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        let mut now = t0();
        for _ in 0..2 {
            db.claim_next_job(now, lock()).unwrap().unwrap();
            let job = db.fail_job("job-1", "boom", now).unwrap();
            assert_eq!(job.state, JobState::Delayed);
            now = job.scheduled_at;
        }

        db.claim_next_job(now, lock()).unwrap().unwrap();
        let job = db.fail_job("job-1", "boom", now).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(job.attempts, job.max_attempts);

        // Terminal: never claimed or failed again
        let much_later = now + chrono::Duration::days(1);
        assert!(db.claim_next_job(much_later, lock()).unwrap().is_none());
        assert!(db.fail_job("job-1", "boom", much_later).is_err());
    }

    #[test]
    fn fail_requires_active_state() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        let result = db.fail_job("job-1", "boom", t0());
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));
    }

    #[test]
    fn count_jobs_by_state_groups_correctly() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("w1", t0()), t0()).unwrap();
        db.insert_job(&new_job("w2", t0()), t0()).unwrap();
        db.insert_job(&new_job("d1", t0() + chrono::Duration::hours(1)), t0())
            .unwrap();

        db.claim_next_job(t0(), lock()).unwrap().unwrap();

        let counts = db.count_jobs_by_state().unwrap();
        assert_eq!(counts.waiting, 1);
        assert_eq!(counts.delayed, 1);
        assert_eq!(counts.active, 1);
        assert_eq!(counts.completed, 0);
        assert_eq!(counts.failed, 0);
    }

    #[test]
    fn sweep_completed_respects_count_cap() {
        let db = Database::open_in_memory().unwrap();
        let mut now = t0();
        for i in 0..5 {
            let id = format!("job-{}", i);
            db.insert_job(&new_job(&id, now), now).unwrap();
            db.claim_next_job(now, lock()).unwrap().unwrap();
            db.complete_job(&id, now).unwrap();
            now += chrono::Duration::seconds(60);
        }

        let purged = db
            .sweep_completed(2, chrono::Duration::days(1), now)
            .unwrap();
        assert_eq!(purged, 3);

        let counts = db.count_jobs_by_state().unwrap();
        assert_eq!(counts.completed, 2);

        // The newest two survive
        assert!(db.get_job("job-4").unwrap().is_some());
        assert!(db.get_job("job-3").unwrap().is_some());
        assert!(db.get_job("job-0").unwrap().is_none());
    }

    #[test]
    fn sweep_completed_respects_age_cap() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("old", t0()), t0()).unwrap();
        db.claim_next_job(t0(), lock()).unwrap().unwrap();
        db.complete_job("old", t0()).unwrap();

        let later = t0() + chrono::Duration::hours(25);
        db.insert_job(&new_job("fresh", later), later).unwrap();
        db.claim_next_job(later, lock()).unwrap().unwrap();
        db.complete_job("fresh", later).unwrap();

        let purged = db
            .sweep_completed(100, chrono::Duration::hours(24), later)
            .unwrap();
        assert_eq!(purged, 1);
        assert!(db.get_job("old").unwrap().is_none());
        assert!(db.get_job("fresh").unwrap().is_some());
    }

    #[test]
    fn sweep_failed_respects_count_cap() {
        let db = Database::open_in_memory().unwrap();
        let mut now = t0();
        for i in 0..4 {
            let id = format!("job-{}", i);
            let mut job = new_job(&id, now);
            job.max_attempts = 1;
            db.insert_job(&job, now).unwrap();
            db.claim_next_job(now, lock()).unwrap().unwrap();
            db.fail_job(&id, "boom", now).unwrap();
            now += chrono::Duration::seconds(60);
        }

        let purged = db.sweep_failed(3).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(db.count_jobs_by_state().unwrap().failed, 3);
        assert!(db.get_job("job-0").unwrap().is_none());
    }

    #[test]
    fn sweeps_never_touch_live_jobs() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("waiting", t0()), t0()).unwrap();
        db.insert_job(&new_job("delayed", t0() + chrono::Duration::hours(1)), t0())
            .unwrap();
        db.insert_job(&new_job("active", t0()), t0()).unwrap();
        // "waiting" was inserted first, so it is claimed here
        db.claim_next_job(t0(), lock()).unwrap().unwrap();

        let far_future = t0() + chrono::Duration::days(30);
        db.sweep_completed(0, chrono::Duration::zero(), far_future)
            .unwrap();
        db.sweep_failed(0).unwrap();

        let counts = db.count_jobs_by_state().unwrap();
        assert_eq!(counts.waiting + counts.delayed + counts.active, 3);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("courier.sqlite");

        let db = Database::open(&path).unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        assert!(path.exists());
        assert!(db.get_job("job-1").unwrap().is_some());
    }

    #[test]
    fn corrupt_stored_timestamp_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.insert_job(&new_job("job-1", t0()), t0()).unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET scheduled_at = 'not-a-time' WHERE id = 'job-1'",
                [],
            )
            .unwrap()
        });

        assert!(matches!(
            db.get_job("job-1"),
            Err(DatabaseError::Sqlite(_))
        ));
    }

    #[test]
    fn timestamps_survive_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(123);
        let job = db.insert_job(&new_job("job-1", at), t0()).unwrap();
        assert_eq!(job.scheduled_at, at);
    }
}
