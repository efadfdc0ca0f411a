//! Durable stage queue over the shared SQLite database.
//!
//! Entries live in the `queue_entries` table and survive process restarts.
//! A pop selects and deletes the oldest row for the stage inside the
//! serialized connection, so concurrent consumers can never claim the same
//! entry. A condvar per queue wakes blocked pops promptly on push instead
//! of sleeping out the full timeout.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::debug;
use rusqlite::params;

use crate::error::QueueError;
use crate::store::Database;

use super::{Stage, StageQueue};

pub struct SqliteQueue {
    db: Database,
    stage: Stage,
    signal: Arc<(Mutex<()>, Condvar)>,
}

impl SqliteQueue {
    pub fn new(db: Database, stage: Stage) -> Self {
        Self {
            db,
            stage,
            signal: Arc::new((Mutex::new(()), Condvar::new())),
        }
    }

    fn try_pop(&self) -> Result<Option<String>, QueueError> {
        let popped = self.db.with_conn(|conn| {
            let oldest: Option<(i64, String)> = conn
                .query_row(
                    "SELECT id, job_id FROM queue_entries
                     WHERE stage = ?1 ORDER BY id LIMIT 1",
                    params![self.stage.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            let Some((id, job_id)) = oldest else {
                return Ok(None);
            };
            conn.execute("DELETE FROM queue_entries WHERE id = ?1", params![id])?;
            Ok(Some(job_id))
        })?;
        Ok(popped)
    }
}

impl StageQueue for SqliteQueue {
    fn push(&self, job_id: &str) -> Result<(), QueueError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO queue_entries (stage, job_id, enqueued_at) VALUES (?1, ?2, ?3)",
                params![self.stage.as_str(), job_id, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })?;
        debug!("enqueued job {} for {}", job_id, self.stage);

        let (lock, cvar) = &*self.signal;
        let _guard = lock.lock().map_err(|_| QueueError::LockPoisoned)?;
        cvar.notify_all();
        Ok(())
    }

    fn pop_timeout(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job_id) = self.try_pop()? {
                return Ok(Some(job_id));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            // A push between the empty poll and this wait is caught on the
            // next loop pass; the wait is bounded either way.
            let (lock, cvar) = &*self.signal;
            let guard = lock.lock().map_err(|_| QueueError::LockPoisoned)?;
            let (_guard, _timed_out) = cvar
                .wait_timeout(guard, deadline - now)
                .map_err(|_| QueueError::LockPoisoned)?;
        }
    }

    fn pending(&self) -> Result<usize, QueueError> {
        let count = self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM queue_entries WHERE stage = ?1",
                params![self.stage.as_str()],
                |row| row.get(0),
            )?;
            Ok(count)
        })?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_queue(stage: Stage) -> SqliteQueue {
        SqliteQueue::new(Database::open_in_memory().unwrap(), stage)
    }

    #[test]
    fn test_fifo_order() {
        let queue = test_queue(Stage::Extraction);
        queue.push("first").unwrap();
        queue.push("second").unwrap();

        let timeout = Duration::from_millis(10);
        assert_eq!(queue.pop_timeout(timeout).unwrap().as_deref(), Some("first"));
        assert_eq!(
            queue.pop_timeout(timeout).unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(queue.pop_timeout(timeout).unwrap(), None);
    }

    #[test]
    fn test_stages_are_isolated() {
        let db = Database::open_in_memory().unwrap();
        let extraction = SqliteQueue::new(db.clone(), Stage::Extraction);
        let chunking = SqliteQueue::new(db, Stage::Chunking);

        extraction.push("job-1").unwrap();
        assert_eq!(chunking.pending().unwrap(), 0);
        assert_eq!(
            chunking.pop_timeout(Duration::from_millis(10)).unwrap(),
            None
        );
        assert_eq!(extraction.pending().unwrap(), 1);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        {
            let queue = SqliteQueue::new(Database::open(&path).unwrap(), Stage::Translation);
            queue.push("persistent-job").unwrap();
        }

        let queue = SqliteQueue::new(Database::open(&path).unwrap(), Stage::Translation);
        assert_eq!(queue.pending().unwrap(), 1);
        assert_eq!(
            queue
                .pop_timeout(Duration::from_millis(10))
                .unwrap()
                .as_deref(),
            Some("persistent-job")
        );
    }

    #[test]
    fn test_push_wakes_blocked_pop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let queue = Arc::new(SqliteQueue::new(
            Database::open(&path).unwrap(),
            Stage::Extraction,
        ));

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop_timeout(Duration::from_secs(5)).unwrap())
        };

        std::thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        queue.push("wake-up").unwrap();
        let popped = consumer.join().unwrap();

        assert_eq!(popped.as_deref(), Some("wake-up"));
        // The pop returned well before the 5s timeout.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_concurrent_consumers_claim_each_entry_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let queue = Arc::new(SqliteQueue::new(
            Database::open(&path).unwrap(),
            Stage::Extraction,
        ));
        for i in 0..50 {
            queue.push(&format!("job-{i}")).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                let mut claimed = Vec::new();
                while let Some(id) = queue.pop_timeout(Duration::from_millis(20)).unwrap() {
                    claimed.push(id);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        assert_eq!(all.len(), 50);
        let unique: HashSet<_> = all.into_iter().collect();
        assert_eq!(unique.len(), 50);
    }
}
