//! Durable FIFO stage queues.
//!
//! Four independent queues, one per stage, carrying job ids. The blocking
//! pop is atomic across concurrent consumers — it is the single concurrency
//! primitive the pipeline's exactly-once-claim guarantee rests on.
//!
//! Two drivers: an in-process channel queue for tests and single-process
//! embedding, and a SQLite-backed queue whose entries survive restarts.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::QueueError;
use crate::job::JobStatus;
use crate::store::Database;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryQueue;
pub use sqlite::SqliteQueue;

/// The four ordered processing stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Extraction,
    Chunking,
    Translation,
    Reconstruction,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Extraction,
        Stage::Chunking,
        Stage::Translation,
        Stage::Reconstruction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Chunking => "chunking",
            Stage::Translation => "translation",
            Stage::Reconstruction => "reconstruction",
        }
    }

    /// The stage a job moves to after this one completes; `None` for
    /// reconstruction, which finalizes instead.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Extraction => Some(Stage::Chunking),
            Stage::Chunking => Some(Stage::Translation),
            Stage::Translation => Some(Stage::Reconstruction),
            Stage::Reconstruction => None,
        }
    }

    /// The job status a worker asserts while holding a job in this stage.
    pub fn in_progress_status(self) -> JobStatus {
        match self {
            Stage::Extraction => JobStatus::Extracting,
            Stage::Chunking => JobStatus::Chunking,
            Stage::Translation => JobStatus::Translating,
            Stage::Reconstruction => JobStatus::Reconstructing,
        }
    }

    fn index(self) -> usize {
        match self {
            Stage::Extraction => 0,
            Stage::Chunking => 1,
            Stage::Translation => 2,
            Stage::Reconstruction => 3,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A FIFO queue of job ids for one stage.
pub trait StageQueue: Send + Sync {
    fn push(&self, job_id: &str) -> Result<(), QueueError>;

    /// Blocking pop with a bounded wait. Returns `None` on timeout —
    /// absence of work is not an error. The pop is atomic: no two
    /// consumers ever receive the same entry.
    fn pop_timeout(&self, timeout: Duration) -> Result<Option<String>, QueueError>;

    /// Number of entries currently enqueued (not yet claimed).
    fn pending(&self) -> Result<usize, QueueError>;
}

/// Per-stage pending counts, as reported to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub extraction: usize,
    pub chunking: usize,
    pub translation: usize,
    pub reconstruction: usize,
}

/// The four stage queues as one unit.
#[derive(Clone)]
pub struct StageQueues {
    queues: [Arc<dyn StageQueue>; 4],
}

impl StageQueues {
    /// Process-local queues over crossbeam channels.
    pub fn in_memory() -> Self {
        Self {
            queues: [
                Arc::new(MemoryQueue::new(Stage::Extraction)),
                Arc::new(MemoryQueue::new(Stage::Chunking)),
                Arc::new(MemoryQueue::new(Stage::Translation)),
                Arc::new(MemoryQueue::new(Stage::Reconstruction)),
            ],
        }
    }

    /// Durable queues persisted in the shared database.
    pub fn durable(db: &Database) -> Self {
        Self {
            queues: [
                Arc::new(SqliteQueue::new(db.clone(), Stage::Extraction)),
                Arc::new(SqliteQueue::new(db.clone(), Stage::Chunking)),
                Arc::new(SqliteQueue::new(db.clone(), Stage::Translation)),
                Arc::new(SqliteQueue::new(db.clone(), Stage::Reconstruction)),
            ],
        }
    }

    pub fn for_stage(&self, stage: Stage) -> &Arc<dyn StageQueue> {
        &self.queues[stage.index()]
    }

    pub fn status(&self) -> Result<QueueStatus, QueueError> {
        Ok(QueueStatus {
            extraction: self.for_stage(Stage::Extraction).pending()?,
            chunking: self.for_stage(Stage::Chunking).pending()?,
            translation: self.for_stage(Stage::Translation).pending()?,
            reconstruction: self.for_stage(Stage::Reconstruction).pending()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert_eq!(Stage::Extraction.next(), Some(Stage::Chunking));
        assert_eq!(Stage::Chunking.next(), Some(Stage::Translation));
        assert_eq!(Stage::Translation.next(), Some(Stage::Reconstruction));
        assert_eq!(Stage::Reconstruction.next(), None);
    }

    #[test]
    fn test_in_progress_statuses() {
        assert_eq!(Stage::Extraction.in_progress_status(), JobStatus::Extracting);
        assert_eq!(
            Stage::Reconstruction.in_progress_status(),
            JobStatus::Reconstructing
        );
    }

    #[test]
    fn test_status_counts_all_stages() {
        let queues = StageQueues::in_memory();
        queues.for_stage(Stage::Extraction).push("a").unwrap();
        queues.for_stage(Stage::Extraction).push("b").unwrap();
        queues.for_stage(Stage::Translation).push("c").unwrap();

        let status = queues.status().unwrap();
        assert_eq!(status.extraction, 2);
        assert_eq!(status.chunking, 0);
        assert_eq!(status.translation, 1);
        assert_eq!(status.reconstruction, 0);
    }
}
