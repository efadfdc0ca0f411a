//! Test harness for isolated pipeline execution.
//!
//! `PipelineHarness` wires a real SQLite store, durable stage queues, and
//! artifact storage inside a temp directory, optionally with a running
//! worker pool, so tests exercise the same code paths as production.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use lingodoc::extract::PlainTextExtractor;
use lingodoc::job::{JobReceipt, JobRecord, JobStatus, Tier};
use lingodoc::manager::{NoopNotifier, QueueManager, SubmitRequest};
use lingodoc::queue::StageQueues;
use lingodoc::storage::ArtifactStore;
use lingodoc::store::{Database, SqliteJobStore};
use lingodoc::translate::Translator;
use lingodoc::worker::WorkerPool;
use lingodoc::PipelineConfig;

pub struct PipelineHarness {
    temp: TempDir,
    pub manager: Arc<QueueManager>,
    pub artifacts: Arc<ArtifactStore>,
    pub inbox: PathBuf,
    pool: Option<WorkerPool>,
}

impl PipelineHarness {
    /// Harness with no workers running — jobs stay wherever they are.
    pub fn idle() -> Self {
        Self::build(None)
    }

    /// Harness with a full worker pool using the given translator.
    pub fn running(translator: Arc<dyn Translator>) -> Self {
        Self::build(Some(translator))
    }

    fn build(translator: Option<Arc<dyn Translator>>) -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let inbox = temp.path().join("inbox");
        std::fs::create_dir_all(&inbox).expect("Failed to create inbox dir");

        let mut config = PipelineConfig::default();
        config.artifact_dir = temp.path().join("artifacts");
        config.chunk_target_chars = 120;
        config.poll_timeout_ms = 25;
        config.workers.extraction = 2;
        config.workers.translation = 2;
        let config = Arc::new(config);

        let db = Database::open(&temp.path().join("pipeline.db")).expect("Failed to open db");
        let store = Arc::new(SqliteJobStore::new(db.clone()));
        let queues = StageQueues::durable(&db);
        let artifacts =
            Arc::new(ArtifactStore::new(&config.artifact_dir).expect("Failed to create artifacts"));

        let manager = Arc::new(QueueManager::new(
            store,
            queues,
            Arc::new(NoopNotifier),
            Arc::clone(&config),
        ));

        let pool = translator.map(|translator| {
            WorkerPool::start(
                Arc::clone(&manager),
                Arc::clone(&artifacts),
                Arc::new(PlainTextExtractor),
                translator,
            )
        });

        Self {
            temp,
            manager,
            artifacts,
            inbox,
            pool,
        }
    }

    /// Brings a worker pool up on an idle harness.
    pub fn start_workers(&mut self, translator: Arc<dyn Translator>) {
        assert!(self.pool.is_none(), "workers already running");
        self.pool = Some(WorkerPool::start(
            Arc::clone(&self.manager),
            Arc::clone(&self.artifacts),
            Arc::new(PlainTextExtractor),
            translator,
        ));
    }

    pub fn write_document(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inbox.join(name);
        std::fs::write(&path, content).expect("Failed to write document");
        path
    }

    pub fn submit(&self, name: &str, content: &str, tier: Tier) -> JobReceipt {
        self.manager
            .create_job(&SubmitRequest {
                path: self.write_document(name, content),
                source_lang: "en".to_string(),
                target_lang: "vi".to_string(),
                tier,
            })
            .expect("Submission failed")
    }

    /// Polls the job until it reaches a terminal state, returning every
    /// observed snapshot (including the terminal one).
    pub fn wait_terminal(&self, job_id: &str, timeout: Duration) -> Vec<JobRecord> {
        let deadline = Instant::now() + timeout;
        let mut history = Vec::new();
        loop {
            let record = self.manager.get_job(job_id).expect("Job disappeared");
            let terminal = record.status.is_terminal();
            history.push(record);
            if terminal {
                return history;
            }
            assert!(
                Instant::now() < deadline,
                "job {} still {} after {:?}",
                job_id,
                history.last().map(|r| r.status).unwrap_or(JobStatus::Pending),
                timeout
            );
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn read_final_output(&self, record: &JobRecord) -> String {
        let artifact_ref = record
            .final_output
            .as_deref()
            .expect("job has no final output");
        self.artifacts
            .read_final(artifact_ref)
            .expect("final output unreadable")
    }
}

impl Drop for PipelineHarness {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
            pool.wait();
        }
    }
}

fn status_rank(status: JobStatus) -> usize {
    match status {
        JobStatus::Pending => 0,
        JobStatus::Extracting => 1,
        JobStatus::Chunking => 2,
        JobStatus::Translating => 3,
        JobStatus::Reconstructing => 4,
        JobStatus::Completed => 5,
        // Failed is reachable from any non-terminal state.
        JobStatus::Failed => usize::MAX,
    }
}

/// Asserts the observed snapshots walk the stage graph forward only and end
/// in the expected terminal state. Polling may skip states; it must never
/// observe one out of order or see a terminal state exited.
pub fn assert_valid_status_path(history: &[JobRecord], terminal: JobStatus) {
    let observed: Vec<JobStatus> = history.iter().map(|r| r.status).collect();
    assert_eq!(
        *observed.last().expect("empty history"),
        terminal,
        "observed path: {observed:?}"
    );

    let mut rank = 0;
    for status in &observed {
        let next = status_rank(*status);
        assert!(
            next >= rank,
            "status went backwards in observed path: {observed:?}"
        );
        rank = next;
    }
}

/// Asserts successive progress reads never decrease.
pub fn assert_monotonic_progress(history: &[JobRecord]) {
    for pair in history.windows(2) {
        assert!(
            pair[1].progress >= pair[0].progress,
            "progress regressed from {} to {}",
            pair[0].progress,
            pair[1].progress
        );
    }
}
