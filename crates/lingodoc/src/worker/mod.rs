//! Stage worker pools.
//!
//! Each stage runs N long-lived worker threads. A worker's loop is: pop the
//! stage queue with a bounded timeout (no work is not an error), claim the
//! job by asserting the stage's in-progress status, run the stage handler,
//! then advance the job to the next queue or finalize it. Stage failures
//! mark the job FAILED; infrastructure failures abort the iteration and the
//! loop resumes polling. A shutdown flag is checked every iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use tracing::info_span;

use crate::config::PipelineConfig;
use crate::error::{LingodocError, QueueError, StageError};
use crate::extract::DocumentExtractor;
use crate::job::JobRecord;
use crate::manager::{ClaimOutcome, QueueManager, WriteOutcome};
use crate::queue::Stage;
use crate::storage::ArtifactStore;
use crate::store::StoreError;
use crate::translate::Translator;

pub mod chunking;
pub mod extraction;
pub mod reconstruction;
pub mod translation;

pub use chunking::ChunkingStage;
pub use extraction::ExtractionStage;
pub use reconstruction::ReconstructionStage;
pub use translation::TranslationStage;

/// Shared dependencies handed to every stage handler.
pub struct StageContext {
    pub manager: Arc<QueueManager>,
    pub artifacts: Arc<ArtifactStore>,
}

impl StageContext {
    pub fn config(&self) -> &PipelineConfig {
        self.manager.config()
    }

    /// Mid-stage progress write. Reports [`StageError::Interrupted`] when
    /// the job has reached a terminal state (e.g. cancellation), telling
    /// the handler to abandon its work without writing anything further.
    pub fn update_progress(
        &self,
        job_id: &str,
        progress: f64,
        processed_pages: Option<u32>,
    ) -> Result<(), StageError> {
        match self.manager.update_progress(job_id, progress, processed_pages) {
            Ok(WriteOutcome::Applied(_)) => Ok(()),
            Ok(WriteOutcome::Terminal(_)) => Err(StageError::Interrupted),
            Err(e) => Err(StageError::Store(e)),
        }
    }
}

/// Record fields a stage hands back for persisting.
///
/// Artifact refs are set exactly once — a ref already present on the
/// record is never overwritten.
#[derive(Debug, Default, Clone)]
pub struct StageFields {
    pub progress: Option<f64>,
    pub total_pages: Option<u32>,
    pub extraction_output: Option<String>,
    pub translation_output: Option<String>,
}

/// What a stage handler produced.
pub enum StageOutcome {
    /// Persist the fields and enqueue the job for the next stage.
    Advance(StageFields),
    /// Terminal success: record the final output and mark COMPLETED.
    Finished { final_output: String },
}

/// One stage's unit of work.
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> Stage;
    fn process(&self, job: &JobRecord, cx: &StageContext)
        -> Result<StageOutcome, StageError>;
}

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns the configured number of worker threads for every stage.
    pub fn start(
        manager: Arc<QueueManager>,
        artifacts: Arc<ArtifactStore>,
        extractor: Arc<dyn DocumentExtractor>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let cx = Arc::new(StageContext { manager, artifacts });
        let counts = cx.config().workers.clone();
        let chunk_target = cx.config().chunk_target_chars;

        let stages: Vec<(Arc<dyn StageHandler>, usize)> = vec![
            (
                Arc::new(ExtractionStage::new(extractor)),
                counts.extraction,
            ),
            (Arc::new(ChunkingStage), counts.chunking),
            (
                Arc::new(TranslationStage::new(translator, chunk_target)),
                counts.translation,
            ),
            (Arc::new(ReconstructionStage), counts.reconstruction),
        ];

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::new();

        for (handler, count) in stages {
            for worker_id in 0..count {
                let handler = Arc::clone(&handler);
                let cx = Arc::clone(&cx);
                let shutdown_flag = Arc::clone(&shutdown);
                workers.push(thread::spawn(move || {
                    run_worker(worker_id, handler, cx, shutdown_flag);
                }));
            }
        }

        info!("started {} stage workers", workers.len());

        Self { workers, shutdown }
    }

    /// Signals every worker to stop after its current iteration.
    pub fn shutdown(&self) {
        info!("shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Joins all workers, logging any that panicked.
    pub fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("worker {} panicked: {:?}", i, e);
            }
        }
        info!("all workers stopped");
    }
}

fn run_worker(
    worker_id: usize,
    handler: Arc<dyn StageHandler>,
    cx: Arc<StageContext>,
    shutdown: Arc<AtomicBool>,
) {
    let stage = handler.stage();
    let queue = Arc::clone(cx.manager.queues().for_stage(stage));
    let poll_timeout = cx.config().poll_timeout();

    debug!("{} worker {} started", stage, worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("{} worker {} received shutdown signal", stage, worker_id);
            break;
        }

        match queue.pop_timeout(poll_timeout) {
            Ok(Some(job_id)) => {
                if let Err(e) = run_stage(&job_id, handler.as_ref(), &cx) {
                    // Store or queue trouble: the job is left as-is and the
                    // loop keeps polling.
                    error!(
                        "{} worker {}: iteration aborted for job {}: {}",
                        stage, worker_id, job_id, e
                    );
                }
            }
            Ok(None) => continue,
            Err(QueueError::Disconnected) => {
                debug!("{} worker {}: queue disconnected", stage, worker_id);
                break;
            }
            Err(e) => {
                error!("{} worker {}: queue pop failed: {}", stage, worker_id, e);
                continue;
            }
        }
    }

    debug!("{} worker {} stopped", stage, worker_id);
}

fn run_stage(
    job_id: &str,
    handler: &dyn StageHandler,
    cx: &StageContext,
) -> Result<(), LingodocError> {
    let stage = handler.stage();
    let _span = info_span!("stage", stage = %stage, job_id = %job_id).entered();

    let record = match cx.manager.begin_stage(job_id, stage) {
        Ok(ClaimOutcome::Claimed(record)) => record,
        Ok(ClaimOutcome::Terminal(status)) => {
            debug!("skipping job {}: already {}", job_id, status);
            return Ok(());
        }
        Ok(ClaimOutcome::Stale(status)) => {
            warn!(
                "skipping stale {} queue entry for job {} (status {})",
                stage, job_id, status
            );
            return Ok(());
        }
        Err(StoreError::NotFound(_)) => {
            warn!("skipping stale queue entry: job {} has no record", job_id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    debug!("{} processing job {}", stage, job_id);

    match handler.process(&record, cx) {
        Ok(StageOutcome::Advance(fields)) => advance(job_id, stage, fields, cx),
        Ok(StageOutcome::Finished { final_output }) => {
            cx.manager.complete_job(job_id, &final_output)?;
            Ok(())
        }
        Err(StageError::Interrupted) => {
            debug!("job {} reached a terminal state mid-{}", job_id, stage);
            Ok(())
        }
        Err(e) if e.is_infrastructure() => Err(e.into()),
        Err(e) => {
            cx.manager.fail_job(job_id, &e.to_string())?;
            Ok(())
        }
    }
}

/// Persists the stage's fields and the next stage's status, then — and only
/// then — enqueues the job id. Each stage visit enqueues the id exactly
/// once.
fn advance(
    job_id: &str,
    stage: Stage,
    fields: StageFields,
    cx: &StageContext,
) -> Result<(), LingodocError> {
    let Some(next) = stage.next() else {
        // Handlers for the final stage return Finished; reaching this is a
        // handler bug, recorded on the job rather than panicking a worker.
        cx.manager
            .fail_job(job_id, "internal: final stage cannot advance")?;
        return Ok(());
    };

    let outcome = cx.manager.with_job(job_id, |record| {
        apply_fields(record, &fields);
        record.status = next.in_progress_status();
    })?;

    match outcome {
        WriteOutcome::Applied(_) => {
            cx.manager.queues().for_stage(next).push(job_id)?;
            debug!("job {} advanced to {}", job_id, next);
        }
        WriteOutcome::Terminal(record) => {
            debug!("job {} not advanced: already {}", job_id, record.status);
        }
    }
    Ok(())
}

fn apply_fields(record: &mut JobRecord, fields: &StageFields) {
    if let Some(total) = fields.total_pages {
        record.total_pages = total;
        record.processed_pages = record.processed_pages.min(total);
    }
    if let Some(progress) = fields.progress {
        record.advance_progress(progress);
    }
    if record.extraction_output.is_none() && fields.extraction_output.is_some() {
        record.extraction_output = fields.extraction_output.clone();
    }
    if record.translation_output.is_none() && fields.translation_output.is_some() {
        record.translation_output = fields.translation_output.clone();
    }
}
