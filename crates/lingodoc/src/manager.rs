//! Queue manager: the single entry point for creating jobs and for every
//! record mutation.
//!
//! All writes go through a read-modify-write loop that re-reads the record,
//! refuses to touch terminal jobs, and retries on revision conflicts — so a
//! cancellation can never be overwritten by a racing worker, and concurrent
//! progress updates never lose each other's writes.

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::error::{QueueError, Result, ValidationError};
use crate::extract::PAGE_SEPARATOR;
use crate::job::{
    ActiveJobView, DocumentKind, JobReceipt, JobRecord, JobStatus, StatusReport, Tier,
};
use crate::lang;
use crate::queue::{QueueStatus, Stage, StageQueues};
use crate::store::{JobStore, StoreError};

/// Reason recorded when a job is cancelled.
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Submission input, produced by the API layer.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub path: PathBuf,
    pub source_lang: String,
    pub target_lang: String,
    pub tier: Tier,
}

#[derive(Debug, Error)]
#[error("Task notification failed: {0}")]
pub struct NotifyError(pub String);

/// Best-effort hook into an external task-execution facility, told about
/// every newly created job. The pipeline never depends on the notification
/// succeeding — the job is already durably enqueued when it fires.
pub trait TaskNotifier: Send + Sync {
    fn notify_created(&self, job_id: &str) -> std::result::Result<(), NotifyError>;
}

pub struct NoopNotifier;

impl TaskNotifier for NoopNotifier {
    fn notify_created(&self, _job_id: &str) -> std::result::Result<(), NotifyError> {
        Ok(())
    }
}

/// Result of a guarded record write.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The mutation was applied; the updated record is returned.
    Applied(JobRecord),
    /// The record had already reached a terminal state; nothing was
    /// written.
    Terminal(JobRecord),
}

/// Result of a worker claiming a job for a stage.
#[derive(Debug)]
pub(crate) enum ClaimOutcome {
    Claimed(JobRecord),
    /// Job already terminal — stale or duplicate queue entry.
    Terminal(JobStatus),
    /// Job is not in a claimable status for this stage.
    Stale(JobStatus),
}

pub struct QueueManager {
    store: Arc<dyn JobStore>,
    queues: StageQueues,
    notifier: Arc<dyn TaskNotifier>,
    config: Arc<PipelineConfig>,
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        queues: StageQueues,
        notifier: Arc<dyn TaskNotifier>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            queues,
            notifier,
            config,
        }
    }

    pub fn queues(&self) -> &StageQueues {
        &self.queues
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validates the submission, writes the initial record, and enqueues it
    /// for extraction. The record write always precedes the queue push; the
    /// external notification comes last and is best-effort.
    pub fn create_job(&self, request: &SubmitRequest) -> Result<JobReceipt> {
        let path = &request.path;

        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            let detail = match DocumentKind::detect_mime(path) {
                Some(mime) => format!("{name} ({mime})"),
                None => name,
            };
            ValidationError::UnsupportedFileType(detail)
        })?;

        let metadata = std::fs::metadata(path).map_err(|e| ValidationError::ReadInput {
            path: path.clone(),
            source: e,
        })?;
        if metadata.len() == 0 {
            return Err(ValidationError::EmptyFile(path.clone()).into());
        }
        let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
        if size_mb > self.config.max_file_size_mb {
            return Err(ValidationError::FileTooLarge {
                size_mb,
                limit_mb: self.config.max_file_size_mb,
            }
            .into());
        }

        let source_lang = lang::normalize(&request.source_lang)?;
        let target_lang = lang::normalize(&request.target_lang)?;

        let mut record = JobRecord::new(
            &path.to_string_lossy(),
            &source_lang,
            &target_lang,
            request.tier,
        );
        record.total_pages = estimate_pages(kind, path, size_mb);
        let estimated_time = estimate_processing_time(kind, size_mb, record.total_pages);

        self.store.create(&record)?;
        self.queues
            .for_stage(Stage::Extraction)
            .push(&record.job_id)?;

        if let Err(e) = self.notifier.notify_created(&record.job_id) {
            // The job is durably enqueued; pipeline progress never depends
            // on the notification.
            warn!(
                "task notification failed for job {} (job remains queued): {}",
                record.job_id, e
            );
        }

        info!(
            "created job {} ({} -> {}, tier {}, {} page(s) estimated)",
            record.job_id, source_lang, target_lang, record.tier, record.total_pages
        );

        Ok(JobReceipt {
            job_id: record.job_id,
            status: record.status,
            total_pages: record.total_pages,
            estimated_time,
        })
    }

    pub fn get_job(&self, job_id: &str) -> std::result::Result<JobRecord, StoreError> {
        self.store
            .get(job_id)?
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    /// External status view for polling callers.
    pub fn job_status(&self, job_id: &str) -> std::result::Result<StatusReport, StoreError> {
        Ok(StatusReport::from(&self.get_job(job_id)?))
    }

    /// Full-record overwrite with a bumped `updated_at`. The caller's
    /// record must carry the current revision.
    pub fn update_job(&self, record: &mut JobRecord) -> std::result::Result<(), StoreError> {
        record.touch();
        record.revision = self.store.put(record)?;
        Ok(())
    }

    /// Guarded read-modify-write: re-reads the record, refuses terminal
    /// jobs, applies `mutate`, and retries on revision conflict.
    pub(crate) fn with_job<F>(
        &self,
        job_id: &str,
        mutate: F,
    ) -> std::result::Result<WriteOutcome, StoreError>
    where
        F: Fn(&mut JobRecord),
    {
        loop {
            let mut record = self.get_job(job_id)?;
            if record.status.is_terminal() {
                return Ok(WriteOutcome::Terminal(record));
            }
            mutate(&mut record);
            record.touch();
            match self.store.put(&record) {
                Ok(revision) => {
                    record.revision = revision;
                    return Ok(WriteOutcome::Applied(record));
                }
                Err(StoreError::RevisionConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Raises progress (never lowers it) and optionally `processed_pages`,
    /// clamped to `total_pages` once that is known.
    pub fn update_progress(
        &self,
        job_id: &str,
        progress: f64,
        processed_pages: Option<u32>,
    ) -> std::result::Result<WriteOutcome, StoreError> {
        self.with_job(job_id, |record| {
            record.advance_progress(progress);
            if let Some(pages) = processed_pages {
                record.processed_pages = if record.total_pages > 0 {
                    pages.min(record.total_pages)
                } else {
                    pages
                };
            }
        })
    }

    /// Marks the job FAILED with the given reason. No automatic retry.
    pub fn fail_job(
        &self,
        job_id: &str,
        reason: &str,
    ) -> std::result::Result<WriteOutcome, StoreError> {
        let outcome = self.with_job(job_id, |record| {
            record.status = JobStatus::Failed;
            record.error = Some(reason.to_string());
        })?;
        if let WriteOutcome::Applied(record) = &outcome {
            warn!("job {} failed: {}", record.job_id, reason);
        }
        Ok(outcome)
    }

    /// Marks the job COMPLETED with its final output artifact.
    pub fn complete_job(
        &self,
        job_id: &str,
        output_ref: &str,
    ) -> std::result::Result<WriteOutcome, StoreError> {
        let outcome = self.with_job(job_id, |record| {
            record.status = JobStatus::Completed;
            record.final_output = Some(output_ref.to_string());
            record.advance_progress(crate::job::checkpoints::COMPLETE);
            record.processed_pages = record.total_pages;
        })?;
        if let WriteOutcome::Applied(record) = &outcome {
            info!("job {} completed: {}", record.job_id, output_ref);
        }
        Ok(outcome)
    }

    /// Cooperative cancellation. Rejects COMPLETED jobs; a job that is
    /// already FAILED is left untouched (its error is never overwritten).
    pub fn cancel_job(&self, job_id: &str) -> Result<JobRecord> {
        match self.with_job(job_id, |record| {
            record.status = JobStatus::Failed;
            record.error = Some(CANCELLED_BY_USER.to_string());
        })? {
            WriteOutcome::Applied(record) => {
                info!("job {} cancelled", record.job_id);
                Ok(record)
            }
            WriteOutcome::Terminal(record) => match record.status {
                JobStatus::Completed => {
                    Err(ValidationError::AlreadyCompleted(job_id.to_string()).into())
                }
                _ => Ok(record),
            },
        }
    }

    /// Claims a job for a stage by asserting the stage's in-progress
    /// status. Stale and duplicate queue entries are skipped, never
    /// processed twice.
    pub(crate) fn begin_stage(
        &self,
        job_id: &str,
        stage: Stage,
    ) -> std::result::Result<ClaimOutcome, StoreError> {
        let target = stage.in_progress_status();
        loop {
            let mut record = self.get_job(job_id)?;
            if record.status.is_terminal() {
                return Ok(ClaimOutcome::Terminal(record.status));
            }
            if !record.status.can_transition(target) {
                return Ok(ClaimOutcome::Stale(record.status));
            }
            record.status = target;
            record.touch();
            match self.store.put(&record) {
                Ok(revision) => {
                    record.revision = revision;
                    return Ok(ClaimOutcome::Claimed(record));
                }
                Err(StoreError::RevisionConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Per-stage pending counts.
    pub fn queue_status(&self) -> std::result::Result<QueueStatus, QueueError> {
        self.queues.status()
    }

    /// Non-terminal jobs, newest first.
    pub fn active_jobs(&self, limit: usize) -> std::result::Result<Vec<JobRecord>, StoreError> {
        self.store.list_active(limit)
    }

    /// Payload of the external queue-status query: per-stage pending
    /// counts plus compact views of the most recent active jobs.
    pub fn queue_overview(&self, limit: usize) -> Result<QueueOverview> {
        Ok(QueueOverview {
            queues: self.queue_status()?,
            active_jobs: self
                .active_jobs(limit)?
                .iter()
                .map(ActiveJobView::from)
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueOverview {
    pub queues: QueueStatus,
    pub active_jobs: Vec<ActiveJobView>,
}

fn estimate_pages(kind: DocumentKind, path: &std::path::Path, size_mb: f64) -> u32 {
    match kind {
        DocumentKind::Text => match std::fs::read_to_string(path) {
            Ok(content) => content.matches(PAGE_SEPARATOR).count() as u32 + 1,
            Err(e) => {
                warn!("page estimation failed for {}: {}", path.display(), e);
                1
            }
        },
        // ~0.5MB per page.
        DocumentKind::Pdf => (size_mb * 2.0).max(1.0) as u32,
        // ~3KB of archive per page, capped.
        DocumentKind::Word => ((size_mb * 1024.0 / 3.0).max(1.0) as u32).min(500),
    }
}

fn estimate_processing_time(kind: DocumentKind, size_mb: f64, total_pages: u32) -> String {
    let minutes = match kind {
        DocumentKind::Pdf => (total_pages as u64 / 5).max(2),
        DocumentKind::Word => (total_pages as u64 / 10).max(2),
        DocumentKind::Text => ((size_mb * 0.5) as u64).max(1),
    };
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}
