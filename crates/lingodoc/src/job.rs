//! Job records and the pipeline state machine.
//!
//! A [`JobRecord`] tracks one document's end-to-end translation request.
//! Records are mutated exclusively through read-modify-write cycles against
//! the store; the `revision` field is the optimistic concurrency token that
//! rejects stale writes.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality/cost level selecting the translation provider strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Standard,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }

    /// Strict parse from the canonical string name. Unknown values are
    /// rejected rather than defaulted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(Tier::Basic),
            "standard" => Some(Tier::Standard),
            "premium" => Some(Tier::Premium),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job.
///
/// Transitions are only valid along the stage graph; see
/// [`JobStatus::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Extracting,
    Chunking,
    Translating,
    Reconstructing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Extracting => "extracting",
            JobStatus::Chunking => "chunking",
            JobStatus::Translating => "translating",
            JobStatus::Reconstructing => "reconstructing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Strict parse from the canonical string name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "extracting" => Some(JobStatus::Extracting),
            "chunking" => Some(JobStatus::Chunking),
            "translating" => Some(JobStatus::Translating),
            "reconstructing" => Some(JobStatus::Reconstructing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// COMPLETED and FAILED permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` follows the stage graph.
    ///
    /// Re-persisting the current status is allowed (workers re-assert their
    /// in-progress status when claiming a job). Any non-terminal status may
    /// move to FAILED (stage failure or cancellation).
    pub fn can_transition(self, next: JobStatus) -> bool {
        use JobStatus::*;
        if self == next {
            return !self.is_terminal();
        }
        match (self, next) {
            (Pending, Extracting) => true,
            (Extracting, Chunking) => true,
            (Chunking, Translating) => true,
            (Translating, Reconstructing) => true,
            (Reconstructing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall-progress checkpoints per stage.
///
/// The relative ordering is the contract (extraction < hand-off <
/// translation span < reconstruction < complete); the exact values are
/// tunable.
pub mod checkpoints {
    /// Extraction maps its page completion onto `0..=EXTRACTION_END`.
    pub const EXTRACTION_END: f64 = 25.0;
    /// Chunking parks progress here while handing off to translation.
    pub const CHUNKING_HANDOFF: f64 = 30.0;
    /// Translation maps per-chunk completion onto
    /// `TRANSLATION_START..=TRANSLATION_END`.
    pub const TRANSLATION_START: f64 = 40.0;
    pub const TRANSLATION_END: f64 = 80.0;
    /// Reconstruction sets this on start and [`COMPLETE`] on success.
    pub const RECONSTRUCTION_START: f64 = 85.0;
    pub const COMPLETE: f64 = 100.0;
}

/// Kind of document accepted for submission, detected from the file
/// extension with a MIME cross-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
    Word,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            "doc" | "docx" => Some(DocumentKind::Word),
            _ => None,
        }
    }

    /// MIME type guess for the given path, used in validation diagnostics.
    pub fn detect_mime(path: &Path) -> Option<String> {
        mime_guess::from_path(path).first().map(|m| m.to_string())
    }
}

/// One job's persisted state, tracked end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub source_path: String,
    pub source_lang: String,
    pub target_lang: String,
    pub tier: Tier,
    pub status: JobStatus,
    /// Overall progress in [0, 100]; non-decreasing while non-terminal.
    pub progress: f64,
    pub total_pages: u32,
    pub processed_pages: u32,
    /// Artifact ref, set exactly once by the extraction stage.
    pub extraction_output: Option<String>,
    /// Artifact ref, set exactly once by the translation stage.
    pub translation_output: Option<String>,
    /// Artifact ref, set exactly once by the reconstruction stage.
    /// Non-null implies COMPLETED.
    pub final_output: Option<String>,
    /// Set only on the transition to FAILED, never cleared.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every write.
    pub revision: i64,
}

impl JobRecord {
    pub fn new(source_path: &str, source_lang: &str, target_lang: &str, tier: Tier) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            source_path: source_path.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            tier,
            status: JobStatus::Pending,
            progress: 0.0,
            total_pages: 0,
            processed_pages: 0,
            extraction_output: None,
            translation_output: None,
            final_output: None,
            error: None,
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }

    /// Raises progress to `value`, clamped into [0, 100]. A value below the
    /// stored one is ignored (progress resets are a bug, not a valid
    /// state). Returns whether the stored value changed.
    pub fn advance_progress(&mut self, value: f64) -> bool {
        let clamped = value.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
            true
        } else {
            false
        }
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Returned to the caller on submission.
#[derive(Debug, Clone, Serialize)]
pub struct JobReceipt {
    pub job_id: String,
    pub status: JobStatus,
    pub total_pages: u32,
    pub estimated_time: String,
}

/// External status view for polling callers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub total_pages: u32,
    pub processed_pages: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&JobRecord> for StatusReport {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            status: record.status,
            progress: record.progress,
            total_pages: record.total_pages,
            processed_pages: record.processed_pages,
            created_at: record.created_at,
            updated_at: record.updated_at,
            error: record.error.clone(),
        }
    }
}

/// Compact view of a non-terminal job for queue-status listings.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveJobView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub total_pages: u32,
}

impl From<&JobRecord> for ActiveJobView {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            status: record.status,
            progress: record.progress,
            total_pages: record.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_string_round_trip() {
        let all = [
            JobStatus::Pending,
            JobStatus::Extracting,
            JobStatus::Chunking,
            JobStatus::Translating,
            JobStatus::Reconstructing,
            JobStatus::Completed,
            JobStatus::Failed,
        ];
        for status in all {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("queued"), None);
        assert_eq!(JobStatus::parse("PENDING"), None);
        assert_eq!(JobStatus::parse(""), None);
    }

    #[test]
    fn test_tier_string_round_trip() {
        for tier in [Tier::Basic, Tier::Standard, Tier::Premium] {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("free"), None);
        assert_eq!(Tier::parse("Premium"), None);
    }

    #[test]
    fn test_happy_path_transitions() {
        use JobStatus::*;
        let path = [
            Pending,
            Extracting,
            Chunking,
            Translating,
            Reconstructing,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition(pair[1]),
                "{} -> {} should be valid",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_terminal_states_permit_nothing() {
        use JobStatus::*;
        let all = [
            Pending,
            Extracting,
            Chunking,
            Translating,
            Reconstructing,
            Completed,
            Failed,
        ];
        for next in all {
            assert!(!Completed.can_transition(next));
            assert!(!Failed.can_transition(next));
        }
    }

    #[test]
    fn test_any_non_terminal_can_fail() {
        use JobStatus::*;
        for from in [Pending, Extracting, Chunking, Translating, Reconstructing] {
            assert!(from.can_transition(Failed));
        }
    }

    #[test]
    fn test_no_stage_skipping() {
        use JobStatus::*;
        assert!(!Pending.can_transition(Chunking));
        assert!(!Extracting.can_transition(Translating));
        assert!(!Chunking.can_transition(Reconstructing));
        assert!(!Translating.can_transition(Completed));
        // No moving backwards either.
        assert!(!Translating.can_transition(Chunking));
        assert!(!Chunking.can_transition(Extracting));
    }

    #[test]
    fn test_advance_progress_is_monotonic() {
        let mut record = JobRecord::new("/tmp/doc.txt", "en", "vi", Tier::Standard);
        assert!(record.advance_progress(25.0));
        assert_eq!(record.progress, 25.0);
        // Lower values are ignored.
        assert!(!record.advance_progress(10.0));
        assert_eq!(record.progress, 25.0);
        // Out-of-range values are clamped.
        assert!(record.advance_progress(150.0));
        assert_eq!(record.progress, 100.0);
    }

    #[test]
    fn test_checkpoint_ordering() {
        use checkpoints::*;
        assert!(EXTRACTION_END < CHUNKING_HANDOFF);
        assert!(CHUNKING_HANDOFF < TRANSLATION_START);
        assert!(TRANSLATION_START < TRANSLATION_END);
        assert!(TRANSLATION_END < RECONSTRUCTION_START);
        assert!(RECONSTRUCTION_START < COMPLETE);
    }

    #[test]
    fn test_document_kind_detection() {
        assert_eq!(
            DocumentKind::from_path(&PathBuf::from("report.pdf")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_path(&PathBuf::from("notes.TXT")),
            Some(DocumentKind::Text)
        );
        assert_eq!(
            DocumentKind::from_path(&PathBuf::from("letter.docx")),
            Some(DocumentKind::Word)
        );
        assert_eq!(DocumentKind::from_path(&PathBuf::from("image.png")), None);
        assert_eq!(DocumentKind::from_path(&PathBuf::from("no_extension")), None);
    }

    #[test]
    fn test_new_record_defaults() {
        let record = JobRecord::new("/tmp/doc.txt", "en", "vi", Tier::Basic);
        assert!(!record.job_id.is_empty());
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress, 0.0);
        assert_eq!(record.revision, 1);
        assert!(record.extraction_output.is_none());
        assert!(record.final_output.is_none());
        assert!(record.error.is_none());
    }
}
