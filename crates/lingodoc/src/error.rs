use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LingodocError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Submission problems reported to the caller synchronously, before any
/// job record exists.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {size_mb:.1}MB (max {limit_mb:.0}MB)")]
    FileTooLarge { size_mb: f64, limit_mb: f64 },

    #[error("File is empty: {0}")]
    EmptyFile(PathBuf),

    #[error("Failed to read input file '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid language code: '{0}'")]
    InvalidLanguage(String),

    #[error("Job already completed: {0}")]
    AlreadyCompleted(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Storage(#[from] crate::store::StoreError),

    #[error("Queue channel disconnected")]
    Disconnected,

    #[error("Queue lock poisoned")]
    LockPoisoned,
}

/// Failures raised while performing one stage's unit of work.
///
/// Infrastructure variants abort the worker's current iteration without
/// touching the job; every other variant marks the job FAILED with the
/// error's display text.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("extraction produced no text")]
    EmptyExtraction,

    #[error("translation failed: {0}")]
    Translation(#[from] TranslateError),

    #[error("missing {0} artifact")]
    MissingArtifact(&'static str),

    #[error("artifact error: {0}")]
    Artifact(#[from] StorageError),

    #[error("store unavailable: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("queue unavailable: {0}")]
    Queue(#[from] QueueError),

    #[error("job reached a terminal state mid-stage")]
    Interrupted,
}

impl StageError {
    /// Infrastructure failures are not the job's fault: the iteration is
    /// aborted and the job left untouched for a later attempt.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, StageError::Store(_) | StageError::Queue(_))
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Translation provider error: {0}")]
    Provider(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact '{path}': {source}")]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact JSON error at '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, LingodocError>;
