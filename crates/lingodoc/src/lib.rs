pub mod chunker;
pub mod config;
pub mod error;
pub mod extract;
pub mod job;
pub mod lang;
pub mod logging;
pub mod manager;
pub mod queue;
pub mod storage;
pub mod store;
pub mod translate;
pub mod worker;

pub use config::{load_config, PipelineConfig, WorkerCounts};
pub use error::{
    ConfigError, ExtractError, LingodocError, QueueError, Result, StageError, StorageError,
    TranslateError, ValidationError,
};
pub use extract::{DocumentExtractor, Page, PlainTextExtractor};
pub use job::{ActiveJobView, JobReceipt, JobRecord, JobStatus, StatusReport, Tier};
pub use manager::{
    NoopNotifier, QueueManager, QueueOverview, SubmitRequest, TaskNotifier, CANCELLED_BY_USER,
};
pub use queue::{Stage, StageQueue, StageQueues};
pub use storage::ArtifactStore;
pub use store::{Database, JobStore, SqliteJobStore, StoreError};
pub use translate::{OfflineTranslator, TranslatedChunk, Translator};
pub use worker::WorkerPool;
