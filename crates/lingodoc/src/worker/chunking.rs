//! Chunking stage: a pure pass-through.
//!
//! The state graph gives this stage no failure edge, so it must not do
//! fallible work — the actual chunk computation happens at the start of the
//! translation stage. This stage parks progress at the hand-off checkpoint
//! and forwards the job.

use crate::error::StageError;
use crate::job::{checkpoints, JobRecord};
use crate::queue::Stage;

use super::{StageContext, StageFields, StageHandler, StageOutcome};

pub struct ChunkingStage;

impl StageHandler for ChunkingStage {
    fn stage(&self) -> Stage {
        Stage::Chunking
    }

    fn process(
        &self,
        _job: &JobRecord,
        _cx: &StageContext,
    ) -> Result<StageOutcome, StageError> {
        Ok(StageOutcome::Advance(StageFields {
            progress: Some(checkpoints::CHUNKING_HANDOFF),
            ..Default::default()
        }))
    }
}
