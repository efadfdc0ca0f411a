//! Extraction stage: turns the source document into pages.

use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::error::StageError;
use crate::extract::DocumentExtractor;
use crate::job::{checkpoints, JobRecord};
use crate::queue::Stage;

use super::{StageContext, StageFields, StageHandler, StageOutcome};

pub struct ExtractionStage {
    extractor: Arc<dyn DocumentExtractor>,
}

impl ExtractionStage {
    pub fn new(extractor: Arc<dyn DocumentExtractor>) -> Self {
        Self { extractor }
    }
}

impl StageHandler for ExtractionStage {
    fn stage(&self) -> Stage {
        Stage::Extraction
    }

    fn process(
        &self,
        job: &JobRecord,
        cx: &StageContext,
    ) -> Result<StageOutcome, StageError> {
        let path = PathBuf::from(&job.source_path);
        let pages = self.extractor.extract(&path)?;

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            return Err(StageError::EmptyExtraction);
        }

        let total = pages.len() as u32;
        // Page-granular checkpoints mapped onto the extraction span, so
        // pollers see movement on large documents.
        for done in 1..=pages.len() {
            let completion = done as f64 / total as f64;
            cx.update_progress(
                &job.job_id,
                completion * checkpoints::EXTRACTION_END,
                None,
            )?;
        }

        let artifact = cx.artifacts.write_pages(&job.job_id, &pages)?;
        info!("job {}: extracted {} page(s)", job.job_id, total);

        Ok(StageOutcome::Advance(StageFields {
            progress: Some(checkpoints::EXTRACTION_END),
            total_pages: Some(total),
            extraction_output: Some(artifact),
            ..Default::default()
        }))
    }
}
