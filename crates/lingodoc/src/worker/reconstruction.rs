//! Reconstruction stage: assembles the translated document.
//!
//! Translated chunks are grouped by originating page in ascending order and
//! concatenated under per-page banners; the result is written as the job's
//! final output.

use std::collections::BTreeMap;

use log::info;

use crate::error::StageError;
use crate::job::{checkpoints, JobRecord};
use crate::queue::Stage;
use crate::translate::TranslatedChunk;

use super::{StageContext, StageHandler, StageOutcome};

pub struct ReconstructionStage;

impl StageHandler for ReconstructionStage {
    fn stage(&self) -> Stage {
        Stage::Reconstruction
    }

    fn process(
        &self,
        job: &JobRecord,
        cx: &StageContext,
    ) -> Result<StageOutcome, StageError> {
        cx.update_progress(&job.job_id, checkpoints::RECONSTRUCTION_START, None)?;

        let chunks_ref = job
            .translation_output
            .as_deref()
            .ok_or(StageError::MissingArtifact("translation"))?;
        let chunks = cx.artifacts.read_chunks(chunks_ref)?;

        let document = assemble_document(&chunks);
        let artifact = cx.artifacts.write_final(&job.job_id, &document)?;

        info!(
            "job {}: reconstructed document from {} chunk(s)",
            job.job_id,
            chunks.len()
        );

        Ok(StageOutcome::Finished {
            final_output: artifact,
        })
    }
}

/// Pages in ascending order, chunks within a page in index order, each page
/// under its own banner.
fn assemble_document(chunks: &[TranslatedChunk]) -> String {
    let mut by_page: BTreeMap<u32, Vec<&TranslatedChunk>> = BTreeMap::new();
    for chunk in chunks {
        by_page.entry(chunk.page).or_default().push(chunk);
    }

    let mut sections = Vec::with_capacity(by_page.len());
    for (page, mut page_chunks) in by_page {
        page_chunks.sort_by_key(|c| c.index);
        let body = page_chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("===== Page {page} =====\n{body}"));
    }
    sections.join("\n\n")
}
