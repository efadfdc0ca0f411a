//! Translation stage: splits extracted pages into bounded chunks and
//! translates them.
//!
//! Small jobs go as one batched provider call (chunks joined with the batch
//! separator); a failed or misaligned batch falls back to per-chunk calls.
//! Large jobs translate chunk-by-chunk from the start, updating progress
//! and processed pages after every chunk so pollers see continuous
//! advancement.

use std::sync::Arc;

use log::{debug, warn};

use crate::chunker::{Chunk, Chunker};
use crate::error::{StageError, TranslateError};
use crate::job::{checkpoints, JobRecord};
use crate::queue::Stage;
use crate::translate::{TranslatedChunk, Translator, BATCH_SEPARATOR};

use super::{StageContext, StageFields, StageHandler, StageOutcome};

pub struct TranslationStage {
    translator: Arc<dyn Translator>,
    chunker: Chunker,
}

impl TranslationStage {
    pub fn new(translator: Arc<dyn Translator>, chunk_target_chars: usize) -> Self {
        Self {
            translator,
            chunker: Chunker::new(chunk_target_chars),
        }
    }

    fn translate_batched(
        &self,
        chunks: &[Chunk],
        job: &JobRecord,
    ) -> Result<Vec<TranslatedChunk>, TranslateError> {
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(BATCH_SEPARATOR);

        let output =
            self.translator
                .translate(&joined, &job.source_lang, &job.target_lang, job.tier)?;

        let parts: Vec<&str> = output.split(BATCH_SEPARATOR).collect();
        if parts.len() != chunks.len() {
            return Err(TranslateError::Provider(format!(
                "batched call returned {} part(s) for {} chunk(s)",
                parts.len(),
                chunks.len()
            )));
        }

        Ok(chunks
            .iter()
            .zip(parts)
            .map(|(chunk, text)| TranslatedChunk {
                index: chunk.index,
                page: chunk.page,
                text: text.to_string(),
            })
            .collect())
    }

    fn translate_individually(
        &self,
        chunks: &[Chunk],
        job: &JobRecord,
        cx: &StageContext,
    ) -> Result<Vec<TranslatedChunk>, StageError> {
        let span = checkpoints::TRANSLATION_END - checkpoints::TRANSLATION_START;
        let mut translated = Vec::with_capacity(chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            let text = self.translator.translate(
                &chunk.text,
                &job.source_lang,
                &job.target_lang,
                job.tier,
            )?;
            translated.push(TranslatedChunk {
                index: chunk.index,
                page: chunk.page,
                text,
            });

            let completion = (i + 1) as f64 / chunks.len() as f64;
            cx.update_progress(
                &job.job_id,
                checkpoints::TRANSLATION_START + completion * span,
                Some(pages_completed(chunks, i + 1)),
            )?;
        }

        Ok(translated)
    }
}

impl StageHandler for TranslationStage {
    fn stage(&self) -> Stage {
        Stage::Translation
    }

    fn process(
        &self,
        job: &JobRecord,
        cx: &StageContext,
    ) -> Result<StageOutcome, StageError> {
        let pages_ref = job
            .extraction_output
            .as_deref()
            .ok_or(StageError::MissingArtifact("extraction"))?;
        let pages = cx.artifacts.read_pages(pages_ref)?;
        let chunks = self.chunker.split_pages(&pages);

        cx.update_progress(&job.job_id, checkpoints::TRANSLATION_START, None)?;

        let translated = if chunks.is_empty() {
            // Nothing to translate is not an error; reconstruction handles
            // the empty artifact.
            debug!("job {}: no chunks to translate", job.job_id);
            Vec::new()
        } else if chunks.len() <= cx.config().batch_max_chunks {
            match self.translate_batched(&chunks, job) {
                Ok(translated) => translated,
                Err(e) => {
                    warn!(
                        "job {}: batched translation failed ({}), falling back to per-chunk calls",
                        job.job_id, e
                    );
                    self.translate_individually(&chunks, job, cx)?
                }
            }
        } else {
            self.translate_individually(&chunks, job, cx)?
        };

        let artifact = cx.artifacts.write_chunks(&job.job_id, &translated)?;
        debug!(
            "job {}: translated {} chunk(s)",
            job.job_id,
            translated.len()
        );

        Ok(StageOutcome::Advance(StageFields {
            progress: Some(checkpoints::TRANSLATION_END),
            translation_output: Some(artifact),
            ..Default::default()
        }))
    }
}

/// Number of pages whose chunks are all translated after `done` chunks.
/// Chunks are ordered by page, so only the last touched page can be
/// partial.
fn pages_completed(chunks: &[Chunk], done: usize) -> u32 {
    let mut pages = std::collections::BTreeSet::new();
    for chunk in &chunks[..done] {
        pages.insert(chunk.page);
    }
    if let Some(last) = chunks[..done].last() {
        if chunks[done..].iter().any(|c| c.page == last.page) {
            pages.remove(&last.page);
        }
    }
    pages.len() as u32
}
