//! Artifact storage for intermediate and final stage outputs.
//!
//! Each job gets a directory under the configured root: extracted pages and
//! translated chunks as JSON, the reconstructed document as plain text.
//! Job records carry refs relative to the root, so the root can move
//! without rewriting records.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::extract::Page;
use crate::translate::TranslatedChunk;

const PAGES_FILE: &str = "pages.json";
const CHUNKS_FILE: &str = "chunks.json";
const FINAL_FILE: &str = "translated.txt";

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::CreateDirectory {
            path: root.clone(),
            source: e,
        })?;
        Ok(Self { root })
    }

    /// Absolute path for a ref stored on a job record.
    pub fn resolve(&self, artifact_ref: &str) -> PathBuf {
        self.root.join(artifact_ref)
    }

    pub fn write_pages(&self, job_id: &str, pages: &[Page]) -> Result<String, StorageError> {
        self.write_json(job_id, PAGES_FILE, pages)
    }

    pub fn read_pages(&self, artifact_ref: &str) -> Result<Vec<Page>, StorageError> {
        self.read_json(artifact_ref)
    }

    pub fn write_chunks(
        &self,
        job_id: &str,
        chunks: &[TranslatedChunk],
    ) -> Result<String, StorageError> {
        self.write_json(job_id, CHUNKS_FILE, chunks)
    }

    pub fn read_chunks(&self, artifact_ref: &str) -> Result<Vec<TranslatedChunk>, StorageError> {
        self.read_json(artifact_ref)
    }

    pub fn write_final(&self, job_id: &str, document: &str) -> Result<String, StorageError> {
        let artifact_ref = self.prepare(job_id, FINAL_FILE)?;
        let path = self.resolve(&artifact_ref);
        std::fs::write(&path, document)
            .map_err(|e| StorageError::WriteArtifact { path, source: e })?;
        Ok(artifact_ref)
    }

    pub fn read_final(&self, artifact_ref: &str) -> Result<String, StorageError> {
        let path = self.resolve(artifact_ref);
        std::fs::read_to_string(&path)
            .map_err(|e| StorageError::ReadArtifact { path, source: e })
    }

    /// Creates the job directory and returns the relative ref for `file`.
    fn prepare(&self, job_id: &str, file: &str) -> Result<String, StorageError> {
        let dir = self.root.join(job_id);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir,
            source: e,
        })?;
        Ok(format!("{}/{}", job_id, file))
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        job_id: &str,
        file: &str,
        value: &T,
    ) -> Result<String, StorageError> {
        let artifact_ref = self.prepare(job_id, file)?;
        let path = self.resolve(&artifact_ref);
        let payload = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Json {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, payload)
            .map_err(|e| StorageError::WriteArtifact { path, source: e })?;
        Ok(artifact_ref)
    }

    fn read_json<T: DeserializeOwned>(&self, artifact_ref: &str) -> Result<T, StorageError> {
        let path = self.resolve(artifact_ref);
        let payload = std::fs::read(&path).map_err(|e| StorageError::ReadArtifact {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_slice(&payload).map_err(|e| StorageError::Json { path, source: e })
    }
}
