//! Pipeline configuration.
//!
//! Loaded from JSON with per-field defaults, then validated. Every field
//! can be omitted; the defaults run a single-process pipeline with pool
//! sizes derived from the machine's core count.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root directory for per-job artifacts (extracted pages, translated
    /// chunks, final output).
    pub artifact_dir: PathBuf,
    /// Target chunk size in characters for the translation splitter.
    pub chunk_target_chars: usize,
    /// Chunk counts up to this value are translated as one batched call;
    /// larger jobs go chunk-by-chunk.
    pub batch_max_chunks: usize,
    /// Bounded wait for each queue pop, in milliseconds.
    pub poll_timeout_ms: u64,
    /// Uploads larger than this are rejected at submission.
    pub max_file_size_mb: f64,
    /// Worker threads per stage.
    pub workers: WorkerCounts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerCounts {
    pub extraction: usize,
    pub chunking: usize,
    pub translation: usize,
    pub reconstruction: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("data/artifacts"),
            chunk_target_chars: 1000,
            batch_max_chunks: 8,
            poll_timeout_ms: 500,
            max_file_size_mb: 100.0,
            workers: WorkerCounts::default(),
        }
    }
}

impl Default for WorkerCounts {
    fn default() -> Self {
        // Extraction and translation dominate wall-clock time; chunking is
        // a pass-through and reconstruction is one write.
        let heavy = num_cpus::get().clamp(2, 8);
        Self {
            extraction: heavy,
            chunking: 1,
            translation: heavy,
            reconstruction: 1,
        }
    }
}

impl PipelineConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_target_chars == 0 {
            return Err(ConfigError::Validation {
                message: "chunk_target_chars must be greater than 0".to_string(),
            });
        }
        if self.batch_max_chunks == 0 {
            return Err(ConfigError::Validation {
                message: "batch_max_chunks must be greater than 0".to_string(),
            });
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Validation {
                message: "poll_timeout_ms must be greater than 0".to_string(),
            });
        }
        if self.max_file_size_mb <= 0.0 {
            return Err(ConfigError::Validation {
                message: "max_file_size_mb must be positive".to_string(),
            });
        }
        let counts = [
            ("extraction", self.workers.extraction),
            ("chunking", self.workers.chunking),
            ("translation", self.workers.translation),
            ("reconstruction", self.workers.reconstruction),
        ];
        for (stage, count) in counts {
            if count == 0 {
                return Err(ConfigError::Validation {
                    message: format!("workers.{} must be at least 1", stage),
                });
            }
        }
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert!(config.workers.extraction >= config.workers.reconstruction);
        assert!(config.workers.translation >= config.workers.chunking);
    }

    #[test]
    fn test_load_partial_config() {
        let config = load_config_from_str(
            r#"{
                "chunk_target_chars": 500,
                "workers": { "translation": 6 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.chunk_target_chars, 500);
        assert_eq!(config.workers.translation, 6);
        // Untouched fields keep their defaults.
        assert_eq!(config.batch_max_chunks, 8);
        assert_eq!(config.workers.chunking, 1);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(load_config_from_str(r#"{ "chunk_size": 500 }"#).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = load_config_from_str(r#"{ "workers": { "extraction": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("workers.extraction"));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(load_config_from_str(r#"{ "chunk_target_chars": 0 }"#).is_err());
    }
}
