//! Document extraction boundary.
//!
//! The extraction stage delegates the actual text/table/OCR work to a
//! [`DocumentExtractor`]; the pipeline only sees the resulting pages.
//! A plain-text implementation ships in-tree — real PDF and Word engines
//! plug in behind the same trait.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::job::DocumentKind;

/// Pages use form-feed separators in plain-text documents.
pub const PAGE_SEPARATOR: char = '\u{000C}';

/// One extracted page, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<Page>, ExtractError>;
}

/// Extractor for plain-text documents, with form-feed page breaks.
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<Page>, ExtractError> {
        match DocumentKind::from_path(path) {
            Some(DocumentKind::Text) => {}
            _ => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                return Err(ExtractError::UnsupportedFormat(name));
            }
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ExtractError::ReadDocument {
                path: path.to_path_buf(),
                source: e,
            })?;

        let pages = content
            .split(PAGE_SEPARATOR)
            .enumerate()
            .map(|(i, text)| Page {
                number: (i + 1) as u32,
                text: text.trim().to_string(),
            })
            .collect();
        Ok(pages)
    }
}
