//! Language-code normalization for submissions.
//!
//! Callers send anything from `"en"` to `"English"`; the pipeline stores
//! canonical lowercase codes. Unknown codes pass through lowercased so new
//! provider-supported languages need no code change here.

use crate::error::ValidationError;

/// Common aliases mapped to canonical codes.
const ALIASES: &[(&str, &str)] = &[
    ("english", "en"),
    ("eng", "en"),
    ("vietnamese", "vi"),
    ("vie", "vi"),
    ("chinese", "zh"),
    ("chi", "zh"),
    ("japanese", "ja"),
    ("jpn", "ja"),
    ("korean", "ko"),
    ("kor", "ko"),
    ("french", "fr"),
    ("fra", "fr"),
    ("german", "de"),
    ("deu", "de"),
    ("spanish", "es"),
    ("spa", "es"),
];

/// Normalizes a caller-supplied language identifier to a canonical code.
///
/// `"auto"` is accepted as a source-language wildcard. Anything that is not
/// a short alphabetic token is rejected.
pub fn normalize(value: &str) -> Result<String, ValidationError> {
    let lowered = value.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(ValidationError::InvalidLanguage(value.to_string()));
    }
    if lowered == "auto" {
        return Ok(lowered);
    }
    if let Some((_, code)) = ALIASES.iter().find(|(alias, _)| *alias == lowered) {
        return Ok((*code).to_string());
    }
    if lowered.len() <= 8 && lowered.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(lowered);
    }
    Err(ValidationError::InvalidLanguage(value.to_string()))
}
