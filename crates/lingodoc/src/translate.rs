//! Translation provider boundary.
//!
//! The translation stage delegates provider calls to a [`Translator`]; the
//! tier selects the provider strategy inside the implementation. Providers
//! must preserve [`BATCH_SEPARATOR`] so batched calls can be split back
//! into per-chunk results.

use serde::{Deserialize, Serialize};

use crate::error::TranslateError;
use crate::job::Tier;

/// Separator used when several chunks are sent as one batched call.
/// Implementations translate the parts independently and keep the
/// separator intact.
pub const BATCH_SEPARATOR: &str = "\n\u{241F}\n";

/// A chunk after translation, still tied to its originating page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedChunk {
    pub index: u32,
    pub page: u32,
    pub text: String,
}

pub trait Translator: Send + Sync {
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        tier: Tier,
    ) -> Result<String, TranslateError>;
}

/// Deterministic provider-less translator: tags each part with the
/// language pair and tier. Used by tests and deployments without a
/// configured provider.
pub struct OfflineTranslator;

impl Translator for OfflineTranslator {
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        tier: Tier,
    ) -> Result<String, TranslateError> {
        let parts: Vec<String> = text
            .split(BATCH_SEPARATOR)
            .map(|part| {
                if part.trim().is_empty() {
                    part.to_string()
                } else {
                    format!("[{}->{}|{}] {}", source_lang, target_lang, tier, part)
                }
            })
            .collect();
        Ok(parts.join(BATCH_SEPARATOR))
    }
}
