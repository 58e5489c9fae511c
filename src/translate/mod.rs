//! Translation collaborator and the anchoring protocol around it.
//!
//! The pipeline never talks to a translation service directly. It anchors
//! the HTML, hands the anchored text to a [`Translator`], then restores the
//! protected spans. Formula text is only sent for translation when the
//! chosen service understands TeX.

mod anchor;

pub use anchor::{
    AnchorKind, AnchorToken, AnchoredHtml, RestoreOutcome, TOKEN_PREFIX, anchor, anchor_with_nonce, restore,
};

use crate::common::error::Result;
use async_trait::async_trait;

/// Services backed by a language model, which can translate the prose inside
/// TeX without breaking it.
pub const FORMULA_CAPABLE_SERVICES: &[&str] = &["chatgpt", "gemini", "pollinations", "custom"];

/// Progress report from a long translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationProgress {
    pub done: usize,
    pub total: usize,
}

pub type ProgressFn = dyn Fn(TranslationProgress) + Send + Sync;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate an HTML fragment, leaving tags and anchor tokens alone.
    async fn translate(
        &self,
        html: &str,
        target_lang: &str,
        service: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<String>;

    /// Translate the natural-language parts of TeX formulas, one output per input.
    async fn translate_formulas(&self, formulas: &[String], service: &str, target_lang: &str) -> Result<Vec<String>>;

    fn supports_formula_translation(&self, service: &str) -> bool {
        service_translates_formulas(service)
    }
}

/// Whether `service` is one of [`FORMULA_CAPABLE_SERVICES`].
#[inline]
pub fn service_translates_formulas(service: &str) -> bool {
    FORMULA_CAPABLE_SERVICES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(service.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_capable_services() {
        assert!(service_translates_formulas("chatgpt"));
        assert!(service_translates_formulas(" Gemini "));
        assert!(service_translates_formulas("custom"));
        assert!(!service_translates_formulas("google"));
        assert!(!service_translates_formulas("microsoft"));
    }
}
