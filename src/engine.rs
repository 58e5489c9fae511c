//! Normalization engine seam.
//!
//! HTML sanitation, Markdown handling and formula discovery are delegated to
//! a [`NormalizationEngine`]. Hosts may plug in their own engine (for example
//! a compiled module shared with other tools); [`BuiltinEngine`] covers every
//! operation with the crate's own HTML and Markdown code.
//!
//! Engines declare the API revision they implement. The orchestrator refuses
//! engines of any other revision at construction time instead of failing in
//! the middle of a copy.

use crate::common::error::{Error, Result};
use crate::html::{PreparedOffice, html_to_office, prepare_office};
use crate::markdown::{MarkdownOptions, html_to_markdown, markdown_to_html};

/// Engine API revision this crate speaks
pub const ENGINE_API_VERSION: u32 = 3;

pub trait NormalizationEngine: Send + Sync {
    fn api_version(&self) -> u32;

    /// Normalize HTML for Office and replace formulas with placeholders.
    fn html_to_office_with_math(&self, html: &str) -> Result<PreparedOffice>;

    /// Render Markdown to Office HTML and replace formulas with placeholders.
    fn markdown_to_office_with_math(&self, markdown: &str) -> Result<PreparedOffice>;

    fn html_to_markdown(&self, html: &str) -> Result<String>;

    /// Normalize HTML for Office without touching formulas.
    fn html_to_office(&self, html: &str) -> Result<String>;
}

/// Reject engines built against another API revision.
pub fn check_engine(engine: &dyn NormalizationEngine) -> Result<()> {
    let found = engine.api_version();
    if found != ENGINE_API_VERSION {
        tracing::warn!(expected = ENGINE_API_VERSION, found, "normalization engine version mismatch");
        return Err(Error::EngineVersion {
            expected: ENGINE_API_VERSION,
            found,
        });
    }
    Ok(())
}

/// Engine backed by the crate's own HTML and Markdown code
#[derive(Debug, Clone, Default)]
pub struct BuiltinEngine {
    markdown: MarkdownOptions,
}

impl BuiltinEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markdown_options(mut self, options: MarkdownOptions) -> Self {
        self.markdown = options;
        self
    }
}

impl NormalizationEngine for BuiltinEngine {
    fn api_version(&self) -> u32 {
        ENGINE_API_VERSION
    }

    fn html_to_office_with_math(&self, html: &str) -> Result<PreparedOffice> {
        Ok(prepare_office(&html_to_office(html)))
    }

    fn markdown_to_office_with_math(&self, markdown: &str) -> Result<PreparedOffice> {
        Ok(prepare_office(&html_to_office(&markdown_to_html(markdown))))
    }

    fn html_to_markdown(&self, html: &str) -> Result<String> {
        Ok(html_to_markdown(html, &self.markdown))
    }

    fn html_to_office(&self, html: &str) -> Result<String> {
        Ok(html_to_office(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::MathSource;
    use crate::testing::StaleEngine;

    #[test]
    fn test_version_check() {
        assert!(check_engine(&BuiltinEngine::new()).is_ok());
        assert_eq!(
            check_engine(&StaleEngine),
            Err(Error::EngineVersion {
                expected: ENGINE_API_VERSION,
                found: 2
            })
        );
    }

    #[test]
    fn test_markdown_source_yields_math_jobs() {
        let prepared = BuiltinEngine::new()
            .markdown_to_office_with_math("**Energy**: $$E=mc^2$$")
            .unwrap();
        assert_eq!(prepared.jobs.len(), 1);
        assert!(prepared.html.contains("<b>Energy</b>"));
        assert!(matches!(
            &prepared.jobs[0].source,
            MathSource::Tex { latex, display: true } if latex == "E=mc^2"
        ));
    }

    #[test]
    fn test_html_to_markdown() {
        let markdown = BuiltinEngine::new()
            .html_to_markdown("<p>x <code>y</code></p>")
            .unwrap();
        assert_eq!(markdown, "x `y`");
    }
}
