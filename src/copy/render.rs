// Formula rendering for prepared Office HTML
//
// Jobs are rendered one at a time in document order. A job that fails falls
// back to its original markup so a single bad formula never sinks the copy.

use crate::common::Result;
use crate::config::CopyConfig;
use crate::html::{MathJob, MathSource, html_to_plain_text, office_math_html};
use crate::math::{Backend, ConversionAdapter, SharedCache, normalize_latex};
use crate::omml::OmmlTransformer;

/// Rendered markup for every job, in job order, plus what had to degrade
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub rendered: Vec<String>,
    pub degraded: Vec<String>,
}

impl RenderReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// TeX → MathML → OMML pipeline sharing one conversion cache
#[derive(Debug)]
pub struct MathRenderer {
    adapter: ConversionAdapter,
    omml: OmmlTransformer,
}

impl MathRenderer {
    /// Renderer whose adapter and transformer share the adapter's cache.
    pub fn new(adapter: ConversionAdapter) -> Self {
        let omml = OmmlTransformer::new(adapter.cache().clone());
        Self { adapter, omml }
    }

    /// Renderer sized and timed from configuration, trying `backends` in order.
    pub fn from_config(config: &CopyConfig, backends: Vec<Backend>) -> Self {
        let cache = SharedCache::new(config.cache.capacity);
        Self::new(ConversionAdapter::with_backends(backends, cache, config.timeouts))
    }

    #[inline]
    pub fn adapter(&self) -> &ConversionAdapter {
        &self.adapter
    }

    pub async fn render(&self, jobs: &[MathJob]) -> RenderReport {
        let mut report = RenderReport {
            rendered: Vec::with_capacity(jobs.len()),
            degraded: Vec::new(),
        };

        for job in jobs {
            match self.render_job(job).await {
                Ok(markup) => report.rendered.push(markup),
                Err(e) => {
                    tracing::warn!(job = job.id, error = %e, "formula degraded to its source text");
                    report.degraded.push(format!("formula {}: {}", job.id, e));
                    report.rendered.push(job.fallback.clone());
                },
            }
        }

        tracing::debug!(
            jobs = jobs.len(),
            degraded = report.degraded.len(),
            "formulas rendered"
        );
        report
    }

    async fn render_job(&self, job: &MathJob) -> Result<String> {
        match &job.source {
            MathSource::Tex { latex, display } => self.render_tex(latex, *display).await,
            MathSource::MathMl(mathml) => {
                let omml = self.omml.transform(mathml)?;
                Ok(office_math_html(&omml, html_to_plain_text(mathml).trim()))
            },
        }
    }

    /// Render one TeX formula as an Office math block.
    pub async fn render_tex(&self, latex: &str, display: bool) -> Result<String> {
        let mathml = self.adapter.convert(latex, display).await?;
        let omml = self.omml.transform(&mathml)?;
        Ok(office_math_html(&omml, &normalize_latex(latex)))
    }
}
