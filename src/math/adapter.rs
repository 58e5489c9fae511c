//! Conversion adapter: one TeX string in, one MathML element out.
//!
//! Backends are tried strictly in order, one at a time, each under its own
//! time budget. The first success wins and is cached under the normalized
//! source; failures and timeouts are logged and fall through to the next
//! backend.

use super::backend::{Backend, BackendKind};
use super::cache::{CacheKey, CacheMode, SharedCache};
use super::normalize::{normalize_for_backend, normalize_latex};
use crate::common::{Error, Result};
use crate::config::TimeoutConfig;
use tokio::time::Instant;

/// Ordered backend list plus the shared conversion cache.
#[derive(Debug)]
pub struct ConversionAdapter {
    backends: Vec<Backend>,
    cache: SharedCache,
    timeouts: TimeoutConfig,
}

impl ConversionAdapter {
    /// Adapter with only the local converter.
    pub fn new(cache: SharedCache, timeouts: TimeoutConfig) -> Self {
        Self {
            backends: vec![Backend::local()],
            cache,
            timeouts,
        }
    }

    /// Adapter with an explicit backend order.
    pub fn with_backends(backends: Vec<Backend>, cache: SharedCache, timeouts: TimeoutConfig) -> Self {
        Self {
            backends,
            cache,
            timeouts,
        }
    }

    /// Append a backend after the existing ones.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backend_kinds(&self) -> Vec<BackendKind> {
        self.backends.iter().map(Backend::kind).collect()
    }

    #[inline]
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Convert TeX to MathML.
    ///
    /// # Example
    /// ```
    /// use officeclip::math::{ConversionAdapter, SharedCache};
    /// use officeclip::config::TimeoutConfig;
    ///
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// let adapter = ConversionAdapter::new(SharedCache::new(16), TimeoutConfig::default());
    /// let mathml = rt.block_on(adapter.convert("E=mc^2", true)).unwrap();
    /// assert!(mathml.contains("display=\"block\""));
    /// ```
    pub async fn convert(&self, latex: &str, display: bool) -> Result<String> {
        let normalized = normalize_latex(latex);
        if normalized.is_empty() {
            return Err(Error::backend("adapter", "empty formula"));
        }

        let key = CacheKey::new(CacheMode::for_display(display), normalized.as_str());
        if let Some(hit) = self.cache.get(&key) {
            let is_display = display;
            tracing::debug!(is_display, "conversion cache hit");
            return Ok(hit);
        }

        let mut failures: Vec<String> = Vec::new();
        for backend in &self.backends {
            let kind = backend.kind();
            let input = normalize_for_backend(&normalized, kind);

            if let Some(reason) = backend.skip_reason(&input) {
                tracing::debug!(backend = %kind, %reason, "backend skipped");
                failures.push(format!("{}: skipped ({})", kind, reason));
                continue;
            }

            let budget = backend.time_budget(&self.timeouts);
            let started = Instant::now();
            match tokio::time::timeout(budget, backend.convert(&input, display)).await {
                Ok(Ok(mathml)) => {
                    tracing::debug!(backend = %kind, elapsed_ms = started.elapsed().as_millis() as u64, "converted");
                    self.cache.put(key, mathml.clone());
                    return Ok(mathml);
                },
                Ok(Err(e)) => {
                    tracing::warn!(backend = %kind, error = %e, "backend failed, falling back");
                    backend.reset();
                    failures.push(format!("{}: {}", kind, e));
                },
                Err(_) => {
                    let e = Error::timeout(format!("converting with the {} backend", kind), started.elapsed());
                    tracing::warn!(backend = %kind, budget_ms = budget.as_millis() as u64, "backend timed out, falling back");
                    backend.reset();
                    failures.push(format!("{}: {}", kind, e));
                },
            }
        }

        if failures.is_empty() {
            return Err(Error::backend("adapter", "no backend configured"));
        }
        Err(Error::backend("adapter", failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusRequest, BusResponse, BusTarget};
    use crate::math::backend::EngineBridge;
    use crate::testing::{FakeBus, FakeMathEngine};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn remote_bus() -> Arc<FakeBus> {
        let bus = Arc::new(FakeBus::new());
        bus.respond_with(BusTarget::Offscreen, |request| match request {
            BusRequest::ConvertTex { latex, display } => BusResponse::success(format!(
                "<math display=\"{}\"><mtext>{}</mtext></math>",
                if *display { "block" } else { "inline" },
                latex
            )),
            _ => BusResponse::failure("unexpected"),
        });
        bus
    }

    #[tokio::test]
    async fn test_local_first_then_cached() {
        let adapter = ConversionAdapter::new(SharedCache::new(8), TimeoutConfig::default());
        let first = adapter.convert("x^2", false).await.unwrap();
        let second = adapter.convert("x^2", false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(adapter.cache().stats().hits, 1);
        assert_eq!(adapter.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_normalized_source_is_the_cache_key() {
        let adapter = ConversionAdapter::new(SharedCache::new(8), TimeoutConfig::default());
        adapter.convert("x\u{200B}+1", false).await.unwrap();
        adapter.convert(" x+1 ", false).await.unwrap();
        assert_eq!(adapter.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_display_and_inline_are_separate_entries() {
        let adapter = ConversionAdapter::new(SharedCache::new(8), TimeoutConfig::default());
        adapter.convert("a", false).await.unwrap();
        adapter.convert("a", true).await.unwrap();
        assert_eq!(adapter.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_input_falls_through_to_cross_context() {
        let bus = remote_bus();
        let adapter = ConversionAdapter::new(SharedCache::new(8), TimeoutConfig::default())
            .with_backend(Backend::cross_context(bus.clone(), BusTarget::Offscreen));

        let mathml = adapter.convert("\\begin{cases}a\\end{cases}", true).await.unwrap();
        assert!(mathml.contains("<mtext>\\begin{cases}a\\end{cases}</mtext>"));
        assert_eq!(bus.requests_to(BusTarget::Offscreen), 1);
    }

    #[tokio::test]
    async fn test_supported_input_never_leaves_the_process() {
        let bus = remote_bus();
        let adapter = ConversionAdapter::new(SharedCache::new(8), TimeoutConfig::default())
            .with_backend(Backend::cross_context(bus.clone(), BusTarget::Offscreen));
        adapter.convert("\\frac{a}{b}", false).await.unwrap();
        assert_eq!(bus.requests_to(BusTarget::Offscreen), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_through_to_engine() {
        let slow = Arc::new(FakeBus::new().with_delay(Duration::from_secs(60)));
        slow.respond(BusTarget::Offscreen, BusResponse::success("<math/>"));
        let engine = Arc::new(FakeMathEngine::new());
        let timeouts = TimeoutConfig::default();
        let adapter = ConversionAdapter::with_backends(
            vec![
                Backend::cross_context(slow, BusTarget::Offscreen),
                Backend::embedded(EngineBridge::Direct(engine.clone()), &timeouts),
            ],
            SharedCache::new(8),
            timeouts,
        );

        let mathml = adapter.convert("\\mathscr{L}", false).await.unwrap();
        assert!(mathml.contains("\\mathscr{L}"));
        assert_eq!(engine.conversions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_backends_failing_reports_each() {
        let adapter = ConversionAdapter::with_backends(
            vec![
                Backend::local(),
                Backend::cross_context(Arc::new(FakeBus::new()), BusTarget::Offscreen),
            ],
            SharedCache::new(8),
            TimeoutConfig::default(),
        );
        let err = adapter.convert("\\overbrace{x}", false).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("local: skipped"));
        assert!(message.contains("cross-context"));
        assert!(adapter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_empty_formula_is_rejected() {
        let adapter = ConversionAdapter::new(SharedCache::new(8), TimeoutConfig::default());
        assert!(adapter.convert(" \u{200B} ", false).await.is_err());
    }
}
