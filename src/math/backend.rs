//! TeX → MathML conversion backends.
//!
//! Three strategies exist, from cheapest to most capable:
//!
//! - [`Backend::Local`]: the in-process restricted-grammar converter
//! - [`Backend::CrossContext`]: a conversion request sent over the message bus
//!   to a context that hosts a full engine
//! - [`Backend::EmbeddedEngine`]: a full engine loaded into the current
//!   document, reached either by direct call or through a same-document event
//!   round-trip
//!
//! The adapter walks them in that order. Loading the embedded engine is a
//! single shared in-flight operation; a failed load or conversion drops the
//! memoized state so the next call starts over.

use crate::bus::{BusError, BusRequest, BusTarget, MessageBus, request_with_timeout};
use crate::common::{Error, Result, await_ready};
use crate::config::TimeoutConfig;
use crate::math::local::LocalConverter;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Backend identity, used for logging, diagnostics and normalization tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    CrossContext,
    EmbeddedEngine,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::CrossContext => "cross-context",
            BackendKind::EmbeddedEngine => "embedded-engine",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full-grammar TeX engine living in the current document.
#[async_trait]
pub trait MathEngine: Send + Sync {
    /// Start fetching/initializing the engine. May return before it is ready.
    async fn load(&self) -> Result<()>;

    /// Whether the engine has announced readiness.
    fn is_ready(&self) -> bool;

    async fn tex_to_mathml(&self, latex: &str, display: bool) -> Result<String>;
}

/// How the embedded engine is reached
#[derive(Clone)]
pub enum EngineBridge {
    /// Call straight into the engine object
    Direct(Arc<dyn MathEngine>),
    /// Dispatch events to the page's script world and wait for the reply
    EventRoundTrip(Arc<dyn MessageBus>),
}

/// Embedded engine plus its memoized load state.
pub struct EngineHandle {
    bridge: EngineBridge,
    loaded: Mutex<Arc<OnceCell<()>>>,
    poll_interval: Duration,
    ready_deadline: Duration,
    bus_timeout: Duration,
}

impl EngineHandle {
    pub fn new(bridge: EngineBridge, timeouts: &TimeoutConfig) -> Self {
        Self {
            bridge,
            loaded: Mutex::new(Arc::new(OnceCell::new())),
            poll_interval: timeouts.ready_poll(),
            ready_deadline: timeouts.ready_deadline(),
            bus_timeout: timeouts.bus(),
        }
    }

    /// Whether a load has completed and not been reset since.
    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().initialized()
    }

    /// Load the engine once; concurrent callers share the same in-flight load.
    pub async fn ensure_loaded(&self) -> Result<()> {
        let cell = self.loaded.lock().clone();
        cell.get_or_try_init(|| self.load_once()).await?;
        Ok(())
    }

    /// Forget the memoized load so the next call loads again.
    pub fn reset(&self) {
        let mut cell = self.loaded.lock();
        if cell.initialized() {
            tracing::debug!("resetting embedded engine load state");
        }
        *cell = Arc::new(OnceCell::new());
    }

    async fn load_once(&self) -> Result<()> {
        tracing::debug!("loading embedded math engine");
        match &self.bridge {
            EngineBridge::Direct(engine) => {
                engine.load().await?;
                await_ready(|| engine.is_ready(), self.poll_interval, self.ready_deadline).await
            },
            EngineBridge::EventRoundTrip(bus) => {
                let response = request_with_timeout(
                    bus.as_ref(),
                    BusTarget::Page,
                    BusRequest::LoadEngine,
                    self.ready_deadline,
                )
                .await
                .map_err(|e| bus_failure(BackendKind::EmbeddedEngine, e))?;
                response
                    .into_payload()
                    .map_err(|e| bus_failure(BackendKind::EmbeddedEngine, e))?;
                Ok(())
            },
        }
    }

    async fn convert(&self, latex: &str, display: bool) -> Result<String> {
        let result = self.convert_loaded(latex, display).await;
        if result.is_err() {
            self.reset();
        }
        result
    }

    async fn convert_loaded(&self, latex: &str, display: bool) -> Result<String> {
        self.ensure_loaded().await?;
        match &self.bridge {
            EngineBridge::Direct(engine) => engine.tex_to_mathml(latex, display).await,
            EngineBridge::EventRoundTrip(bus) => {
                let request = BusRequest::ConvertTex {
                    latex: latex.to_string(),
                    display,
                };
                let response = request_with_timeout(bus.as_ref(), BusTarget::Page, request, self.bus_timeout)
                    .await
                    .map_err(|e| bus_failure(BackendKind::EmbeddedEngine, e))?;
                mathml_payload(BackendKind::EmbeddedEngine, response.into_payload())
            },
        }
    }
}

/// One conversion strategy
pub enum Backend {
    Local(LocalConverter),
    CrossContext {
        bus: Arc<dyn MessageBus>,
        target: BusTarget,
    },
    EmbeddedEngine(EngineHandle),
}

impl Backend {
    pub fn local() -> Self {
        Backend::Local(LocalConverter::new())
    }

    pub fn cross_context(bus: Arc<dyn MessageBus>, target: BusTarget) -> Self {
        Backend::CrossContext { bus, target }
    }

    pub fn embedded(bridge: EngineBridge, timeouts: &TimeoutConfig) -> Self {
        Backend::EmbeddedEngine(EngineHandle::new(bridge, timeouts))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Local(_) => BackendKind::Local,
            Backend::CrossContext { .. } => BackendKind::CrossContext,
            Backend::EmbeddedEngine(_) => BackendKind::EmbeddedEngine,
        }
    }

    /// Reason this backend will not even be tried for `latex`.
    pub fn skip_reason(&self, latex: &str) -> Option<String> {
        match self {
            Backend::Local(local) => local
                .unsupported_construct(latex)
                .map(|construct| format!("unsupported construct {}", construct)),
            _ => None,
        }
    }

    /// Time budget for one conversion call.
    ///
    /// The cross-context call may have to load the remote engine first, so it
    /// gets the larger of the load and conversion budgets. The embedded engine
    /// budget covers its own load too.
    pub fn time_budget(&self, timeouts: &TimeoutConfig) -> Duration {
        match self {
            Backend::Local(_) => timeouts.conversion(),
            Backend::CrossContext { .. } => timeouts.cross_context(),
            Backend::EmbeddedEngine(handle) if !handle.is_loaded() => {
                timeouts.backend_load() + timeouts.conversion()
            },
            Backend::EmbeddedEngine(_) => timeouts.conversion(),
        }
    }

    pub async fn convert(&self, latex: &str, display: bool) -> Result<String> {
        match self {
            Backend::Local(local) => local
                .convert(latex, display)
                .map_err(|e| Error::backend(BackendKind::Local.as_str(), e.to_string())),
            Backend::CrossContext { bus, target } => {
                let request = BusRequest::ConvertTex {
                    latex: latex.to_string(),
                    display,
                };
                // The caller bounds the whole call; the bus itself gets no shorter limit
                let response = bus
                    .request(*target, request)
                    .await
                    .map_err(|e| bus_failure(BackendKind::CrossContext, e))?;
                mathml_payload(BackendKind::CrossContext, response.into_payload())
            },
            Backend::EmbeddedEngine(handle) => handle.convert(latex, display).await,
        }
    }

    /// Drop memoized state after a failure or timeout.
    pub fn reset(&self) {
        if let Backend::EmbeddedEngine(handle) = self {
            handle.reset();
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::CrossContext { target, .. } => {
                f.debug_struct("CrossContext").field("target", target).finish()
            },
            other => f.write_str(other.kind().as_str()),
        }
    }
}

fn bus_failure(kind: BackendKind, error: BusError) -> Error {
    Error::backend(kind.as_str(), error.to_string())
}

fn mathml_payload(kind: BackendKind, payload: std::result::Result<Option<String>, BusError>) -> Result<String> {
    match payload.map_err(|e| bus_failure(kind, e))? {
        Some(mathml) if mathml.contains("<math") => Ok(mathml),
        Some(_) => Err(Error::backend(kind.as_str(), "reply is not MathML")),
        None => Err(Error::backend(kind.as_str(), "empty reply")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusResponse;
    use crate::testing::{FakeBus, FakeMathEngine};
    use std::sync::atomic::Ordering;

    fn timeouts() -> TimeoutConfig {
        TimeoutConfig::default()
    }

    #[tokio::test]
    async fn test_local_backend_skips_unsupported() {
        let backend = Backend::local();
        assert_eq!(backend.kind(), BackendKind::Local);
        assert!(backend.skip_reason("\\frac{1}{2}").is_none());
        assert!(backend.skip_reason("\\begin{cases}x\\end{cases}").is_some());
        let mathml = backend.convert("x", false).await.unwrap();
        assert!(mathml.starts_with("<math"));
    }

    #[tokio::test]
    async fn test_cross_context_without_listener_fails() {
        let bus = Arc::new(FakeBus::new());
        let backend = Backend::cross_context(bus, BusTarget::Offscreen);
        let err = backend.convert("x", false).await.unwrap_err();
        assert!(matches!(err, Error::ConversionBackendFailure { ref backend, .. } if backend == "cross-context"));
    }

    #[tokio::test]
    async fn test_cross_context_rejects_non_mathml_reply() {
        let bus = Arc::new(FakeBus::new());
        bus.respond(BusTarget::Offscreen, BusResponse::success("not markup"));
        let backend = Backend::cross_context(bus, BusTarget::Offscreen);
        assert!(backend.convert("x", false).await.is_err());
    }

    #[tokio::test]
    async fn test_cross_context_budget_is_the_larger_one() {
        let bus = Arc::new(FakeBus::new());
        let backend = Backend::cross_context(bus, BusTarget::Offscreen);
        let t = timeouts();
        assert_eq!(backend.time_budget(&t), t.backend_load().max(t.conversion()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_load_is_shared_and_awaits_readiness() {
        let engine = Arc::new(FakeMathEngine::new().ready_after_polls(2));
        let handle = EngineHandle::new(EngineBridge::Direct(engine.clone()), &timeouts());

        let (a, b) = tokio::join!(handle.ensure_loaded(), handle.ensure_loaded());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
        assert!(handle.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_is_retried() {
        let engine = Arc::new(FakeMathEngine::new().failing_loads(1));
        let backend = Backend::embedded(EngineBridge::Direct(engine.clone()), &timeouts());

        assert!(backend.convert("x", false).await.is_err());
        let mathml = backend.convert("x", false).await.unwrap();
        assert!(mathml.contains("<math"));
        assert_eq!(engine.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_conversion_resets_load_state() {
        let engine = Arc::new(FakeMathEngine::new().failing_conversions(1));
        let Backend::EmbeddedEngine(handle) = Backend::embedded(EngineBridge::Direct(engine.clone()), &timeouts())
        else {
            unreachable!()
        };

        assert!(handle.convert("x", true).await.is_err());
        assert!(!handle.is_loaded());
        assert!(handle.convert("x", true).await.is_ok());
        assert_eq!(engine.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_event_round_trip_bridge() {
        let bus = Arc::new(FakeBus::new());
        bus.respond_with(BusTarget::Page, |request| match request {
            BusRequest::LoadEngine => BusResponse::ack(),
            BusRequest::ConvertTex { latex, .. } => {
                BusResponse::success(format!("<math><mi>{}</mi></math>", latex))
            },
            _ => BusResponse::failure("unexpected"),
        });
        let backend = Backend::embedded(EngineBridge::EventRoundTrip(bus.clone()), &timeouts());
        assert_eq!(backend.convert("y", false).await.unwrap(), "<math><mi>y</mi></math>");
        assert_eq!(bus.requests_to(BusTarget::Page), 2);
    }
}
