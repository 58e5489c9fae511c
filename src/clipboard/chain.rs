use super::legacy::{LegacyCopySurface, legacy_copy};
use super::{
    CapabilitySnapshot, ClipboardPayload, ClipboardSurface, DeliveryMode, DeliveryResult, DeliveryStage,
    HelperDocumentHost, StageAttempt,
};
use crate::bus::{BusRequest, BusTarget, MessageBus, request_with_timeout};
use crate::common::error::{Error, Result};
use crate::config::TimeoutConfig;
use std::sync::Arc;
use tokio::time::Instant;

/// Ordered fallback over every clipboard route available to this context.
///
/// Stages without a collaborator are still recorded, with an error saying
/// what was missing.
#[derive(Clone)]
pub struct DeliveryChain {
    direct: Option<Arc<dyn ClipboardSurface>>,
    bus: Option<Arc<dyn MessageBus>>,
    helper: Option<Arc<dyn HelperDocumentHost>>,
    legacy: Option<Arc<dyn LegacyCopySurface>>,
    timeouts: TimeoutConfig,
}

impl std::fmt::Debug for DeliveryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryChain")
            .field("direct", &self.direct.is_some())
            .field("bus", &self.bus.is_some())
            .field("helper", &self.helper.is_some())
            .field("legacy", &self.legacy.is_some())
            .finish()
    }
}

impl DeliveryChain {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            direct: None,
            bus: None,
            helper: None,
            legacy: None,
            timeouts,
        }
    }

    pub fn with_direct(mut self, surface: Arc<dyn ClipboardSurface>) -> Self {
        self.direct = Some(surface);
        self
    }

    /// Bus used by the privileged and helper-document stages
    pub fn with_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_helper(mut self, host: Arc<dyn HelperDocumentHost>) -> Self {
        self.helper = Some(host);
        self
    }

    pub fn with_legacy(mut self, surface: Arc<dyn LegacyCopySurface>) -> Self {
        self.legacy = Some(surface);
        self
    }

    /// Write `payload`, stopping at the first stage that succeeds.
    pub async fn deliver(&self, payload: &ClipboardPayload, mode: DeliveryMode) -> DeliveryResult {
        let mut result = DeliveryResult::default();
        for stage in DeliveryStage::ALL {
            let started = Instant::now();
            let (capabilities, outcome) = self.attempt(stage, payload, mode).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(()) => {
                    tracing::info!(%stage, elapsed_ms, "clipboard delivery succeeded");
                    result.attempts.push(StageAttempt {
                        stage,
                        ok: true,
                        error: None,
                        capabilities,
                        elapsed_ms,
                    });
                    result.ok = true;
                    result.via = Some(stage);
                    return result;
                },
                Err(e) => {
                    tracing::warn!(
                        %stage,
                        error = %e,
                        write = capabilities.write,
                        rich_item = capabilities.rich_item,
                        secure_context = capabilities.secure_context,
                        "clipboard delivery stage failed"
                    );
                    result.attempts.push(StageAttempt {
                        stage,
                        ok: false,
                        error: Some(e.to_string()),
                        capabilities,
                        elapsed_ms,
                    });
                },
            }
        }

        let summary = result
            .attempts
            .iter()
            .map(|a| format!("{}: {}", a.stage, a.error.as_deref().unwrap_or("failed")))
            .collect::<Vec<_>>()
            .join("; ");
        result.error = Some(summary);
        result
    }

    async fn attempt(
        &self,
        stage: DeliveryStage,
        payload: &ClipboardPayload,
        mode: DeliveryMode,
    ) -> (CapabilitySnapshot, Result<()>) {
        match stage {
            DeliveryStage::Direct => self.write_direct(payload, mode).await,
            DeliveryStage::Privileged => match &self.bus {
                Some(bus) => self.delegate(bus.as_ref(), BusTarget::Background, stage, payload, mode).await,
                None => (CapabilitySnapshot::NONE, Err(Error::delivery(stage.as_str(), "no message bus"))),
            },
            DeliveryStage::HelperDocument => self.write_via_helper(payload, mode).await,
            DeliveryStage::LegacyCommand => match &self.legacy {
                Some(surface) => (surface.capabilities(), legacy_copy(surface.as_ref(), payload, mode)),
                None => (
                    CapabilitySnapshot::NONE,
                    Err(Error::delivery(stage.as_str(), "no legacy copy surface")),
                ),
            },
        }
    }

    async fn write_direct(&self, payload: &ClipboardPayload, mode: DeliveryMode) -> (CapabilitySnapshot, Result<()>) {
        let stage = DeliveryStage::Direct.as_str();
        let Some(surface) = &self.direct else {
            return (CapabilitySnapshot::NONE, Err(Error::delivery(stage, "no clipboard in this context")));
        };
        let capabilities = surface.capabilities();
        if let Some(missing) = capabilities.missing_for(mode) {
            return (capabilities, Err(Error::delivery(stage, missing)));
        }
        let limit = self.timeouts.clipboard();
        let outcome = match tokio::time::timeout(limit, surface.write(payload, mode)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::timeout("writing to the clipboard", limit)),
        };
        (capabilities, outcome)
    }

    async fn write_via_helper(
        &self,
        payload: &ClipboardPayload,
        mode: DeliveryMode,
    ) -> (CapabilitySnapshot, Result<()>) {
        let stage = DeliveryStage::HelperDocument;
        let (Some(host), Some(bus)) = (&self.helper, &self.bus) else {
            return (
                CapabilitySnapshot::NONE,
                Err(Error::delivery(stage.as_str(), "helper documents are not available")),
            );
        };
        let capabilities = host.capabilities();
        if !host.has_document() {
            let limit = self.timeouts.bus();
            let opened = match tokio::time::timeout(limit, host.open_document()).await {
                Ok(opened) => opened,
                Err(_) => Err(Error::timeout("opening the helper document", limit)),
            };
            if let Err(e) = opened {
                return (capabilities, Err(e));
            }
            tracing::debug!("helper document opened");
        }
        let (remote, outcome) = self.delegate(bus.as_ref(), BusTarget::Offscreen, stage, payload, mode).await;
        (if remote == CapabilitySnapshot::NONE { capabilities } else { remote }, outcome)
    }

    /// Ask another context to write. A reply payload, when present, is that
    /// context's capability snapshot.
    async fn delegate(
        &self,
        bus: &dyn MessageBus,
        target: BusTarget,
        stage: DeliveryStage,
        payload: &ClipboardPayload,
        mode: DeliveryMode,
    ) -> (CapabilitySnapshot, Result<()>) {
        let html = match mode {
            DeliveryMode::Rich => payload.html.clone().unwrap_or_default(),
            DeliveryMode::TextOnly => String::new(),
        };
        let request = BusRequest::WriteClipboard {
            html,
            text: payload.text.clone(),
            cf_html: payload.cf_html.clone().filter(|_| mode == DeliveryMode::Rich),
        };
        match request_with_timeout(bus, target, request, self.timeouts.bus()).await {
            Ok(response) => {
                let capabilities = response
                    .payload
                    .as_deref()
                    .and_then(|p| serde_saphyr::from_str::<CapabilitySnapshot>(p).ok())
                    .unwrap_or(CapabilitySnapshot::NONE);
                let outcome = response
                    .into_payload()
                    .map(|_| ())
                    .map_err(|e| Error::delivery(stage.as_str(), e.to_string()));
                (capabilities, outcome)
            },
            Err(e) => (CapabilitySnapshot::NONE, Err(Error::delivery(stage.as_str(), e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusResponse;
    use crate::testing::{FakeBus, FakeClipboard, FakeHelperHost, FakeLegacySurface};
    use std::time::Duration;

    fn payload() -> ClipboardPayload {
        ClipboardPayload::rich("<b>x</b>", "x", Some("Version:0.9".to_string()))
    }

    fn capable_reply() -> BusResponse {
        BusResponse::success(serde_saphyr::to_string(&CapabilitySnapshot::FULL).unwrap())
    }

    #[tokio::test]
    async fn test_direct_write_wins() {
        let clipboard = Arc::new(FakeClipboard::new(CapabilitySnapshot::FULL));
        let chain = DeliveryChain::new(TimeoutConfig::default()).with_direct(clipboard.clone());
        let result = chain.deliver(&payload(), DeliveryMode::Rich).await;
        assert!(result.ok);
        assert_eq!(result.via, Some(DeliveryStage::Direct));
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(clipboard.writes()[0].html.as_deref(), Some("<b>x</b>"));
    }

    #[tokio::test]
    async fn test_unavailable_direct_falls_back_to_privileged() {
        let clipboard = Arc::new(FakeClipboard::new(CapabilitySnapshot {
            write: true,
            rich_item: false,
            secure_context: true,
        }));
        let bus = Arc::new(FakeBus::new());
        bus.respond(BusTarget::Background, capable_reply());
        let chain = DeliveryChain::new(TimeoutConfig::default())
            .with_direct(clipboard.clone())
            .with_bus(bus.clone());

        let result = chain.deliver(&payload(), DeliveryMode::Rich).await;
        assert_eq!(result.via, Some(DeliveryStage::Privileged));
        assert_eq!(bus.requests_to(BusTarget::Background), 1);
        assert!(clipboard.writes().is_empty());
        assert!(result.attempts[0].error.as_deref().unwrap().contains("rich"));
        assert_eq!(result.attempts[1].capabilities, CapabilitySnapshot::FULL);
    }

    #[tokio::test]
    async fn test_text_only_direct_needs_no_rich_item() {
        let clipboard = Arc::new(FakeClipboard::new(CapabilitySnapshot {
            write: true,
            rich_item: false,
            secure_context: true,
        }));
        let chain = DeliveryChain::new(TimeoutConfig::default()).with_direct(clipboard);
        let result = chain.deliver(&ClipboardPayload::text_only("x"), DeliveryMode::TextOnly).await;
        assert_eq!(result.via, Some(DeliveryStage::Direct));
    }

    #[tokio::test]
    async fn test_helper_document_is_opened_once() {
        let bus = Arc::new(FakeBus::new());
        bus.respond(BusTarget::Background, BusResponse::failure("no clipboard in worker"));
        bus.respond(BusTarget::Offscreen, BusResponse::ack());
        let helper = Arc::new(FakeHelperHost::new());
        let chain = DeliveryChain::new(TimeoutConfig::default())
            .with_bus(bus.clone())
            .with_helper(helper.clone());

        for _ in 0..2 {
            let result = chain.deliver(&payload(), DeliveryMode::Rich).await;
            assert_eq!(result.via, Some(DeliveryStage::HelperDocument));
            assert!(result.attempts[1].error.as_deref().unwrap().contains("no clipboard in worker"));
        }
        assert_eq!(helper.opened(), 1);
        assert_eq!(bus.requests_to(BusTarget::Offscreen), 2);
    }

    #[tokio::test]
    async fn test_legacy_is_the_last_resort() {
        let legacy = Arc::new(FakeLegacySurface::new(true));
        let chain = DeliveryChain::new(TimeoutConfig::default())
            .with_bus(Arc::new(FakeBus::new()))
            .with_legacy(legacy.clone());
        let result = chain.deliver(&payload(), DeliveryMode::Rich).await;
        assert_eq!(result.via, Some(DeliveryStage::LegacyCommand));
        assert_eq!(result.attempts.len(), 4);
        assert_eq!(legacy.attached(), 0);
    }

    #[tokio::test]
    async fn test_all_unavailable_reports_every_stage() {
        let chain = DeliveryChain::new(TimeoutConfig::default())
            .with_direct(Arc::new(FakeClipboard::new(CapabilitySnapshot::NONE)))
            .with_bus(Arc::new(FakeBus::new()))
            .with_legacy(Arc::new(FakeLegacySurface::new(false)));
        let result = chain.deliver(&payload(), DeliveryMode::Rich).await;
        assert!(!result.ok);
        assert!(result.via.is_none());
        assert_eq!(result.attempts.len(), DeliveryStage::ALL.len());
        for attempt in &result.attempts {
            assert!(!attempt.ok);
            assert!(attempt.error.as_deref().is_some_and(|e| !e.is_empty()));
        }
        let error = result.error.as_deref().unwrap();
        assert!(error.contains("direct:") && error.contains("legacy-command:"));
        assert!(result.diagnostics_yaml().unwrap().contains("helper-document"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_clipboard_write_times_out() {
        let clipboard = Arc::new(FakeClipboard::new(CapabilitySnapshot::FULL).with_delay(Duration::from_secs(60)));
        let legacy = Arc::new(FakeLegacySurface::new(true));
        let chain = DeliveryChain::new(TimeoutConfig::default())
            .with_direct(clipboard)
            .with_legacy(legacy);
        let result = chain.deliver(&payload(), DeliveryMode::Rich).await;
        assert_eq!(result.via, Some(DeliveryStage::LegacyCommand));
        assert!(result.attempts[0].error.as_deref().unwrap().contains("Timed out"));
    }
}
