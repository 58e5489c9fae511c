// Copy request state machine
//
// One request is one task. The selection snapshot is taken by the caller (or
// by `copy` through a `SelectionSource`) before the first await; after that
// every suspension point is bounded by a timeout from the configuration.

use super::render::MathRenderer;
use super::{CopyMode, CopyOutcome, CopyState};
use crate::cfhtml;
use crate::clipboard::{ClipboardPayload, DeliveryChain, DeliveryMode, DeliveryResult};
use crate::common::{Error, Result};
use crate::config::{ConfigStore, CopyConfig};
use crate::docx;
use crate::engine::{NormalizationEngine, check_engine};
use crate::html::{apply_rendered, html_to_plain_text, text_to_html};
use crate::omml;
use crate::selection::{SelectionSnapshot, SelectionSource};
use crate::translate::{AnchorToken, ProgressFn, TranslationProgress, Translator, anchor, restore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::timeout;

/// Mutable bookkeeping for one request
#[derive(Debug)]
struct RequestTrace {
    mode: CopyMode,
    states: Vec<CopyState>,
    diagnostics: Vec<String>,
    payload: Option<ClipboardPayload>,
    delivery: Option<DeliveryResult>,
}

impl RequestTrace {
    fn new(mode: CopyMode) -> Self {
        Self {
            mode,
            states: vec![CopyState::Idle],
            diagnostics: Vec::new(),
            payload: None,
            delivery: None,
        }
    }

    fn enter(&mut self, state: CopyState) {
        let from = self.states.last().copied().unwrap_or(CopyState::Idle);
        tracing::debug!(mode = %self.mode, %from, to = %state, "copy state");
        self.states.push(state);
    }

    fn note(&mut self, diagnostic: impl Into<String>) {
        self.diagnostics.push(diagnostic.into());
    }
}

/// Drives copy requests through conversion, translation and delivery.
pub struct CopyOrchestrator {
    engine: Arc<dyn NormalizationEngine>,
    renderer: MathRenderer,
    translator: Option<Arc<dyn Translator>>,
    delivery: DeliveryChain,
    config: Arc<dyn ConfigStore>,
}

impl std::fmt::Debug for CopyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyOrchestrator")
            .field("engine_api", &self.engine.api_version())
            .field("renderer", &self.renderer)
            .field("translator", &self.translator.is_some())
            .field("delivery", &self.delivery)
            .finish()
    }
}

impl CopyOrchestrator {
    /// Build an orchestrator, rejecting engines of another API revision.
    pub fn new(
        engine: Arc<dyn NormalizationEngine>,
        renderer: MathRenderer,
        delivery: DeliveryChain,
        config: Arc<dyn ConfigStore>,
    ) -> Result<Self> {
        check_engine(engine.as_ref())?;
        Ok(Self {
            engine,
            renderer,
            translator: None,
            delivery,
            config,
        })
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    #[inline]
    pub fn renderer(&self) -> &MathRenderer {
        &self.renderer
    }

    /// Whether native copy events should be routed through [`CopyOrchestrator::copy`].
    pub async fn intercepts_copy(&self) -> bool {
        match self.config.get_config().await {
            Ok(config) => config.intercept_copy,
            Err(e) => {
                tracing::warn!(error = %e, "configuration unavailable, not intercepting copy");
                false
            },
        }
    }

    /// Capture the selection and copy it.
    pub async fn copy(&self, source: &dyn SelectionSource, mode: CopyMode) -> CopyOutcome {
        let mut trace = RequestTrace::new(mode);
        trace.enter(CopyState::CaptureSelection);
        match source.capture() {
            Ok(snapshot) => self.run_traced(snapshot, trace).await,
            Err(e) => {
                trace.enter(CopyState::Failed);
                tracing::warn!(mode = %mode, error = %e, "selection capture failed");
                finish(trace, Some(e), None)
            },
        }
    }

    /// Copy an already captured selection.
    pub async fn copy_snapshot(&self, snapshot: SelectionSnapshot, mode: CopyMode) -> CopyOutcome {
        let mut trace = RequestTrace::new(mode);
        trace.enter(CopyState::CaptureSelection);
        self.run_traced(snapshot, trace).await
    }

    /// Convert a selection for Office and package it as a `.docx` instead of copying it.
    ///
    /// Formulas that fail to render keep their source text, as they do on the clipboard.
    pub async fn export_docx(&self, snapshot: &SelectionSnapshot) -> Result<Vec<u8>> {
        snapshot.validate()?;
        let mut trace = RequestTrace::new(CopyMode::Office);
        trace.enter(CopyState::ExtractAndConvert);
        let html = self.convert_office(snapshot, &mut trace).await?;
        for diagnostic in &trace.diagnostics {
            tracing::warn!(%diagnostic, "docx export degraded");
        }
        docx::html_with_omml_to_docx(&html)
    }

    async fn run_traced(&self, snapshot: SelectionSnapshot, mut trace: RequestTrace) -> CopyOutcome {
        match self.run(&snapshot, &mut trace).await {
            Ok(()) => {
                trace.enter(CopyState::Done);
                tracing::info!(
                    mode = %trace.mode,
                    via = ?trace.delivery.as_ref().and_then(|d| d.via),
                    diagnostics = trace.diagnostics.len(),
                    "copy finished"
                );
                finish(trace, None, None)
            },
            Err(e) => {
                trace.enter(CopyState::Failed);
                tracing::warn!(mode = %trace.mode, error = %e, "copy failed");
                let fallback = self.deliver_fallback(&snapshot, &e).await;
                finish(trace, Some(e), fallback)
            },
        }
    }

    async fn run(&self, snapshot: &SelectionSnapshot, trace: &mut RequestTrace) -> Result<()> {
        snapshot.validate()?;
        let config = self.config.get_config().await?;

        trace.enter(CopyState::ExtractAndConvert);
        let payload = match trace.mode {
            CopyMode::Markdown => {
                let html = source_html(snapshot);
                ClipboardPayload::text_only(self.engine.html_to_markdown(&html)?)
            },
            CopyMode::RawHtml => {
                let raw = if snapshot.has_html() {
                    snapshot.html.clone()
                } else {
                    snapshot.text.clone()
                };
                ClipboardPayload::text_only(raw)
            },
            CopyMode::Office | CopyMode::MarkdownOffice | CopyMode::TranslateOffice => {
                let mut html = self.convert_office(snapshot, trace).await?;
                if trace.mode == CopyMode::TranslateOffice {
                    if config.translation.enabled {
                        trace.enter(CopyState::Translate);
                        html = self.translate(&html, &config, trace).await?;
                    } else {
                        tracing::debug!("translation disabled, copying untranslated");
                    }
                }

                if !snapshot.is_live() {
                    return Err(Error::SelectionLost);
                }
                trace.enter(CopyState::Serialize);
                let source_url = snapshot.source_url.as_deref().filter(|_| config.include_source_url);
                let cf_html = cfhtml::serialize(&html, source_url);
                let text = html_to_plain_text(&html);
                ClipboardPayload::rich(html, text, Some(cf_html.into_string()))
            },
        };

        if payload.mode() == DeliveryMode::TextOnly {
            if !snapshot.is_live() {
                return Err(Error::SelectionLost);
            }
            trace.enter(CopyState::Serialize);
        }

        trace.enter(CopyState::Deliver);
        let result = self.delivery.deliver(&payload, payload.mode()).await;
        let failure = (!result.ok).then(|| {
            let reason = result.error.clone().unwrap_or_else(|| "no stage succeeded".to_string());
            Error::delivery("all stages", reason)
        });
        trace.payload = Some(payload);
        trace.delivery = Some(result);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Normalize the selection for Office and render its formulas.
    async fn convert_office(&self, snapshot: &SelectionSnapshot, trace: &mut RequestTrace) -> Result<String> {
        let prepared = if trace.mode == CopyMode::MarkdownOffice {
            let markdown = if snapshot.text.trim().is_empty() {
                html_to_plain_text(&snapshot.html)
            } else {
                snapshot.text.clone()
            };
            self.engine.markdown_to_office_with_math(&markdown)?
        } else {
            self.engine.html_to_office_with_math(&source_html(snapshot))?
        };

        if !prepared.has_math() {
            return Ok(prepared.html);
        }
        let report = self.renderer.render(&prepared.jobs).await;
        trace.diagnostics.extend(report.degraded);
        apply_rendered(&prepared.html, &report.rendered)
    }

    async fn translate(&self, html: &str, config: &CopyConfig, trace: &mut RequestTrace) -> Result<String> {
        let translator = self
            .translator
            .clone()
            .ok_or_else(|| Error::Translation("no translator configured".to_string()))?;
        let settings = &config.translation;
        let limit = config.timeouts.translation();

        let anchored = anchor(html);
        let progress: &ProgressFn = &|p: TranslationProgress| {
            tracing::debug!(done = p.done, total = p.total, "translation progress");
        };
        let translated = timeout(
            limit,
            translator.translate(
                &anchored.html,
                &settings.target_language,
                &settings.service,
                Some(progress),
            ),
        )
        .await
        .map_err(|_| Error::timeout("translating", limit))??;
        // Service output is untrusted markup
        let translated = self.engine.html_to_office(&translated)?;

        let translate_formulas =
            settings.translate_formulas && translator.supports_formula_translation(&settings.service);
        let mut replacements = HashMap::new();
        if translate_formulas {
            let formulas: Vec<(&AnchorToken, String)> = anchored
                .formulas()
                .filter_map(|token| token.latex.clone().map(|latex| (token, latex)))
                .collect();
            if !formulas.is_empty() {
                self.translate_formulas(translator.as_ref(), &formulas, config, &mut replacements, trace)
                    .await;
            }
        }

        let restored = restore(&translated, &anchored.tokens, translate_formulas, &replacements);
        for anomaly in restored.anomalies {
            trace.note(Error::AnchorRestoreAnomaly(anomaly).to_string());
        }
        Ok(restored.html)
    }

    /// Translate formula TeX and re-render the formulas that changed.
    ///
    /// Failures here only cost the formula translation; the originals stay.
    async fn translate_formulas(
        &self,
        translator: &dyn Translator,
        formulas: &[(&AnchorToken, String)],
        config: &CopyConfig,
        replacements: &mut HashMap<String, String>,
        trace: &mut RequestTrace,
    ) {
        let settings = &config.translation;
        let limit = config.timeouts.translation();
        let sources: Vec<String> = formulas.iter().map(|(_, latex)| latex.clone()).collect();

        let translated = match timeout(
            limit,
            translator.translate_formulas(&sources, &settings.service, &settings.target_language),
        )
        .await
        {
            Ok(Ok(list)) if list.len() == sources.len() => list,
            Ok(Ok(list)) => {
                trace.note(format!(
                    "formula translation returned {} results for {} formulas",
                    list.len(),
                    sources.len()
                ));
                return;
            },
            Ok(Err(e)) => {
                trace.note(format!("formula translation failed: {}", e));
                return;
            },
            Err(_) => {
                trace.note(Error::timeout("translating formulas", limit).to_string());
                return;
            },
        };

        for ((token, original), latex) in formulas.iter().zip(translated) {
            if latex.trim() == original.trim() {
                continue;
            }
            match self.renderer.render_tex(&latex, omml::is_display(&token.original)).await {
                Ok(markup) => {
                    replacements.insert(token.id.clone(), markup);
                },
                Err(e) => {
                    tracing::warn!(token = %token.id, error = %e, "translated formula kept untranslated");
                    trace.note(format!("formula {}: {}", token.id, e));
                },
            }
        }
    }

    /// Best-effort plain-text delivery of the raw selection after a failure.
    async fn deliver_fallback(&self, snapshot: &SelectionSnapshot, cause: &Error) -> Option<DeliveryResult> {
        if matches!(cause, Error::NoSelection) {
            return None;
        }
        let text = if snapshot.text.trim().is_empty() {
            html_to_plain_text(&snapshot.html)
        } else {
            snapshot.text.clone()
        };
        if text.trim().is_empty() {
            return None;
        }
        let result = self
            .delivery
            .deliver(&ClipboardPayload::text_only(text), DeliveryMode::TextOnly)
            .await;
        tracing::info!(ok = result.ok, via = ?result.via, "plain-text fallback delivery");
        Some(result)
    }
}

/// Selected HTML, or paragraphs synthesized from the plain text.
fn source_html(snapshot: &SelectionSnapshot) -> String {
    if snapshot.has_html() {
        snapshot.html.clone()
    } else {
        text_to_html(&snapshot.text)
    }
}

fn finish(trace: RequestTrace, error: Option<Error>, fallback_delivery: Option<DeliveryResult>) -> CopyOutcome {
    CopyOutcome {
        mode: trace.mode,
        ok: error.is_none(),
        error: error.map(|e| e.user_message()),
        delivery: trace.delivery,
        fallback_delivery,
        payload: trace.payload,
        diagnostics: trace.diagnostics,
        states: trace.states,
    }
}
