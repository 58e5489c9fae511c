//! Hand-written fakes for the collaborators the pipeline talks to.

use crate::bus::{BusError, BusRequest, BusResponse, BusTarget, MessageBus};
use crate::clipboard::{
    CapabilitySnapshot, ClipboardPayload, ClipboardSurface, DeliveryMode, ElementHandle, HelperDocumentHost,
    LegacyCopySurface, SavedSelection,
};
use crate::common::{Error, Result};
use crate::engine::NormalizationEngine;
use crate::html::PreparedOffice;
use crate::math::MathEngine;
use crate::selection::{SelectionSnapshot, SelectionSource};
use crate::translate::{ProgressFn, TOKEN_PREFIX, TranslationProgress, Translator};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

type Responder = Arc<dyn Fn(&BusRequest) -> BusResponse + Send + Sync>;

/// Message bus with per-target canned replies. Targets without a responder
/// answer `NoListener`.
#[derive(Default)]
pub struct FakeBus {
    responders: Mutex<HashMap<BusTarget, Responder>>,
    requests: Mutex<Vec<(BusTarget, BusRequest)>>,
    delay: Option<Duration>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, target: BusTarget, response: BusResponse) {
        self.respond_with(target, move |_| response.clone());
    }

    pub fn respond_with(&self, target: BusTarget, responder: impl Fn(&BusRequest) -> BusResponse + Send + Sync + 'static) {
        self.responders.lock().insert(target, Arc::new(responder));
    }

    pub fn requests_to(&self, target: BusTarget) -> usize {
        self.requests.lock().iter().filter(|(t, _)| *t == target).count()
    }
}

#[async_trait]
impl MessageBus for FakeBus {
    async fn request(&self, target: BusTarget, request: BusRequest) -> std::result::Result<BusResponse, BusError> {
        self.requests.lock().push((target, request.clone()));
        let responder = self.responders.lock().get(&target).cloned();
        let Some(responder) = responder else {
            return Err(BusError::NoListener);
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(responder(&request))
    }
}

/// Embedded math engine that echoes TeX inside `<mtext>`.
#[derive(Default)]
pub struct FakeMathEngine {
    pub loads: AtomicUsize,
    pub conversions: AtomicUsize,
    polls: AtomicUsize,
    polls_until_ready: usize,
    failing_loads: AtomicUsize,
    failing_conversions: AtomicUsize,
}

impl FakeMathEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report not ready for the first `polls` readiness probes after each load.
    pub fn ready_after_polls(mut self, polls: usize) -> Self {
        self.polls_until_ready = polls;
        self
    }

    pub fn failing_loads(self, count: usize) -> Self {
        self.failing_loads.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_conversions(self, count: usize) -> Self {
        self.failing_conversions.store(count, Ordering::SeqCst);
        self
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl MathEngine for FakeMathEngine {
    async fn load(&self) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.polls.store(0, Ordering::SeqCst);
        if take_one(&self.failing_loads) {
            return Err(Error::backend("embedded-engine", "script failed to load"));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) >= self.polls_until_ready
    }

    async fn tex_to_mathml(&self, latex: &str, display: bool) -> Result<String> {
        self.conversions.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_conversions) {
            return Err(Error::backend("embedded-engine", "engine crashed"));
        }
        Ok(format!(
            "<math display=\"{}\"><mtext>{}</mtext></math>",
            if display { "block" } else { "inline" },
            latex
        ))
    }
}

/// Clipboard that records every write.
pub struct FakeClipboard {
    capabilities: CapabilitySnapshot,
    delay: Option<Duration>,
    writes: Mutex<Vec<ClipboardPayload>>,
}

impl FakeClipboard {
    pub fn new(capabilities: CapabilitySnapshot) -> Self {
        Self {
            capabilities,
            delay: None,
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn writes(&self) -> Vec<ClipboardPayload> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl ClipboardSurface for FakeClipboard {
    fn capabilities(&self) -> CapabilitySnapshot {
        self.capabilities
    }

    async fn write(&self, payload: &ClipboardPayload, _mode: DeliveryMode) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.writes.lock().push(payload.clone());
        Ok(())
    }
}

/// Helper document host that counts opens.
#[derive(Default)]
pub struct FakeHelperHost {
    opened: AtomicUsize,
}

impl FakeHelperHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HelperDocumentHost for FakeHelperHost {
    fn capabilities(&self) -> CapabilitySnapshot {
        CapabilitySnapshot::FULL
    }

    fn has_document(&self) -> bool {
        self.opened() > 0
    }

    async fn open_document(&self) -> Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Legacy copy surface tracking attached elements and the saved selection.
pub struct FakeLegacySurface {
    accepts: bool,
    exec_fails: bool,
    next_handle: AtomicU64,
    attached: Mutex<Vec<ElementHandle>>,
    selection_saved: AtomicBool,
    selection_restored: AtomicBool,
    last_html: Mutex<Option<String>>,
}

impl FakeLegacySurface {
    /// `accepts` is what the copy command returns.
    pub fn new(accepts: bool) -> Self {
        Self {
            accepts,
            exec_fails: false,
            next_handle: AtomicU64::new(1),
            attached: Mutex::new(Vec::new()),
            selection_saved: AtomicBool::new(false),
            selection_restored: AtomicBool::new(false),
            last_html: Mutex::new(None),
        }
    }

    pub fn failing_exec(mut self) -> Self {
        self.exec_fails = true;
        self
    }

    /// Elements still attached.
    pub fn attached(&self) -> usize {
        self.attached.lock().len()
    }

    pub fn selection_restored(&self) -> bool {
        self.selection_restored.load(Ordering::SeqCst)
    }

    pub fn last_html(&self) -> Option<String> {
        self.last_html.lock().clone()
    }
}

impl LegacyCopySurface for FakeLegacySurface {
    fn capabilities(&self) -> CapabilitySnapshot {
        CapabilitySnapshot {
            write: true,
            rich_item: false,
            secure_context: false,
        }
    }

    fn save_selection(&self) -> Option<SavedSelection> {
        self.selection_saved.store(true, Ordering::SeqCst);
        Some(SavedSelection(7))
    }

    fn restore_selection(&self, saved: SavedSelection) {
        assert_eq!(saved, SavedSelection(7));
        self.selection_restored.store(true, Ordering::SeqCst);
    }

    fn attach_element(&self, html: Option<&str>, _text: &str) -> Result<ElementHandle> {
        let handle = ElementHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.attached.lock().push(handle);
        *self.last_html.lock() = html.map(str::to_string);
        Ok(handle)
    }

    fn detach_element(&self, element: ElementHandle) {
        self.attached.lock().retain(|h| *h != element);
    }

    fn exec_copy(&self) -> Result<bool> {
        if self.exec_fails {
            return Err(Error::delivery("legacy-command", "copy command threw"));
        }
        Ok(self.accepts)
    }
}

#[derive(Debug, Clone, Copy)]
enum TranslatorBehavior {
    Uppercase,
    DropAnchors,
    InjectScript,
}

/// How the fake answers `translate_formulas`.
#[derive(Debug, Clone, Copy)]
pub enum FormulaBehavior {
    Uppercase,
    ExtraResult,
    Fail,
    Stall(Duration),
}

/// Translator that upper-cases text outside tags.
pub struct FakeTranslator {
    behavior: TranslatorBehavior,
    formulas: FormulaBehavior,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeTranslator {
    pub fn uppercase() -> Self {
        Self {
            behavior: TranslatorBehavior::Uppercase,
            formulas: FormulaBehavior::Uppercase,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Upper-cases text and loses every anchor token on the way.
    pub fn dropping_anchors() -> Self {
        Self {
            behavior: TranslatorBehavior::DropAnchors,
            ..Self::uppercase()
        }
    }

    /// Upper-cases text and appends a script element to the result.
    pub fn injecting_script() -> Self {
        Self {
            behavior: TranslatorBehavior::InjectScript,
            ..Self::uppercase()
        }
    }

    pub fn with_formulas(mut self, formulas: FormulaBehavior) -> Self {
        self.formulas = formulas;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Target languages of every `translate` call.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

fn uppercase_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ => {},
        }
        if in_tag {
            out.push(c);
        } else {
            out.extend(c.to_uppercase());
        }
    }
    out
}

fn strip_anchors(text: &str) -> String {
    const TOKEN_LEN: usize = 18;
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find(TOKEN_PREFIX) {
        out.push_str(&rest[..at]);
        rest = &rest[(at + TOKEN_LEN).min(rest.len())..];
    }
    out.push_str(rest);
    out
}

/// Upper-case the argument of every `\text{}`.
fn uppercase_text_commands(latex: &str) -> String {
    let mut out = String::with_capacity(latex.len());
    let mut rest = latex;
    while let Some(at) = rest.find("\\text{") {
        let body = at + "\\text{".len();
        out.push_str(&rest[..body]);
        let close = rest[body..].find('}').map_or(rest.len(), |i| body + i);
        out.push_str(&rest[body..close].to_uppercase());
        rest = &rest[close..];
    }
    out.push_str(rest);
    out
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(
        &self,
        html: &str,
        target_lang: &str,
        _service: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<String> {
        self.calls.lock().push(target_lang.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(report) = progress {
            report(TranslationProgress { done: 1, total: 1 });
        }
        let translated = uppercase_text(html);
        Ok(match self.behavior {
            TranslatorBehavior::Uppercase => translated,
            TranslatorBehavior::DropAnchors => strip_anchors(&translated),
            TranslatorBehavior::InjectScript => format!("{}<script>steal()</script>", translated),
        })
    }

    async fn translate_formulas(&self, formulas: &[String], _service: &str, _target_lang: &str) -> Result<Vec<String>> {
        let mut translated: Vec<String> = formulas.iter().map(|f| uppercase_text_commands(f)).collect();
        match self.formulas {
            FormulaBehavior::Uppercase => {},
            FormulaBehavior::ExtraResult => translated.push("\\text{EXTRA}".to_string()),
            FormulaBehavior::Fail => return Err(Error::Translation("formula quota exceeded".to_string())),
            FormulaBehavior::Stall(delay) => tokio::time::sleep(delay).await,
        }
        Ok(translated)
    }
}

/// Selection source returning a fixed snapshot, or failing.
pub struct FakeSelectionSource {
    snapshot: Option<SelectionSnapshot>,
}

impl FakeSelectionSource {
    pub fn new(html: &str, text: &str) -> Self {
        Self {
            snapshot: Some(SelectionSnapshot::new(html, text)),
        }
    }

    pub fn failing() -> Self {
        Self { snapshot: None }
    }
}

impl SelectionSource for FakeSelectionSource {
    fn capture(&self) -> Result<SelectionSnapshot> {
        self.snapshot
            .clone()
            .ok_or_else(|| Error::SelectionInvalid("selection range is detached".to_string()))
    }
}

/// Engine built against an older API revision.
pub struct StaleEngine;

impl NormalizationEngine for StaleEngine {
    fn api_version(&self) -> u32 {
        2
    }

    fn html_to_office_with_math(&self, html: &str) -> Result<PreparedOffice> {
        Ok(PreparedOffice::plain(html))
    }

    fn markdown_to_office_with_math(&self, markdown: &str) -> Result<PreparedOffice> {
        Ok(PreparedOffice::plain(markdown))
    }

    fn html_to_markdown(&self, html: &str) -> Result<String> {
        Ok(html.to_string())
    }

    fn html_to_office(&self, html: &str) -> Result<String> {
        Ok(html.to_string())
    }
}
