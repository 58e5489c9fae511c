//! Copy requests: one selection in, one clipboard delivery out.
//!
//! [`CopyOrchestrator`] walks a request through
//! `Idle → CaptureSelection → ExtractAndConvert → (Translate) → Serialize →
//! Deliver → Done | Failed`, and [`MathRenderer`] turns the formulas found
//! along the way into Office math.

mod orchestrator;
mod render;

pub use orchestrator::CopyOrchestrator;
pub use render::{MathRenderer, RenderReport};

use crate::clipboard::{ClipboardPayload, DeliveryResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user asked to copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyMode {
    /// Selected HTML with formulas as Office math
    Office,
    /// Selected text read as Markdown, then as `Office`
    MarkdownOffice,
    /// Selected HTML exported as Markdown text
    Markdown,
    /// Selected HTML source as text
    RawHtml,
    /// `Office` with the prose translated first
    TranslateOffice,
}

impl CopyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyMode::Office => "office",
            CopyMode::MarkdownOffice => "markdown-office",
            CopyMode::Markdown => "markdown",
            CopyMode::RawHtml => "raw-html",
            CopyMode::TranslateOffice => "translate-office",
        }
    }

    /// Modes that put only plain text on the clipboard.
    #[inline]
    pub fn is_text_only(&self) -> bool {
        matches!(self, CopyMode::Markdown | CopyMode::RawHtml)
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyState {
    Idle,
    CaptureSelection,
    ExtractAndConvert,
    Translate,
    Serialize,
    Deliver,
    Done,
    Failed,
}

impl CopyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyState::Idle => "idle",
            CopyState::CaptureSelection => "capture-selection",
            CopyState::ExtractAndConvert => "extract-and-convert",
            CopyState::Translate => "translate",
            CopyState::Serialize => "serialize",
            CopyState::Deliver => "deliver",
            CopyState::Done => "done",
            CopyState::Failed => "failed",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CopyState::Done | CopyState::Failed)
    }
}

impl fmt::Display for CopyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one copy request. Requests never panic and never return `Err`;
/// everything the caller needs to report is in here.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyOutcome {
    pub mode: CopyMode,
    pub ok: bool,
    /// Short reason for a notification when `ok` is false
    pub error: Option<String>,
    /// Delivery of the requested payload, if the pipeline got that far
    pub delivery: Option<DeliveryResult>,
    /// Plain-text delivery attempted after a failure
    pub fallback_delivery: Option<DeliveryResult>,
    /// Payload handed to the delivery chain
    pub payload: Option<ClipboardPayload>,
    /// Degraded formulas, anchor anomalies and similar non-fatal findings
    pub diagnostics: Vec<String>,
    /// States visited, in order
    pub states: Vec<CopyState>,
}

impl CopyOutcome {
    /// Final state of the request.
    pub fn final_state(&self) -> CopyState {
        self.states.last().copied().unwrap_or(CopyState::Idle)
    }

    /// Whether some text reached the clipboard, either the payload or the fallback.
    pub fn delivered_anything(&self) -> bool {
        self.delivery.as_ref().is_some_and(|d| d.ok) || self.fallback_delivery.as_ref().is_some_and(|d| d.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert_eq!(CopyMode::MarkdownOffice.to_string(), "markdown-office");
        assert!(CopyMode::RawHtml.is_text_only());
        assert!(!CopyMode::TranslateOffice.is_text_only());
    }

    #[test]
    fn test_terminal_states() {
        assert!(CopyState::Done.is_terminal());
        assert!(CopyState::Failed.is_terminal());
        assert!(!CopyState::Deliver.is_terminal());
    }
}
