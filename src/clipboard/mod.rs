//! Clipboard delivery across isolation boundaries.
//!
//! A payload is written by the first stage that succeeds:
//!
//! 1. [`DeliveryStage::Direct`]: rich multi-format write in the current context
//! 2. [`DeliveryStage::Privileged`]: delegated over the bus to a privileged worker
//! 3. [`DeliveryStage::HelperDocument`]: an isolated helper document opened (or
//!    reused) for clipboard access, reached over the bus
//! 4. [`DeliveryStage::LegacyCommand`]: selection-based copy from a temporary
//!    off-screen element
//!
//! Each stage leaves a [`StageAttempt`] with the error it hit and a
//! [`CapabilitySnapshot`] of the environment, so a failed delivery can be
//! explained from the diagnostics alone.

mod chain;
mod legacy;

pub use chain::DeliveryChain;
pub use legacy::{ElementHandle, LegacyCopySurface, SavedSelection};

use crate::common::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStage {
    Direct,
    Privileged,
    HelperDocument,
    LegacyCommand,
}

impl DeliveryStage {
    /// Stages in the order they are tried
    pub const ALL: [DeliveryStage; 4] = [
        DeliveryStage::Direct,
        DeliveryStage::Privileged,
        DeliveryStage::HelperDocument,
        DeliveryStage::LegacyCommand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStage::Direct => "direct",
            DeliveryStage::Privileged => "privileged",
            DeliveryStage::HelperDocument => "helper-document",
            DeliveryStage::LegacyCommand => "legacy-command",
        }
    }
}

impl std::fmt::Display for DeliveryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the environment of a stage exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// A clipboard write primitive exists
    pub write: bool,
    /// Multi-format clipboard items can be constructed
    pub rich_item: bool,
    /// The context is a secure context
    pub secure_context: bool,
}

impl CapabilitySnapshot {
    pub const NONE: CapabilitySnapshot = CapabilitySnapshot {
        write: false,
        rich_item: false,
        secure_context: false,
    };

    pub const FULL: CapabilitySnapshot = CapabilitySnapshot {
        write: true,
        rich_item: true,
        secure_context: true,
    };

    /// Whether a payload can be written in `mode` with these capabilities.
    pub fn missing_for(&self, mode: DeliveryMode) -> Option<&'static str> {
        if !self.write {
            Some("no clipboard write primitive")
        } else if mode == DeliveryMode::Rich && !self.rich_item {
            Some("no rich clipboard item support")
        } else if !self.secure_context {
            Some("not a secure context")
        } else {
            None
        }
    }
}

/// Which flavours a delivery must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// HTML plus plain text
    Rich,
    /// Plain text only
    TextOnly,
}

/// Content handed to the clipboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub html: Option<String>,
    pub text: String,
    /// Pre-serialized CF_HTML for surfaces that write raw platform formats
    pub cf_html: Option<String>,
}

impl ClipboardPayload {
    pub fn rich(html: impl Into<String>, text: impl Into<String>, cf_html: Option<String>) -> Self {
        Self {
            html: Some(html.into()),
            text: text.into(),
            cf_html,
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            html: None,
            text: text.into(),
            cf_html: None,
        }
    }

    /// The mode this payload can be delivered in
    pub fn mode(&self) -> DeliveryMode {
        if self.html.is_some() {
            DeliveryMode::Rich
        } else {
            DeliveryMode::TextOnly
        }
    }
}

/// Diagnostics for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAttempt {
    pub stage: DeliveryStage,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub capabilities: CapabilitySnapshot,
    pub elapsed_ms: u64,
}

/// Outcome of a delivery, always attached to the copy outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<DeliveryStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: Vec<StageAttempt>,
}

impl DeliveryResult {
    /// Render the diagnostics as YAML for bug reports.
    pub fn diagnostics_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).map_err(|e| Error::Other(e.to_string()))
    }
}

/// Clipboard of the current context
#[async_trait]
pub trait ClipboardSurface: Send + Sync {
    fn capabilities(&self) -> CapabilitySnapshot;

    async fn write(&self, payload: &ClipboardPayload, mode: DeliveryMode) -> Result<()>;
}

/// Owner of the isolated helper document used for clipboard access
#[async_trait]
pub trait HelperDocumentHost: Send + Sync {
    /// Whether this context can open helper documents at all
    fn capabilities(&self) -> CapabilitySnapshot;

    fn has_document(&self) -> bool;

    /// Open the helper document; a no-op when one is already open.
    async fn open_document(&self) -> Result<()>;
}
