//! Cross-context messaging.
//!
//! The copy pipeline talks to other execution contexts (a background worker,
//! an offscreen document, the page's own script world) through one
//! request/response abstraction. Every transport is wrapped behind
//! [`MessageBus`] and returns the same [`BusResponse`] shape, so call sites only
//! ever handle one result type.
//!
//! A missing listener is an ordinary outcome rather than a fault: contexts come
//! and go, and callers fall through to the next strategy when nobody answers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Context a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusTarget {
    /// Long-lived privileged worker
    Background,
    /// Isolated helper document with its own engines and clipboard access
    Offscreen,
    /// Script world of the page the selection lives in
    Page,
}

impl std::fmt::Display for BusTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BusTarget::Background => "background",
            BusTarget::Offscreen => "offscreen",
            BusTarget::Page => "page",
        })
    }
}

/// Messages understood by the other contexts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BusRequest {
    /// Convert TeX to MathML
    ConvertTex { latex: String, display: bool },
    /// Load the full-grammar math engine and report once it is ready
    LoadEngine,
    /// Write an HTML + plain-text pair to the system clipboard
    WriteClipboard {
        html: String,
        text: String,
        /// Pre-serialized CF_HTML for hosts that write raw formats
        cf_html: Option<String>,
    },
    /// Liveness check
    Ping,
}

impl BusRequest {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            BusRequest::ConvertTex { .. } => "convert-tex",
            BusRequest::LoadEngine => "load-engine",
            BusRequest::WriteClipboard { .. } => "write-clipboard",
            BusRequest::Ping => "ping",
        }
    }
}

/// Uniform reply shape for every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BusResponse {
    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            ok: true,
            payload: Some(payload.into()),
            error: None,
        }
    }

    pub fn ack() -> Self {
        Self {
            ok: true,
            payload: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Collapse into the payload, treating `ok = false` as a remote error.
    pub fn into_payload(self) -> Result<Option<String>, BusError> {
        if self.ok {
            Ok(self.payload)
        } else {
            Err(BusError::Remote(
                self.error.unwrap_or_else(|| "request rejected".to_string()),
            ))
        }
    }
}

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// Nobody is listening in the target context
    #[error("no listener in target context")]
    NoListener,
    /// The channel closed before a reply arrived
    #[error("channel closed before reply")]
    Closed,
    /// The reply did not arrive in time
    #[error("no reply within {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The other side answered with an error
    #[error("remote error: {0}")]
    Remote(String),
}

/// Request/response transport to another execution context.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn request(&self, target: BusTarget, request: BusRequest) -> Result<BusResponse, BusError>;
}

/// Send `request` and give up after `limit`.
pub async fn request_with_timeout(
    bus: &dyn MessageBus,
    target: BusTarget,
    request: BusRequest,
    limit: Duration,
) -> Result<BusResponse, BusError> {
    let name = request.name();
    match tokio::time::timeout(limit, bus.request(target, request)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(BusError::NoListener)) => {
            tracing::debug!(%target, request = name, "no listener");
            Err(BusError::NoListener)
        },
        Ok(Err(e)) => {
            tracing::warn!(%target, request = name, error = %e, "bus request failed");
            Err(e)
        },
        Err(_) => {
            tracing::warn!(%target, request = name, limit_ms = limit.as_millis() as u64, "bus request timed out");
            Err(BusError::Timeout(limit))
        },
    }
}
