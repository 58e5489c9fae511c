//! Selection snapshots.
//!
//! A copy request captures the selection exactly once, synchronously, before
//! its first suspension point. The snapshot carries a liveness probe so the
//! orchestrator can tell, after the slow conversion phase, whether the nodes
//! it was taken from still exist.

use crate::common::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

pub type LivenessCheck = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub struct SelectionSnapshot {
    /// Selected HTML fragment, empty when the selection has no markup
    pub html: String,
    pub text: String,
    pub captured_at: DateTime<Utc>,
    pub source_url: Option<String>,
    liveness: LivenessCheck,
}

impl fmt::Debug for SelectionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionSnapshot")
            .field("html_len", &self.html.len())
            .field("text_len", &self.text.len())
            .field("captured_at", &self.captured_at)
            .field("source_url", &self.source_url)
            .finish()
    }
}

impl SelectionSnapshot {
    /// Snapshot that stays live for its whole lifetime.
    pub fn new(html: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            text: text.into(),
            captured_at: Utc::now(),
            source_url: None,
            liveness: Arc::new(|| true),
        }
    }

    pub fn with_liveness(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.liveness = Arc::new(check);
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Whether the selected nodes are still attached.
    pub fn is_live(&self) -> bool {
        (self.liveness)()
    }

    #[inline]
    pub fn has_html(&self) -> bool {
        !self.html.trim().is_empty()
    }

    /// Both HTML and text are empty or whitespace.
    pub fn is_blank(&self) -> bool {
        !self.has_html() && self.text.trim().is_empty()
    }

    /// Reject snapshots with nothing to copy.
    pub fn validate(&self) -> Result<()> {
        if self.is_blank() {
            return Err(Error::NoSelection);
        }
        Ok(())
    }

    /// Milliseconds since capture.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.captured_at).num_milliseconds()
    }
}

/// Host hook that reads the current selection.
pub trait SelectionSource: Send + Sync {
    fn capture(&self) -> Result<SelectionSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_blank_selection_is_rejected() {
        assert_eq!(SelectionSnapshot::new("  ", "\n\t").validate(), Err(Error::NoSelection));
        assert!(SelectionSnapshot::new("", "text").validate().is_ok());
        assert!(SelectionSnapshot::new("<b></b>", "").validate().is_ok());
    }

    #[test]
    fn test_liveness_probe() {
        let attached = Arc::new(AtomicBool::new(true));
        let probe = attached.clone();
        let snapshot = SelectionSnapshot::new("<p>x</p>", "x").with_liveness(move || probe.load(Ordering::SeqCst));
        assert!(snapshot.is_live());
        attached.store(false, Ordering::SeqCst);
        assert!(!snapshot.is_live());
        assert!(snapshot.age_ms() >= 0);
    }
}
