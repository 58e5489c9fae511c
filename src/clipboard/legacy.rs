// Legacy selection-based copy
//
// The last-resort stage puts the payload into a temporary off-screen element,
// selects it and runs the host's synchronous copy command. The user's
// selection is saved first and put back afterwards; the element is detached
// whether the command succeeded, failed, or the stage bailed out early.

use super::{CapabilitySnapshot, ClipboardPayload, DeliveryMode};
use crate::common::error::{Error, Result};

/// Opaque handle to an element attached by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

/// Opaque handle to a saved selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SavedSelection(pub u64);

/// Host primitives for the legacy copy command
pub trait LegacyCopySurface: Send + Sync {
    fn capabilities(&self) -> CapabilitySnapshot;

    fn save_selection(&self) -> Option<SavedSelection>;

    fn restore_selection(&self, saved: SavedSelection);

    /// Attach an off-screen editable element holding `html` (or `text`) and select its contents.
    fn attach_element(&self, html: Option<&str>, text: &str) -> Result<ElementHandle>;

    fn detach_element(&self, element: ElementHandle);

    /// Run the copy command; `false` means the host refused.
    fn exec_copy(&self) -> Result<bool>;
}

struct LegacyGuard<'a> {
    surface: &'a dyn LegacyCopySurface,
    saved: Option<SavedSelection>,
    element: Option<ElementHandle>,
}

impl Drop for LegacyGuard<'_> {
    fn drop(&mut self) {
        if let Some(element) = self.element.take() {
            self.surface.detach_element(element);
        }
        if let Some(saved) = self.saved.take() {
            self.surface.restore_selection(saved);
        }
    }
}

pub(super) fn legacy_copy(surface: &dyn LegacyCopySurface, payload: &ClipboardPayload, mode: DeliveryMode) -> Result<()> {
    let mut guard = LegacyGuard {
        surface,
        saved: surface.save_selection(),
        element: None,
    };
    let html = match mode {
        DeliveryMode::Rich => payload.html.as_deref(),
        DeliveryMode::TextOnly => None,
    };
    guard.element = Some(surface.attach_element(html, &payload.text)?);
    if surface.exec_copy()? {
        Ok(())
    } else {
        Err(Error::delivery("legacy-command", "copy command was refused"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLegacySurface;

    #[test]
    fn test_cleanup_on_success() {
        let surface = FakeLegacySurface::new(true);
        let payload = ClipboardPayload::rich("<b>x</b>", "x", None);
        assert!(legacy_copy(&surface, &payload, DeliveryMode::Rich).is_ok());
        assert_eq!(surface.attached(), 0);
        assert!(surface.selection_restored());
        assert_eq!(surface.last_html().as_deref(), Some("<b>x</b>"));
    }

    #[test]
    fn test_cleanup_on_refusal_and_error() {
        let refused = FakeLegacySurface::new(false);
        let payload = ClipboardPayload::text_only("x");
        assert!(legacy_copy(&refused, &payload, DeliveryMode::TextOnly).is_err());
        assert_eq!(refused.attached(), 0);
        assert!(refused.selection_restored());

        let broken = FakeLegacySurface::new(true).failing_exec();
        assert!(legacy_copy(&broken, &payload, DeliveryMode::TextOnly).is_err());
        assert_eq!(broken.attached(), 0);
        assert!(broken.selection_restored());
    }
}
