//! Single-slot holder for the most recently deleted clip

use tracing::debug;

use crate::clip::Clip;

/// Keeps at most one soft-deleted clip. A new capture overwrites the old one.
/// There is no expiry here; time-boxing the undo affordance is up to the UI.
#[derive(Debug, Default)]
pub struct UndoManager {
    captured: Option<Clip>,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `clip` as the undoable deletion, returning any capture it replaces
    pub fn capture(&mut self, clip: Clip) -> Option<Clip> {
        debug!("Captured clip {} for undo", clip.id);
        self.captured.replace(clip)
    }

    /// Take the captured clip, leaving the slot empty
    pub fn take(&mut self) -> Option<Clip> {
        self.captured.take()
    }

    /// Drop the capture, but only if it is still the clip with `id`
    pub fn discard(&mut self, id: &str) -> bool {
        if self.captured.as_ref().is_some_and(|c| c.id == id) {
            self.captured = None;
            true
        } else {
            false
        }
    }

    pub fn peek(&self) -> Option<&Clip> {
        self.captured.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.captured.is_none()
    }
}
