//! User-facing notifications emitted by the sync engine
//!
//! The engine only produces toast events; showing them and expiring them is
//! the presentation layer's job.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Severity of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastKind {
    /// Informational, typically carrying an action
    Info,
    Success,
    Error,
}

/// What the presentation layer should do when the action is triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToastIntent {
    /// Call `SyncEngine::undo` to restore the clip that was just deleted
    UndoDelete { clip_id: String },
}

/// Button attached to a toast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastAction {
    pub label: String,
    pub intent: ToastIntent,
}

/// A single notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: Uuid,
    pub kind: ToastKind,
    pub message: String,
    pub action: Option<ToastAction>,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self::build(ToastKind::Success, message, None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::build(ToastKind::Error, message, None)
    }

    pub fn info_with_action(message: impl Into<String>, action: ToastAction) -> Self {
        Self::build(ToastKind::Info, message, Some(action))
    }

    fn build(kind: ToastKind, message: impl Into<String>, action: Option<ToastAction>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            action,
        }
    }
}

/// Receiver of engine notifications (the `addToast` side of the UI)
pub trait ToastSink: Send + Sync {
    fn add_toast(&self, toast: Toast);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ToastSink for NullSink {
    fn add_toast(&self, _toast: Toast) {}
}

/// Fan-out sink backed by a broadcast channel
#[derive(Debug, Clone)]
pub struct ToastBus {
    sender: broadcast::Sender<Toast>,
}

impl ToastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.sender.subscribe()
    }
}

impl Default for ToastBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ToastSink for ToastBus {
    fn add_toast(&self, toast: Toast) {
        // No subscribers is fine; nobody is looking.
        let _ = self.sender.send(toast);
    }
}

/// Sink that keeps every toast, for inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<ToastKind> {
        self.toasts().into_iter().map(|t| t.kind).collect()
    }
}

impl ToastSink for RecordingSink {
    fn add_toast(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }
}
