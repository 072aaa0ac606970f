//! Plain-text rendering of clips and toasts for the terminal

use chrono::{DateTime, Local};

use crate::clip::Clip;
use crate::notify::{Toast, ToastKind};

const PREVIEW_CHARS: usize = 50;

/// Single-line preview, cut at a character boundary
pub fn preview(text: &str) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

/// `created_at` as local wall-clock time
pub fn timestamp(created_at: i64) -> String {
    DateTime::from_timestamp_millis(created_at)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "????-??-?? ??:??:??".to_string())
}

pub fn clip_line(clip: &Clip) -> String {
    let mut line = format!(
        "[{}] {}  {}",
        timestamp(clip.created_at),
        clip.id,
        preview(&clip.content)
    );
    if let Some(note) = &clip.note {
        line.push_str(&format!("  ({})", preview(note)));
    }
    line
}

pub fn toast_line(toast: &Toast) -> String {
    let tag = match toast.kind {
        ToastKind::Info => "info",
        ToastKind::Success => "ok",
        ToastKind::Error => "error",
    };
    match &toast.action {
        Some(action) => format!("[{}] {} ({} available)", tag, toast.message, action.label),
        None => format!("[{}] {}", tag, toast.message),
    }
}

/// Ids in view order, used to detect when a redraw is needed
pub fn id_fingerprint(view: &[Clip]) -> Vec<String> {
    view.iter().map(|c| c.id.clone()).collect()
}

pub fn print_view(view: &[Clip]) {
    println!("--- {} clips ---", view.len());
    for clip in view.iter().take(10) {
        println!("  {}", clip_line(clip));
    }
}
