//! The clip entity and the collection helpers shared by the cache, the
//! remote client and the sync engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix carried by ids of clips that exist only optimistically in the view
pub const PROVISIONAL_PREFIX: &str = "temp-";

/// A single stored text snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    /// Globally unique identifier, generated client-side
    pub id: String,
    /// Snippet text, never empty
    pub content: String,
    /// Optional short annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Milliseconds since the Unix epoch, the sole ordering key
    pub created_at: i64,
}

impl Clip {
    /// Create a clip with a fresh random id stamped with the current time
    pub fn new(content: impl Into<String>, note: Option<String>) -> Self {
        Self {
            id: generate_id(),
            content: content.into(),
            note: normalize_note(note),
            created_at: now_millis(),
        }
    }

    /// Create the placeholder shown in the view while a create is in flight
    pub fn provisional(content: impl Into<String>, note: Option<String>) -> Self {
        Self {
            id: provisional_id(),
            ..Self::new(content, note)
        }
    }

    /// Whether this clip is an unconfirmed optimistic placeholder
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_PREFIX)
    }

    /// Case-insensitive match against content and note
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.content.to_lowercase().contains(needle_lower)
            || self
                .note
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(needle_lower))
    }
}

/// Random v4 id; ordering of ids carries no information about creation time
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn provisional_id() -> String {
    format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4().simple())
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Blank notes are stored as absent
pub fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Sort newest first by `created_at`
pub fn sort_newest_first(clips: &mut [Clip]) {
    clips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Insert `clip` and restore newest-first ordering
pub fn insert_sorted(clips: &mut Vec<Clip>, clip: Clip) {
    clips.insert(0, clip);
    sort_newest_first(clips);
}

/// The set of unique ids present in a collection
pub fn identity_set(clips: &[Clip]) -> HashSet<&str> {
    clips.iter().map(|c| c.id.as_str()).collect()
}

/// Whether two collections hold the same ids, ignoring order and contents
pub fn same_identities(a: &[Clip], b: &[Clip]) -> bool {
    identity_set(a) == identity_set(b)
}

/// Clips whose content or note contains `query`, case-insensitively.
/// A blank query returns everything.
pub fn filter_clips<'a>(clips: &'a [Clip], query: &str) -> Vec<&'a Clip> {
    let query = query.trim();
    if query.is_empty() {
        return clips.iter().collect();
    }
    let needle = query.to_lowercase();
    clips.iter().filter(|c| c.matches(&needle)).collect()
}
