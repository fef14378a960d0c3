//! Memory entry types.

use causerie_core::message::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remembered utterance.
///
/// Owned exclusively by the [`MemoryStore`](crate::store::MemoryStore);
/// callers only ever see clones. Content is capped at store time, so an
/// entry is always cheap to copy across the worker boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Id of the message this entry was created from
    pub id: String,

    /// Who said it
    pub role: Role,

    /// Capped content, ellipsis-terminated when truncated
    pub content: String,

    /// When the source message was created, if known
    pub timestamp: Option<DateTime<Utc>>,

    /// Embedding vector; empty when the worker could not produce one
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl MemoryEntry {
    /// Build an entry from a message, capping content at `char_cap`
    /// characters. The embedding is attached by the store afterwards.
    pub fn from_message(message: &Message, char_cap: usize) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: cap_content(message.content.trim(), char_cap),
            timestamp: message.timestamp,
            embedding: Vec::new(),
        }
    }
}

/// Cap a string at `char_cap` characters, appending an ellipsis marker
/// when anything was cut. Operates on characters, not bytes.
fn cap_content(content: &str, char_cap: usize) -> String {
    if content.chars().count() <= char_cap {
        return content.to_string();
    }
    let mut capped: String = content.chars().take(char_cap).collect();
    while capped.ends_with(' ') {
        capped.pop();
    }
    capped.push('…');
    capped
}

/// A memory entry with its per-query similarity score.
///
/// Ephemeral: produced by `search`, consumed by the reranker, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemoryEntry {
    #[serde(flatten)]
    pub entry: MemoryEntry,

    /// Cosine similarity against the query, conventionally in [-1, 1]
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_untouched() {
        let msg = Message::user("Bonjour");
        let entry = MemoryEntry::from_message(&msg, 320);
        assert_eq!(entry.content, "Bonjour");
        assert_eq!(entry.id, msg.id);
    }

    #[test]
    fn long_content_is_capped_with_ellipsis() {
        let msg = Message::user("x".repeat(400));
        let entry = MemoryEntry::from_message(&msg, 320);
        assert_eq!(entry.content.chars().count(), 321);
        assert!(entry.content.ends_with('…'));
    }

    #[test]
    fn cap_respects_multibyte_characters() {
        let msg = Message::user("é".repeat(400));
        let entry = MemoryEntry::from_message(&msg, 320);
        assert_eq!(entry.content.chars().count(), 321);
    }

    #[test]
    fn cap_drops_trailing_spaces_before_ellipsis() {
        let content = format!("{} suite", "a".repeat(319));
        let entry = MemoryEntry::from_message(&Message::user(content), 320);
        assert!(!entry.content.contains(" …"));
    }

    #[test]
    fn content_is_trimmed() {
        let msg = Message::user("  entouré d'espaces  ");
        let entry = MemoryEntry::from_message(&msg, 320);
        assert_eq!(entry.content, "entouré d'espaces");
    }
}
