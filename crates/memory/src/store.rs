//! The semantic memory store.
//!
//! An append-bounded log of embedded utterances. The log itself lives
//! behind a `tokio::sync::Mutex` and is mutated only by `add` and
//! `clear`; `search` clones a point-in-time snapshot and ships it to
//! the worker, so a concurrent `add` can never produce an index/entry
//! mismatch or let a half-written entry be scored.

use causerie_core::message::{Message, Role};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use causerie_core::embed::EmbeddingBackend;

use crate::entry::{MemoryEntry, ScoredMemoryEntry};
use crate::worker::EmbeddingWorker;

/// Store tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Whether the store participates in context assembly at all.
    pub enabled: bool,

    /// Hard cap on the number of entries. After any `add`, the entry
    /// count never exceeds this.
    pub capacity: usize,

    /// Entry content is truncated to this many characters.
    pub content_char_cap: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 128,
            content_char_cap: 320,
        }
    }
}

/// The semantic memory store.
pub struct MemoryStore {
    worker: EmbeddingWorker,
    entries: Mutex<Vec<MemoryEntry>>,
    settings: StoreSettings,
    warmed: OnceCell<()>,
}

impl MemoryStore {
    /// Create a store hosting `backend` on its own worker thread.
    pub fn new(settings: StoreSettings, backend: Box<dyn EmbeddingBackend>) -> Self {
        Self {
            worker: EmbeddingWorker::spawn(backend),
            entries: Mutex::new(Vec::new()),
            settings,
            warmed: OnceCell::new(),
        }
    }

    /// Whether this store should be consulted during context assembly.
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Pre-load the embedding backend in the worker.
    ///
    /// Memoized: concurrent and repeated calls all await the first
    /// in-flight load; a second load is never kicked off.
    pub async fn warmup(&self) {
        self.warmed
            .get_or_init(|| async {
                self.worker.warmup().await;
            })
            .await;
    }

    /// Commit a message to memory.
    ///
    /// No-op when the content is empty after trimming. Suspends while
    /// the worker computes the embedding; the log lock is only taken
    /// afterwards, for the append itself.
    pub async fn add(&self, message: &Message) {
        if message.content.trim().is_empty() {
            debug!("skipping empty message, nothing to remember");
            return;
        }

        let mut entry = MemoryEntry::from_message(message, self.settings.content_char_cap);
        entry.embedding = self.worker.embed(entry.content.clone()).await;

        let mut entries = self.entries.lock().await;
        entries.push(entry);
        while entries.len() > self.settings.capacity {
            entries.remove(0);
        }
    }

    /// Top-`limit` entries by similarity to `query`, score descending.
    ///
    /// Empty query or empty store yields no hits. The worker scores a
    /// snapshot cloned at call time; hits are mapped back by index onto
    /// that same snapshot, not the live log.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<ScoredMemoryEntry> {
        debug_assert!(limit > 0, "search limit must be positive");
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }

        let snapshot: Vec<MemoryEntry> = self.entries.lock().await.clone();
        if snapshot.is_empty() {
            return Vec::new();
        }

        let embeddings: Vec<Vec<f32>> = snapshot.iter().map(|e| e.embedding.clone()).collect();
        let hits = self.worker.search(embeddings, query.to_string(), limit).await;

        hits.into_iter()
            .filter_map(|(index, score)| {
                snapshot.get(index).map(|entry| ScoredMemoryEntry {
                    entry: entry.clone(),
                    score,
                })
            })
            .collect()
    }

    /// Render scored entries as a deterministic human-readable digest,
    /// one line per entry with role, time, and rounded percentage score.
    pub fn format_summaries(entries: &[ScoredMemoryEntry]) -> String {
        entries
            .iter()
            .map(|scored| {
                let role = match scored.entry.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    Role::Tool => "tool",
                };
                let time = scored
                    .entry
                    .timestamp
                    .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "date inconnue".to_string());
                let pct = (scored.score.clamp(0.0, 1.0) * 100.0).round() as u32;
                format!("- [{role} · {time} · {pct}%] {}", scored.entry.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drop every entry. Used on conversation reset.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Current number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
