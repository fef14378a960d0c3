//! Key-value persistence capability.
//!
//! Settings and conversation history live behind this opaque seam as
//! key → JSON-string pairs. Persistence is best-effort: implementations
//! swallow their own failures (after logging) so that a broken disk or
//! a missing directory never blocks a conversation.

use async_trait::async_trait;

/// An opaque string key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// A human-readable name for this store (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Read the value for `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`. Best-effort.
    async fn set(&self, key: &str, value: &str);

    /// Remove `key`. Best-effort; removing an absent key is a no-op.
    async fn remove(&self, key: &str);
}
