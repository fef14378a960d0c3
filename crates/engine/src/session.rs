//! Conversation session: the running history plus its persistence.
//!
//! History lives in the key-value store as a JSON array of messages.
//! Restore is tolerant (a corrupt or missing value starts an empty
//! session) and persistence is best-effort, matching the store's own
//! contract.

use std::sync::Arc;

use causerie_core::message::Message;
use causerie_core::store::KvStore;
use tracing::{debug, warn};

const HISTORY_KEY: &str = "history";

/// One user's running conversation.
pub struct Session {
    history: Vec<Message>,
    kv: Arc<dyn KvStore>,
}

impl Session {
    /// Restore the session from the store, or start empty.
    pub async fn restore(kv: Arc<dyn KvStore>) -> Self {
        let history = match kv.get(HISTORY_KEY).await {
            Some(raw) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => {
                    debug!(messages = messages.len(), "session restored");
                    messages
                }
                Err(e) => {
                    warn!(error = %e, "stored history unreadable, starting fresh");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Self { history, kv }
    }

    /// Start an empty session backed by `kv` without reading it.
    pub fn empty(kv: Arc<dyn KvStore>) -> Self {
        Self {
            history: Vec::new(),
            kv,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Write the history back to the store. Best-effort.
    pub async fn persist(&self) {
        match serde_json::to_string(&self.history) {
            Ok(raw) => self.kv.set(HISTORY_KEY, &raw).await,
            Err(e) => warn!(error = %e, "history serialization failed"),
        }
    }

    /// Drop the history, in memory and in the store.
    pub async fn reset(&mut self) {
        self.history.clear();
        self.kv.remove(HISTORY_KEY).await;
    }
}
