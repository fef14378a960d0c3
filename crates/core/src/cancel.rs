//! Cooperative cancellation.
//!
//! A single `CancelToken` flows from the top-level user request down
//! through language-model calls and the evidence fetch. Cancellation is
//! cooperative: holders observe the token at their suspension points and
//! stop producing work; nothing is forcibly killed.

use std::sync::Arc;
use tokio::sync::watch;

/// A clonable cancellation token.
///
/// All clones observe the same flag. Once cancelled, a token stays
/// cancelled forever.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Trigger cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    /// Whether cancellation has been triggered.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is triggered.
    ///
    /// Resolves immediately if the token is already cancelled. If every
    /// sender handle is gone without a cancel, no cancellation can ever
    /// arrive and this future stays pending.
    pub async fn cancelled(&self) {
        let mut rx = self.receiver.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
