//! Turn events — the UI/emission boundary.
//!
//! The engine publishes one stream of events per turn: context slices
//! for the reasoning visualization, the normalized decision, search
//! progress, incremental answer fragments, and a terminal completed or
//! failed event. Subscribers filter for what they care about; slices
//! and decisions travel as pre-serialized JSON so this crate stays
//! independent of the crates that define them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted during a single conversational turn.
///
/// Every turn ends with exactly one of `TurnCompleted` or `TurnFailed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A user utterance entered the pipeline.
    TurnStarted {
        turn_id: String,
        question: String,
        timestamp: DateTime<Utc>,
    },

    /// Context assembly finished; slices serialized for inspection.
    ContextReady {
        turn_id: String,
        slices: serde_json::Value,
    },

    /// The decision normalizer produced its result.
    DecisionReady {
        turn_id: String,
        decision: serde_json::Value,
    },

    /// An external evidence fetch began.
    SearchStarted { turn_id: String, query: String },

    /// The evidence fetch resolved (possibly degraded).
    SearchCompleted {
        turn_id: String,
        source_count: usize,
        degraded: bool,
    },

    /// A streamed fragment of the final answer.
    AnswerFragment { turn_id: String, content: String },

    /// The turn resolved with a full answer.
    TurnCompleted {
        turn_id: String,
        answer: String,
        timestamp: DateTime<Utc>,
    },

    /// The turn resolved with a user-facing error message.
    TurnFailed {
        turn_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl TurnEvent {
    /// Wire name for this event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::ContextReady { .. } => "context_ready",
            Self::DecisionReady { .. } => "decision_ready",
            Self::SearchStarted { .. } => "search_started",
            Self::SearchCompleted { .. } => "search_completed",
            Self::AnswerFragment { .. } => "answer_fragment",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::TurnFailed { .. } => "turn_failed",
        }
    }

    /// The turn this event belongs to.
    pub fn turn_id(&self) -> &str {
        match self {
            Self::TurnStarted { turn_id, .. }
            | Self::ContextReady { turn_id, .. }
            | Self::DecisionReady { turn_id, .. }
            | Self::SearchStarted { turn_id, .. }
            | Self::SearchCompleted { turn_id, .. }
            | Self::AnswerFragment { turn_id, .. }
            | Self::TurnCompleted { turn_id, .. }
            | Self::TurnFailed { turn_id, .. } => turn_id,
        }
    }
}

/// A broadcast-based event bus for turn events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Publishing
/// with no subscribers, or past a lagging subscriber, is not an error.
pub struct EventBus {
    sender: broadcast::Sender<Arc<TurnEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: TurnEvent) {
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TurnEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
