//! The assembled context slices.
//!
//! One `ContextSlices` value is built per turn and serialized onto the
//! event bus for the reasoning visualization. Slices are never patched
//! in place; a late evidence arrival rebuilds the message pairs from a
//! fresh copy.

use causerie_core::message::Message;
use causerie_memory::ScoredMemoryEntry;
use serde::Serialize;

use crate::profile::RequestProfile;

/// Debug counters describing how the slices were produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SliceCounters {
    /// Messages available before selection
    pub history_considered: usize,

    /// Messages that survived budget selection
    pub history_selected: usize,

    /// Whether selection dropped at least one message
    pub history_truncated: bool,

    /// Query variants fanned out to the memory store
    pub memory_queries: usize,

    /// Memory entries kept after dedup and diversification
    pub memory_hits: usize,

    /// Estimated tokens of the planning prompt
    pub planning_prompt_tokens: usize,

    /// Estimated tokens of the answer prompt
    pub answer_prompt_tokens: usize,
}

/// The building blocks of one turn's prompts.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSlices {
    /// Resolved persona + contextual hints
    pub system_prompt: String,

    /// Lexical profile of the utterance
    pub profile: RequestProfile,

    /// Budget-selected history, chronological
    pub selected_history: Vec<Message>,

    /// Bullet digest of the older selected turns, when split
    pub history_summary: Option<String>,

    /// Bullet digest of the retrieved memories
    pub memory_summary: Option<String>,

    /// Retrieved memory entries, score descending
    pub memory_hits: Vec<ScoredMemoryEntry>,

    /// Labeled external evidence text, when a search ran
    pub external_context: Option<String>,

    /// Assembly statistics
    pub counters: SliceCounters,
}
