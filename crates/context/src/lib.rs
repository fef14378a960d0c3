//! Context construction for causerie.
//!
//! Given a user utterance, the conversation history, and the memory
//! store, this crate profiles the request, selects history under a
//! token budget, retrieves and reranks memories, and assembles the two
//! prompt pairs (planning and answer) that drive a turn. Everything
//! here is best-effort: a failed summarization or an empty memory
//! store degrades the context, it never fails the turn.

pub mod assembler;
pub mod budget;
pub mod history;
pub mod profile;
pub mod recall;
pub mod slices;

pub use assembler::{AssembledContext, ContextAssembler, DEFAULT_PERSONA};
pub use budget::{ContextBudget, MEMORY_RESERVE_TOKENS};
pub use history::{HistorySelection, select_history_under_budget};
pub use profile::{Intent, RequestProfile, build_request_profile};
pub use recall::{MemoryRecall, retrieve_memories, summarize_memories};
pub use slices::{ContextSlices, SliceCounters};
