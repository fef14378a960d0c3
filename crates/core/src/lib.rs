//! # Causerie Core
//!
//! Domain types, traits, and error definitions for the causerie assistant.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability is defined as a trait here: the language model,
//! the evidence fetcher, the key-value store, the embedding backend.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod cancel;
pub mod embed;
pub mod error;
pub mod event;
pub mod evidence;
pub mod llm;
pub mod message;
pub mod store;
pub mod text;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use cancel::CancelToken;
pub use embed::EmbeddingBackend;
pub use error::{Error, ModelError, Result};
pub use event::{EventBus, TurnEvent};
pub use evidence::{EvidenceBundle, EvidenceFetcher, EvidenceSource};
pub use llm::{CompletionRequest, CompletionResponse, LanguageModel, StreamChunk, TokenUsage};
pub use message::{Message, Role};
pub use store::KvStore;
pub use token::{estimate_message_tokens, estimate_messages_tokens, estimate_tokens};
