//! Semantic memory for causerie.
//!
//! An append-bounded log of embedded utterances with top-k similarity
//! search. Embedding and scoring run on a dedicated worker thread that
//! shares no mutable state with the caller: requests carry copied
//! snapshots, responses come back over channels, and a worker fault
//! resolves every pending request with a safe default instead of
//! hanging it.

pub mod embedder;
pub mod entry;
pub mod similarity;
pub mod store;
pub mod worker;

pub use embedder::HashEmbedder;
pub use entry::{MemoryEntry, ScoredMemoryEntry};
pub use similarity::{cosine_similarity, top_k_indices};
pub use store::{MemoryStore, StoreSettings};
pub use worker::EmbeddingWorker;
