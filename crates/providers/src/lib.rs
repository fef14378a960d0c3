//! Concrete backends for causerie's capability seams.
//!
//! - [`OpenAiCompatModel`]: chat completions against any
//!   OpenAI-compatible endpoint (llama.cpp server, Ollama, vLLM, ...)
//! - [`HttpEvidenceFetcher`]: instant-answer web search, degrading to a
//!   failure notice instead of erroring
//! - [`FileKvStore`] / [`MemoryKvStore`]: best-effort persistence

pub mod evidence;
pub mod kv;
pub mod openai_compat;

pub use evidence::HttpEvidenceFetcher;
pub use kv::{FileKvStore, MemoryKvStore};
pub use openai_compat::OpenAiCompatModel;
