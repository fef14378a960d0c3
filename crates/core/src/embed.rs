//! Embedding backend seam.
//!
//! The semantic memory worker hosts exactly one of these on its own
//! thread. The trait is synchronous on purpose: the worker thread owns
//! the backend outright and nothing else ever touches it.

/// A text-to-vector embedding backend.
///
/// Contract: `embed` returns a vector of `dimension()` length for any
/// input, including the empty string. A backend that cannot produce an
/// embedding degrades to an empty vector rather than panicking; callers
/// treat an empty vector as "no embedding available".
pub trait EmbeddingBackend: Send {
    /// A human-readable name for this backend (e.g., "hash").
    fn name(&self) -> &str;

    /// The fixed output dimension.
    fn dimension(&self) -> usize;

    /// Prepare the backend (load weights, warm caches). Idempotent;
    /// called once by the worker before serving requests.
    fn load(&mut self) {}

    /// Embed one text.
    fn embed(&self, text: &str) -> Vec<f32>;
}
