//! Error types for the causerie domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Most of the system
//! degrades instead of failing — memory search, evidence fetch, and
//! summarization all fall back to documented safe defaults — so the
//! only errors that travel are model-call failures and setup problems.

use thiserror::Error;

/// The top-level error type for causerie operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Language model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the language-model capability.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by the model endpoint, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request was cancelled")]
    Cancelled,
}
