//! Evidence-fetch capability — external web search as a collaborator.
//!
//! The fetcher is infallible by contract: a network error, a timeout, or
//! a cancellation degrades to a bundle carrying an explicit "search
//! failed" notice, never a propagated error. The conversation continues
//! either way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;

/// Text handed to the model when the search could not be completed.
/// In the assistant's language, since the model reads it verbatim.
pub const SEARCH_FAILED_NOTICE: &str = "La recherche web n'a pas abouti. Réponds à partir de tes \
     connaissances internes et précise que les informations récentes n'ont pas pu être vérifiées.";

/// One cited source behind an evidence bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub title: String,
    pub url: String,
}

/// The outcome of an evidence fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Digest text to inject into the answer prompt
    pub content: String,

    /// Cited sources, unique by URL, in relevance order
    #[serde(default)]
    pub sources: Vec<EvidenceSource>,
}

impl EvidenceBundle {
    /// The degraded bundle used on any fetch failure.
    pub fn unavailable() -> Self {
        Self {
            content: SEARCH_FAILED_NOTICE.to_string(),
            sources: Vec::new(),
        }
    }
}

/// The evidence-fetch capability.
#[async_trait]
pub trait EvidenceFetcher: Send + Sync {
    /// A human-readable name for this fetcher (e.g., "duckduckgo").
    fn name(&self) -> &str;

    /// Fetch evidence for a query.
    ///
    /// Implementations observe the token and their own internal timeout,
    /// and degrade to [`EvidenceBundle::unavailable`] on every failure
    /// path.
    async fn fetch(&self, query: &str, cancel: &CancelToken) -> EvidenceBundle;
}
