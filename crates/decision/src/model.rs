//! Decision types: the raw, unvalidated shape the model emits and the
//! strongly-typed result the engine consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the turn should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    /// Fetch external evidence before answering
    Search,
    /// Answer from the assembled context alone
    Respond,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Respond => "respond",
        }
    }
}

/// The unvalidated decision as deserialized from model output.
///
/// Every field is an arbitrary JSON value; coercion into the typed
/// [`DecisionResult`] happens in normalization, where a malformed
/// field is dropped rather than failing the whole parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDecision {
    #[serde(default)]
    pub action: Option<Value>,
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub plan: Option<Value>,
    #[serde(default)]
    pub rationale: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
}

/// The validated, repaired decision for one turn. Built once by
/// normalization and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub action: DecisionAction,

    /// Web query, meaningful only when `action` is `Search`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Numbered plan, always 3 to 6 steps
    pub plan: String,

    pub rationale: String,

    /// Ready answer text, meaningful only when `action` is `Respond`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Human-readable diagnostics accumulated during repair
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
