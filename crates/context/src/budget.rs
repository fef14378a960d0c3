//! Token budgets for context assembly.
//!
//! The estimator these budgets are measured in is approximate, so the
//! aggregate ceiling is a soft one: selection truncates toward the
//! budget, it does not guarantee the model's real tokenizer agrees.

use causerie_config::ContextConfig;
use serde::{Deserialize, Serialize};

/// Reserved share of the answer budget for the memory block, so history
/// selection cannot starve retrieval.
pub const MEMORY_RESERVE_TOKENS: usize = 800;

/// Per-turn token budget, in estimated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    /// Aggregate ceiling for any assembled prompt
    pub total_tokens: usize,

    /// Reserved for the system prompt
    pub system_tokens: usize,

    /// History/memory budget for the planning prompt
    pub planning_tokens: usize,

    /// History/memory budget for the answer prompt
    pub answer_tokens: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            total_tokens: 4096,
            system_tokens: 800,
            planning_tokens: 1200,
            answer_tokens: 2800,
        }
    }
}

impl ContextBudget {
    /// Budget from configuration; serde defaults already filled any
    /// field the file left out.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            total_tokens: config.total_tokens,
            system_tokens: config.system_tokens,
            planning_tokens: config.planning_tokens,
            answer_tokens: config.answer_tokens,
        }
    }

    /// Resolve an optional override against the defaults.
    pub fn resolve(budget: Option<ContextBudget>) -> Self {
        budget.unwrap_or_default()
    }

    /// The slice of the answer budget available to history selection.
    pub fn history_tokens(&self) -> usize {
        self.answer_tokens.saturating_sub(MEMORY_RESERVE_TOKENS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let budget = ContextBudget::default();
        assert_eq!(budget.total_tokens, 4096);
        assert_eq!(budget.system_tokens, 800);
        assert_eq!(budget.planning_tokens, 1200);
        assert_eq!(budget.answer_tokens, 2800);
    }

    #[test]
    fn resolve_fills_missing_budget() {
        assert_eq!(ContextBudget::resolve(None), ContextBudget::default());
        let custom = ContextBudget {
            total_tokens: 2048,
            system_tokens: 400,
            planning_tokens: 600,
            answer_tokens: 1400,
        };
        assert_eq!(ContextBudget::resolve(Some(custom)), custom);
    }

    #[test]
    fn history_budget_leaves_room_for_memory() {
        let budget = ContextBudget::default();
        assert_eq!(budget.history_tokens(), 2000);

        let tiny = ContextBudget {
            answer_tokens: 100,
            ..ContextBudget::default()
        };
        assert_eq!(tiny.history_tokens(), 0);
    }

    #[test]
    fn from_config_copies_every_field() {
        let config = ContextConfig::default();
        let budget = ContextBudget::from_config(&config);
        assert_eq!(budget, ContextBudget::default());
    }
}
