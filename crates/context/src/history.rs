//! History selection under a token budget.
//!
//! Messages are scored by recency, role, and query-word overlap, then
//! accepted greedily in score order until the budget would be exceeded.
//! The accepted subset is re-emitted in chronological order: timestamped
//! messages ascending, untimestamped messages after them in their
//! original relative order, so a message whose timestamp failed to
//! parse keeps a stable position.

use causerie_core::message::{Message, Role};
use causerie_core::text::{content_words, normalize};
use causerie_core::token::estimate_message_tokens;
use tracing::debug;

/// How many trailing messages stay verbatim when the selection is
/// split for summarization.
pub const RECENT_KEEP: usize = 4;

/// Selections larger than this, when truncated, get their older part
/// summarized.
const SUMMARY_THRESHOLD: usize = 6;

/// The outcome of history selection.
#[derive(Debug, Clone)]
pub struct HistorySelection {
    /// Accepted messages, chronological order
    pub selected: Vec<Message>,

    /// Whether at least one message was dropped for lack of budget
    pub truncated: bool,
}

impl HistorySelection {
    /// Split the selection into an older prefix worth summarizing and
    /// a recent suffix kept verbatim.
    ///
    /// Returns `None` unless the selection was truncated and holds more
    /// than six messages — short or complete histories go out whole.
    pub fn split_for_summary(&self) -> Option<(&[Message], &[Message])> {
        if !self.truncated || self.selected.len() <= SUMMARY_THRESHOLD {
            return None;
        }
        let cut = self.selected.len() - RECENT_KEEP;
        Some((&self.selected[..cut], &self.selected[cut..]))
    }
}

fn role_weight(role: Role) -> f64 {
    match role {
        Role::User => 0.7,
        Role::Assistant => 0.5,
        Role::System | Role::Tool => 0.3,
    }
}

/// Score one message: recency dominates, role breaks near-ties, query
/// overlap nudges relevant turns upward.
fn score_message(message: &Message, distance_from_end: usize, query_words: &[String]) -> f64 {
    let recency = 1.25 * (1.0 / (1.0 + distance_from_end as f64));
    // Query words are diacritic-folded, so the content must be folded
    // the same way before matching.
    let content = normalize(&message.content);
    let overlap = query_words
        .iter()
        .filter(|w| content.contains(w.as_str()))
        .count() as f64;
    recency + role_weight(message.role) + 0.15 * overlap
}

/// Select prior messages under `token_budget` estimated tokens.
///
/// Never returns a selection whose summed estimated tokens exceed the
/// budget. Greedy in score order; the first message that would not fit
/// stops the scan and marks the selection truncated.
pub fn select_history_under_budget(
    history: &[Message],
    query: &str,
    token_budget: usize,
) -> HistorySelection {
    if history.is_empty() || token_budget == 0 {
        return HistorySelection {
            selected: Vec::new(),
            truncated: !history.is_empty(),
        };
    }

    let query_words = content_words(query, 4);
    let last = history.len() - 1;

    let mut scored: Vec<(usize, f64)> = history
        .iter()
        .enumerate()
        .map(|(index, message)| (index, score_message(message, last - index, &query_words)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut accepted: Vec<usize> = Vec::new();
    let mut used = 0usize;
    let mut truncated = false;
    for (index, _) in scored {
        let cost = estimate_message_tokens(&history[index]);
        if used + cost > token_budget {
            // Dropped, not split. Everything below this score is out.
            truncated = true;
            break;
        }
        used += cost;
        accepted.push(index);
    }

    debug!(
        considered = history.len(),
        selected = accepted.len(),
        used_tokens = used,
        budget = token_budget,
        truncated,
        "history selection done"
    );

    // Chronological reconstruction: timestamped ascending, then
    // untimestamped in original-index order.
    let mut timestamped: Vec<usize> = accepted
        .iter()
        .copied()
        .filter(|&i| history[i].timestamp.is_some())
        .collect();
    timestamped.sort_by_key(|&i| (history[i].timestamp, i));

    let mut untimestamped: Vec<usize> = accepted
        .iter()
        .copied()
        .filter(|&i| history[i].timestamp.is_none())
        .collect();
    untimestamped.sort_unstable();

    let selected = timestamped
        .into_iter()
        .chain(untimestamped)
        .map(|i| history[i].clone())
        .collect();

    HistorySelection {
        selected,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_core::token::estimate_messages_tokens;
    use chrono::{Duration, Utc};

    fn timed_history(contents: &[&str]) -> Vec<Message> {
        let base = Utc::now() - Duration::hours(1);
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Message::user(*c).with_timestamp(Some(base + Duration::minutes(i as i64)))
            })
            .collect()
    }

    #[test]
    fn everything_fits_when_budget_is_large() {
        let history = timed_history(&["un", "deux", "trois"]);
        let result = select_history_under_budget(&history, "question", 10_000);
        assert_eq!(result.selected.len(), 3);
        assert!(!result.truncated);
    }

    #[test]
    fn budget_is_never_exceeded() {
        let history = timed_history(&[
            "un message assez long pour coûter des tokens, vraiment",
            "un autre message tout aussi verbeux que le précédent",
            "court",
            "encore un message qui prend de la place dans le budget",
        ]);
        for budget in [0, 5, 10, 20, 40, 80] {
            let result = select_history_under_budget(&history, "message", budget);
            assert!(estimate_messages_tokens(&result.selected) <= budget);
        }
    }

    #[test]
    fn zero_budget_selects_nothing_and_truncates() {
        let history = timed_history(&["bonjour"]);
        let result = select_history_under_budget(&history, "", 0);
        assert!(result.selected.is_empty());
        assert!(result.truncated);
    }

    #[test]
    fn empty_history_is_not_truncated() {
        let result = select_history_under_budget(&[], "question", 100);
        assert!(result.selected.is_empty());
        assert!(!result.truncated);
    }

    #[test]
    fn output_is_chronological_regardless_of_scores() {
        let history = timed_history(&["premier", "deuxième", "troisième", "quatrième"]);
        let result = select_history_under_budget(&history, "premier", 10_000);

        let times: Vec<_> = result
            .selected
            .iter()
            .map(|m| m.timestamp.unwrap())
            .collect();
        for pair in times.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn untimestamped_messages_go_last_in_original_order() {
        let mut history = timed_history(&["daté un", "daté deux"]);
        history.insert(1, Message::user("sans date A").with_timestamp(None));
        history.push(Message::user("sans date B").with_timestamp(None));

        let result = select_history_under_budget(&history, "", 10_000);
        let contents: Vec<&str> = result.selected.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["daté un", "daté deux", "sans date A", "sans date B"]
        );
    }

    #[test]
    fn recent_messages_win_under_pressure() {
        // Budget for roughly one message: the most recent user turn
        // scores highest and must be the survivor.
        let history = timed_history(&["ancien message", "message du milieu", "dernier message"]);
        let cost = estimate_message_tokens(&history[2]);
        let result = select_history_under_budget(&history, "", cost);
        assert_eq!(result.selected.len(), 1);
        assert_eq!(result.selected[0].content, "dernier message");
        assert!(result.truncated);
    }

    #[test]
    fn query_overlap_boosts_selection() {
        let base = Utc::now() - Duration::hours(2);
        let mut history: Vec<Message> = (0..6)
            .map(|i| {
                Message::user(format!("remplissage numéro {i}"))
                    .with_timestamp(Some(base + Duration::minutes(i)))
            })
            .collect();
        // An old but highly relevant turn.
        history[0].content = "la configuration du serveur postgres".into();

        let budget = estimate_messages_tokens(&history[4..]) + estimate_message_tokens(&history[0]);
        let result = select_history_under_budget(&history, "serveur postgres configuration", budget);
        assert!(
            result
                .selected
                .iter()
                .any(|m| m.content.contains("postgres"))
        );
    }

    #[test]
    fn accented_query_words_boost_accented_content() {
        let base = Utc::now() - Duration::hours(2);
        let mut history: Vec<Message> = (0..6)
            .map(|i| {
                Message::user(format!("remplissage numéro {i}"))
                    .with_timestamp(Some(base + Duration::minutes(i)))
            })
            .collect();
        // Old but relevant; the query and content both carry accents.
        history[0].content = "la météo prévue à Lyon ce week-end".into();

        let budget = estimate_messages_tokens(&history[4..]) + estimate_message_tokens(&history[0]);
        let result = select_history_under_budget(&history, "météo prévue", budget);
        assert!(
            result
                .selected
                .iter()
                .any(|m| m.content.contains("météo"))
        );
    }

    #[test]
    fn tool_messages_rank_below_user_messages() {
        let base = Utc::now();
        let history = vec![
            Message::tool("sortie d'outil un peu ancienne").with_timestamp(Some(base)),
            Message::user("question de l'utilisateur").with_timestamp(Some(base)),
        ];
        // Room for exactly one of the two.
        let cost = estimate_message_tokens(&history[1]);
        let result = select_history_under_budget(&history, "", cost);
        assert_eq!(result.selected.len(), 1);
        assert_eq!(result.selected[0].role, Role::User);
    }

    #[test]
    fn split_needs_truncation_and_more_than_six() {
        let history = timed_history(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let full = select_history_under_budget(&history, "", 10_000);
        assert!(full.split_for_summary().is_none());

        let forced = HistorySelection {
            selected: full.selected.clone(),
            truncated: true,
        };
        let (older, recent) = forced.split_for_summary().unwrap();
        assert_eq!(recent.len(), RECENT_KEEP);
        assert_eq!(older.len(), forced.selected.len() - RECENT_KEEP);
        assert_eq!(recent.last().unwrap().content, "h");
    }

    #[test]
    fn small_truncated_selection_is_not_split() {
        let history = timed_history(&["a", "b", "c", "d", "e"]);
        let selection = HistorySelection {
            selected: history,
            truncated: true,
        };
        assert!(selection.split_for_summary().is_none());
    }
}
