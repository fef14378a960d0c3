//! Memory retrieval and reranking.
//!
//! Several query variants fan out to the store concurrently; the
//! flattened hits are deduplicated by entry, re-sorted by score, and
//! lexically diversified so the digest does not repeat itself.

use causerie_core::cancel::CancelToken;
use causerie_core::llm::{CompletionRequest, LanguageModel};
use causerie_core::message::{Message, Role};
use causerie_core::text::content_words;
use causerie_memory::{MemoryStore, ScoredMemoryEntry};
use futures::future::join_all;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::profile::{Intent, RequestProfile};

/// Upper bound on distinct query variants per retrieval.
const MAX_QUERIES: usize = 5;

/// Hits requested from the store per query.
const HITS_PER_QUERY: usize = 8;

/// Final number of entries kept after diversification.
const MAX_RESULTS: usize = 8;

/// Two entries with token-set Jaccard overlap above this are
/// considered near-duplicates.
const OVERLAP_THRESHOLD: f64 = 0.72;

/// Build up to five deduplicated query strings for one retrieval.
///
/// Always starts with the trimmed utterance; the other variants widen
/// recall along the axes the profiler detected.
pub fn build_memory_queries(
    user_text: &str,
    profile: &RequestProfile,
    recent_history: &[Message],
) -> Vec<String> {
    let trimmed = user_text.trim();
    let mut queries: Vec<String> = Vec::new();
    let mut push = |q: String| {
        let q = q.trim().to_string();
        if !q.is_empty() && !queries.contains(&q) && queries.len() < MAX_QUERIES {
            queries.push(q);
        }
    };

    push(trimmed.to_string());

    if !profile.contextual_anchors.is_empty() {
        push(profile.contextual_anchors.join(" "));
    }

    if profile.follow_up_detected {
        if let Some(previous) = recent_history
            .iter()
            .rev()
            .find(|m| m.role == Role::User && m.content.trim() != trimmed)
        {
            push(format!("{} {}", previous.content.trim(), trimmed));
        }
    }

    match profile.intent {
        Intent::Code => push(format!("{trimmed} code exemple implémentation")),
        Intent::Analysis => push(format!("{trimmed} comparaison analyse critères")),
        Intent::Information => {}
    }

    queries
}

/// Dedup key: entry id, or a content prefix when the id is absent.
fn dedup_key(entry: &ScoredMemoryEntry) -> String {
    if !entry.entry.id.is_empty() {
        return entry.entry.id.clone();
    }
    entry.entry.content.chars().take(40).collect()
}

fn token_set(text: &str) -> BTreeSet<String> {
    content_words(text, 3).into_iter().collect()
}

/// Jaccard overlap between the 3+ character token sets of two texts.
fn lexical_overlap(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// Deduplicate by entry, sort by score descending, and diversify.
///
/// Idempotent: running it on its own output changes nothing — the
/// survivors are already unique and pairwise below the overlap
/// threshold.
pub fn dedup_and_diversify(hits: Vec<ScoredMemoryEntry>) -> Vec<ScoredMemoryEntry> {
    // Highest score wins per key, first-seen position kept for stability.
    let mut unique: Vec<(String, ScoredMemoryEntry)> = Vec::new();
    for hit in hits {
        let key = dedup_key(&hit);
        match unique.iter_mut().find(|(k, _)| *k == key) {
            Some((_, kept)) if hit.score > kept.score => *kept = hit,
            Some(_) => {}
            None => unique.push((key, hit)),
        }
    }

    let mut sorted: Vec<ScoredMemoryEntry> = unique.into_iter().map(|(_, hit)| hit).collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut accepted: Vec<ScoredMemoryEntry> = Vec::new();
    for candidate in sorted {
        if accepted.len() >= MAX_RESULTS {
            break;
        }
        let near_duplicate = accepted.iter().any(|kept| {
            lexical_overlap(&kept.entry.content, &candidate.entry.content) > OVERLAP_THRESHOLD
        });
        if !near_duplicate {
            accepted.push(candidate);
        }
    }
    accepted
}

/// The retrieval outcome: reranked hits plus the query count that
/// produced them.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecall {
    pub hits: Vec<ScoredMemoryEntry>,
    pub query_count: usize,
}

/// Fan the queries out to the store concurrently and rerank the union.
pub async fn retrieve_memories(
    store: &MemoryStore,
    user_text: &str,
    profile: &RequestProfile,
    recent_history: &[Message],
) -> MemoryRecall {
    let queries = build_memory_queries(user_text, profile, recent_history);
    if queries.is_empty() {
        return MemoryRecall::default();
    }

    let searches = queries.iter().map(|q| store.search(q, HITS_PER_QUERY));
    let flattened: Vec<ScoredMemoryEntry> =
        join_all(searches).await.into_iter().flatten().collect();

    debug!(
        queries = queries.len(),
        raw_hits = flattened.len(),
        "memory fan-out complete"
    );

    MemoryRecall {
        hits: dedup_and_diversify(flattened),
        query_count: queries.len(),
    }
}

/// Summarize the accepted entries into a compact bullet digest.
///
/// Degrades to `None` on any model failure — a missing summary is a
/// normal outcome, never an error.
pub async fn summarize_memories(
    model: &dyn LanguageModel,
    hits: &[ScoredMemoryEntry],
    cancel: &CancelToken,
) -> Option<String> {
    if hits.is_empty() {
        return None;
    }

    let lines = MemoryStore::format_summaries(hits);
    let prompt = format!(
        "Condense ces souvenirs de conversation en 2 à 4 puces brèves, \
         sans commentaire autour :\n{lines}"
    );
    let request = CompletionRequest::new(vec![Message::user(prompt)])
        .with_temperature(0.3)
        .with_max_tokens(220)
        .with_cancel(cancel.clone());

    match model.complete(request).await {
        Ok(response) if !response.content.trim().is_empty() => {
            Some(response.content.trim().to_string())
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "memory summarization failed, continuing without");
            None
        }
    }
}
