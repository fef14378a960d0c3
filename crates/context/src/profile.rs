//! Request profiling — lexical heuristics over the utterance.
//!
//! A pure function: text in, profile out. No state, no I/O. The
//! assistant is French-first, so every pattern list carries the French
//! forms alongside the English ones.

use causerie_core::message::Message;
use causerie_core::text::{content_words, normalize};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Default number of contextual anchor keywords extracted.
pub const DEFAULT_ANCHOR_COUNT: usize = 6;

/// How many trailing history turns feed anchor extraction.
const ANCHOR_HISTORY_TURNS: usize = 4;

/// Broad classification of what the user wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// A factual or general question (the default)
    Information,
    /// Programming-related request
    Code,
    /// Comparison or analysis request
    Analysis,
}

/// The lexical profile of one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestProfile {
    /// What kind of answer the user is after
    pub intent: Intent,

    /// Whether the utterance calls for up-to-date external information
    pub requires_fresh_data: bool,

    /// Detected ambiguity markers, in detection order
    pub ambiguity_signals: Vec<String>,

    /// Most frequent content words across the utterance and recent
    /// history, frequency descending, first-seen order on ties
    pub contextual_anchors: Vec<String>,

    /// Whether the utterance references an earlier exchange
    pub follow_up_detected: bool,
}

const FRESHNESS_PATTERNS: &[&str] = &[
    r"\b(aujourd ?hui|maintenant|en ce moment|actuellement|ce matin|ce soir)\b",
    r"\b(today|right now|currently|at the moment)\b",
    r"\b20(2[4-9]|3[0-9])\b",
    r"\b(derni(er|ere)s? (stats|statistiques|chiffres|donnees|nouvelles|infos))\b",
    r"\b(latest (stats|news|figures|data))\b",
    r"\b(recent(es?)?|recemment)\b",
];

const FOLLOW_UP_PATTERNS: &[&str] = &[
    r"\b(comme (avant|la derniere fois|tout a l heure|precedemment))\b",
    r"\b(encore une fois|a nouveau|de nouveau|la meme chose)\b",
    r"\b(like (before|last time)|(once )?again|same as before)\b",
];

const CODE_PATTERNS: &[&str] = &[
    r"\b(code|coder|fonction|function|script|programme|program|compile[rs]?)\b",
    r"\b(bug|erreur|error|debug|stacktrace|exception)\b",
    r"\b(api|rust|python|javascript|typescript|sql|regex)\b",
];

const ANALYSIS_PATTERNS: &[&str] = &[
    r"\b(compar(e|er|aison)|analys(e|er|is)|difference|versus|vs)\b",
    r"\b(avantages|inconvenients|pour et contre|pros and cons)\b",
];

const DEMONSTRATIVE_PATTERN: &str =
    r"\b(ca|cela|celui(-ci|-la)?|celle(-ci|-la)?|ceux|celles|this|that one|it)\b";

/// Stop words excluded from anchor extraction (already diacritic-folded).
const STOP_WORDS: &[&str] = &[
    "alors", "apres", "aussi", "autre", "avant", "avec", "bien", "cela", "celle", "celui",
    "cette", "ceux", "chez", "comme", "comment", "dans", "donc", "elle", "elles", "encore",
    "entre", "etre", "faire", "fait", "faut", "leur", "leurs", "mais", "meme", "moins",
    "nous", "peut", "plus", "pour", "quand", "quel", "quelle", "quels", "quoi", "sans",
    "sont", "sous", "suis", "tout", "toute", "toutes", "tous", "tres", "vous", "about",
    "after", "also", "because", "been", "before", "being", "between", "could", "does",
    "from", "have", "into", "just", "like", "more", "most", "only", "other", "over",
    "peux", "same", "should", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "very", "void", "were", "what", "when", "which",
    "while", "will", "with", "would", "your",
];

fn matches_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| {
        Regex::new(p)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    })
}

/// Fold text the way the pattern lists expect: lowercased, diacritics
/// stripped, apostrophes opened into spaces so `aujourd'hui` matches.
fn fold(text: &str) -> String {
    normalize(text).replace(['\'', '’'], " ")
}

/// Build the lexical profile of `text`, given the recent history.
pub fn build_request_profile(
    text: &str,
    recent_history: &[Message],
    anchor_count: usize,
) -> RequestProfile {
    let folded = fold(text);
    let history_tail: Vec<&Message> = recent_history
        .iter()
        .rev()
        .take(ANCHOR_HISTORY_TURNS)
        .collect();
    let history_text: String = history_tail
        .iter()
        .rev()
        .map(|m| fold(&m.content))
        .collect::<Vec<_>>()
        .join(" ");

    let requires_fresh_data = matches_any(&folded, FRESHNESS_PATTERNS)
        || matches_any(&history_text, FRESHNESS_PATTERNS);
    let follow_up_detected = matches_any(&folded, FOLLOW_UP_PATTERNS);

    let intent = if matches_any(&folded, CODE_PATTERNS) {
        Intent::Code
    } else if matches_any(&folded, ANALYSIS_PATTERNS) {
        Intent::Analysis
    } else {
        Intent::Information
    };

    let mut ambiguity_signals = Vec::new();
    if !recent_history.is_empty()
        && Regex::new(DEMONSTRATIVE_PATTERN)
            .map(|re| re.is_match(&folded))
            .unwrap_or(false)
    {
        ambiguity_signals.push("référence démonstrative à un échange précédent".to_string());
    }
    if follow_up_detected {
        ambiguity_signals.push("marqueur de suite de conversation".to_string());
    }

    let contextual_anchors = extract_anchors(text, &history_tail, anchor_count);

    RequestProfile {
        intent,
        requires_fresh_data,
        ambiguity_signals,
        contextual_anchors,
        follow_up_detected,
    }
}

/// Top-`count` most frequent content words (length ≥ 4, normalized,
/// stop words removed) over the utterance plus the given history turns.
/// Frequency descending, ties broken by first-seen order.
fn extract_anchors(text: &str, history: &[&Message], count: usize) -> Vec<String> {
    let mut combined = String::from(text);
    for message in history.iter().rev() {
        combined.push(' ');
        combined.push_str(&message.content);
    }

    // (word, frequency, first-seen rank) preserving insertion order
    let mut ranked: Vec<(String, usize)> = Vec::new();
    for word in content_words(&combined, 4) {
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        match ranked.iter_mut().find(|(w, _)| *w == word) {
            Some((_, freq)) => *freq += 1,
            None => ranked.push((word, 1)),
        }
    }

    let mut indexed: Vec<(usize, String, usize)> = ranked
        .into_iter()
        .enumerate()
        .map(|(seen, (word, freq))| (seen, word, freq))
        .collect();
    indexed.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    indexed.into_iter().take(count).map(|(_, word, _)| word).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(turns: &[&str]) -> Vec<Message> {
        turns.iter().map(|t| Message::user(*t)).collect()
    }

    #[test]
    fn fresh_data_from_explicit_now() {
        let profile = build_request_profile("quelle est la météo maintenant ?", &[], 6);
        assert!(profile.requires_fresh_data);
    }

    #[test]
    fn fresh_data_from_recent_year() {
        let profile = build_request_profile("les élections de 2026", &[], 6);
        assert!(profile.requires_fresh_data);
    }

    #[test]
    fn fresh_data_from_history() {
        let hist = history(&["donne-moi les dernières stats du championnat"]);
        let profile = build_request_profile("et pour Lyon ?", &hist, 6);
        assert!(profile.requires_fresh_data);
    }

    #[test]
    fn no_fresh_data_for_timeless_question() {
        let profile = build_request_profile("qui a écrit Les Misérables ?", &[], 6);
        assert!(!profile.requires_fresh_data);
    }

    #[test]
    fn follow_up_detection() {
        let profile = build_request_profile("refais comme avant mais en plus court", &[], 6);
        assert!(profile.follow_up_detected);
        assert!(
            profile
                .ambiguity_signals
                .iter()
                .any(|s| s.contains("suite de conversation"))
        );
    }

    #[test]
    fn code_intent_wins_over_analysis() {
        let profile = build_request_profile("compare ces deux fonctions Python", &[], 6);
        assert_eq!(profile.intent, Intent::Code);
    }

    #[test]
    fn analysis_intent() {
        let profile = build_request_profile("avantages et inconvénients du télétravail", &[], 6);
        assert_eq!(profile.intent, Intent::Analysis);
    }

    #[test]
    fn information_is_the_default_intent() {
        let profile = build_request_profile("quelle est la capitale de l'Australie ?", &[], 6);
        assert_eq!(profile.intent, Intent::Information);
    }

    #[test]
    fn demonstrative_needs_history() {
        let without = build_request_profile("explique-moi cela", &[], 6);
        assert!(without.ambiguity_signals.is_empty());

        let hist = history(&["parle-moi du théorème de Pythagore"]);
        let with = build_request_profile("explique-moi cela", &hist, 6);
        assert_eq!(with.ambiguity_signals.len(), 1);
    }

    #[test]
    fn anchors_ranked_by_frequency_then_first_seen() {
        let profile = build_request_profile(
            "le climat change, le climat se réchauffe, océans et climat",
            &[],
            6,
        );
        assert_eq!(profile.contextual_anchors[0], "climat");
        // réchauffe and océans both appear once; réchauffe was seen first
        let rechauffe = profile.contextual_anchors.iter().position(|a| a == "rechauffe");
        let oceans = profile.contextual_anchors.iter().position(|a| a == "oceans");
        assert!(rechauffe.unwrap() < oceans.unwrap());
    }

    #[test]
    fn anchors_include_recent_history_words() {
        let hist = history(&["parlons du réacteur nucléaire de Flamanville"]);
        let profile = build_request_profile("quelle est sa puissance ?", &hist, 6);
        assert!(profile.contextual_anchors.iter().any(|a| a == "reacteur"));
    }

    #[test]
    fn anchors_respect_the_requested_count() {
        let profile = build_request_profile(
            "voitures trains avions bateaux fusées trottinettes vélos motos",
            &[],
            3,
        );
        assert_eq!(profile.contextual_anchors.len(), 3);
    }

    #[test]
    fn stop_words_are_not_anchors() {
        let profile = build_request_profile("comment faire pour avoir plus de temps ?", &[], 6);
        assert!(!profile.contextual_anchors.iter().any(|a| a == "comment"));
        assert!(!profile.contextual_anchors.iter().any(|a| a == "pour"));
    }

    #[test]
    fn empty_input_yields_neutral_profile() {
        let profile = build_request_profile("", &[], 6);
        assert_eq!(profile.intent, Intent::Information);
        assert!(!profile.requires_fresh_data);
        assert!(!profile.follow_up_detected);
        assert!(profile.contextual_anchors.is_empty());
        assert!(profile.ambiguity_signals.is_empty());
    }
}
