//! Schema coercion, plan shaping, and contradiction repair.
//!
//! The model's decision text is never trusted: every field is coerced
//! tolerantly, contradictions between the action and its companion
//! fields are resolved by fixed rules, and total parse failure drops
//! to regex extraction. Every repair leaves a warning; no input, no
//! matter how mangled, makes this module return an error.

use regex_lite::Regex;
use serde_json::Value;
use tracing::debug;

use crate::extract::extract_json_object;
use crate::model::{DecisionAction, DecisionResult, RawDecision};

const MIN_PLAN_STEPS: usize = 3;
const MAX_PLAN_STEPS: usize = 6;

/// Generic steps used to pad a short or missing plan.
const DEFAULT_PLAN_STEPS: [&str; 3] = [
    "Analyser la question posée",
    "Rassembler les éléments de contexte pertinents",
    "Formuler une réponse claire et structurée",
];

const DEFAULT_RATIONALE: &str = "Aucune justification fournie par le modèle.";

/// Turn raw model output into a usable [`DecisionResult`].
///
/// Never fails: unparsable input degrades to a respond decision with
/// the warnings explaining what was repaired or guessed.
pub fn normalize_decision(raw_text: &str) -> DecisionResult {
    let mut warnings: Vec<String> = Vec::new();

    let raw = match extract_json_object(raw_text) {
        Some(json) => match serde_json::from_str::<RawDecision>(&json) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(error = %e, "decision JSON rejected by serde");
                None
            }
        },
        None => None,
    };

    match raw {
        Some(raw) => normalize_raw(raw, &mut warnings),
        None => fallback_from_text(raw_text, &mut warnings),
    }
}

fn normalize_raw(raw: RawDecision, warnings: &mut Vec<String>) -> DecisionResult {
    let action = match raw.action.as_ref().and_then(value_to_string) {
        Some(s) if s.eq_ignore_ascii_case("search") => DecisionAction::Search,
        Some(s) if s.eq_ignore_ascii_case("respond") => DecisionAction::Respond,
        Some(other) => {
            warnings.push(format!(
                "Action inconnue « {other} », repli sur une réponse directe."
            ));
            DecisionAction::Respond
        }
        None => {
            warnings.push("Action absente de la décision, réponse directe par défaut.".into());
            DecisionAction::Respond
        }
    };

    let mut query = raw.query.as_ref().and_then(value_to_string);
    let mut response = raw.response.as_ref().and_then(value_to_string);
    let rationale = match raw.rationale.as_ref().and_then(value_to_string) {
        Some(r) => r,
        None => {
            warnings.push("Justification manquante, valeur par défaut utilisée.".into());
            DEFAULT_RATIONALE.to_string()
        }
    };
    let plan = normalize_plan(raw.plan.as_ref(), warnings);

    // Contradiction repair. Each rule fires at most once and the
    // flipped action is not re-examined, so a search without query
    // ends up as a respond without response rather than oscillating.
    let action = match action {
        DecisionAction::Search if query.is_none() => {
            warnings.push(
                "Action « search » sans requête : bascule vers une réponse directe.".into(),
            );
            DecisionAction::Respond
        }
        DecisionAction::Respond if response.is_none() => {
            warnings.push(
                "Action « respond » sans texte de réponse : bascule vers une recherche.".into(),
            );
            DecisionAction::Search
        }
        other => other,
    };

    match action {
        DecisionAction::Respond => {
            if query.take().is_some() {
                warnings
                    .push("Requête superflue pour une réponse directe, ignorée.".into());
            }
        }
        DecisionAction::Search => {
            if response.take().is_some() {
                warnings.push(
                    "Texte de réponse fourni avec une recherche, il sera ignoré.".into(),
                );
            }
        }
    }

    DecisionResult {
        action,
        query,
        plan,
        rationale,
        response,
        warnings: std::mem::take(warnings),
    }
}

/// Coerce a JSON value to a non-empty string. Numbers and booleans are
/// rendered; arrays, objects, and null are dropped.
fn value_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

/// Shape the plan into 3 to 6 numbered steps.
fn normalize_plan(raw: Option<&Value>, warnings: &mut Vec<String>) -> String {
    let mut steps: Vec<String> = match raw {
        // An array of steps is accepted as-is.
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(value_to_string)
            .collect(),
        Some(value) => value_to_string(value)
            .map(|text| split_plan_steps(&text))
            .unwrap_or_default(),
        None => Vec::new(),
    };

    if steps.is_empty() {
        warnings.push("Plan manquant, plan générique utilisé.".into());
    } else if steps.len() < MIN_PLAN_STEPS {
        warnings.push(format!(
            "Plan incomplet, complété à {MIN_PLAN_STEPS} étapes."
        ));
    } else if steps.len() > MAX_PLAN_STEPS {
        warnings.push(format!(
            "Plan trop long ({} étapes), tronqué à {MAX_PLAN_STEPS}.",
            steps.len()
        ));
    }

    for default in DEFAULT_PLAN_STEPS {
        if steps.len() >= MIN_PLAN_STEPS {
            break;
        }
        if !steps.iter().any(|s| s == default) {
            steps.push(default.to_string());
        }
    }
    steps.truncate(MAX_PLAN_STEPS);

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a free-form plan string into steps: semicolons and newlines
/// are separators, and leading numbering ("1.", "2)", "-") is shed.
fn split_plan_steps(text: &str) -> Vec<String> {
    text.split(|c| c == ';' || c == '\n')
        .map(|part| {
            part.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')', '-'])
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Best-effort extraction when no JSON object could be parsed at all.
fn fallback_from_text(text: &str, warnings: &mut Vec<String>) -> DecisionResult {
    warnings.push(
        "Décision illisible (JSON invalide), extraction heuristique appliquée.".into(),
    );

    let lowered = text.to_lowercase();
    let wants_search =
        lowered.contains("search") || lowered.contains("recherche") || lowered.contains("chercher");

    let query = capture_field(text, "query");
    if query.is_some() {
        warnings.push("Requête retrouvée par heuristique dans le texte brut.".into());
    }
    let response = capture_field(text, "response");
    if response.is_some() {
        warnings.push("Réponse retrouvée par heuristique dans le texte brut.".into());
    }

    let action = if wants_search && query.is_some() {
        DecisionAction::Search
    } else {
        DecisionAction::Respond
    };

    let plan = normalize_plan(None, warnings);
    DecisionResult {
        query: if action == DecisionAction::Search { query } else { None },
        response: if action == DecisionAction::Respond {
            // With no recoverable response the engine will run the
            // answer call itself.
            response
        } else {
            None
        },
        action,
        plan,
        rationale: DEFAULT_RATIONALE.to_string(),
        warnings: std::mem::take(warnings),
    }
}

/// Capture `field: value` or `"field": "value"` from free text.
fn capture_field(text: &str, field: &str) -> Option<String> {
    let pattern = format!(r#"(?i)"?{field}"?\s*[:=]\s*"?([^"\n}}]+)"?"#);
    let re = Regex::new(&pattern).ok()?;
    let captured = re.captures(text)?.get(1)?.as_str().trim();
    let cleaned = captured.trim_end_matches(',').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
