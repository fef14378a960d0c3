//! Decision normalization for causerie.
//!
//! A turn starts with the model being asked to decide — search the web
//! or respond directly — in JSON. Model output being what it is, this
//! crate locates the JSON in the surrounding prose, coerces it
//! tolerantly, repairs contradictions with deterministic rules, and
//! falls back to regex extraction when no JSON survives. The result is
//! always usable; the damage report travels in `warnings`.

pub mod extract;
pub mod model;
pub mod normalize;

pub use extract::extract_json_object;
pub use model::{DecisionAction, DecisionResult, RawDecision};
pub use normalize::normalize_decision;
