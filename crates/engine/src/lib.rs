//! Turn orchestration for causerie.
//!
//! The engine wires the capability seams together — language model,
//! evidence fetcher, memory store, key-value persistence, event bus —
//! and drives each turn from utterance to resolved answer. Consumers
//! observe progress by subscribing to the event bus.

pub mod engine;
pub mod session;

pub use engine::{Engine, TurnOutcome};
pub use session::Session;
