//! The turn engine.
//!
//! One `run_turn` call takes a user utterance from raw text to a
//! resolved answer: assemble context, ask the model to decide, repair
//! the decision, optionally fetch external evidence and rebuild,
//! produce the answer (short-circuit or streamed), commit both sides
//! to memory, and persist the session. Every code path resolves the
//! turn — either a completed answer or an explicit in-conversation
//! error message, never a dangling state.

use std::sync::Arc;

use causerie_config::AppConfig;
use causerie_context::{AssembledContext, ContextAssembler, ContextSlices};
use causerie_core::cancel::CancelToken;
use causerie_core::error::ModelError;
use causerie_core::event::{EventBus, TurnEvent};
use causerie_core::evidence::{EvidenceFetcher, EvidenceSource, SEARCH_FAILED_NOTICE};
use causerie_core::llm::{CompletionRequest, LanguageModel};
use causerie_core::message::Message;
use causerie_decision::{DecisionAction, DecisionResult, normalize_decision};
use causerie_memory::MemoryStore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::Session;

/// What the user sees when a turn fails outright.
const TURN_FAILURE_MESSAGE: &str = "Désolé, je n'ai pas réussi à traiter votre demande. \
     Pouvez-vous réessayer ?";

/// The resolved outcome of one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The answer text appended to the conversation
    pub answer: String,

    /// The normalized decision, absent when the turn failed before one
    pub decision: Option<DecisionResult>,

    /// The context slices, for inspection
    pub slices: Option<ContextSlices>,

    /// Cited external sources, when a search ran
    pub sources: Vec<EvidenceSource>,

    /// Whether the answer is the failure message rather than a real one
    pub failed: bool,
}

/// Orchestrates turns over the capability seams.
pub struct Engine {
    model: Arc<dyn LanguageModel>,
    evidence: Arc<dyn EvidenceFetcher>,
    bus: Arc<EventBus>,
    assembler: ContextAssembler,
    memory: Option<Arc<MemoryStore>>,
    config: AppConfig,
}

impl Engine {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        evidence: Arc<dyn EvidenceFetcher>,
        bus: Arc<EventBus>,
        config: AppConfig,
    ) -> Self {
        let assembler = ContextAssembler::new(model.clone(), &config.context);
        Self {
            model,
            evidence,
            bus,
            assembler,
            memory: None,
            config,
        }
    }

    /// Attach a semantic memory store.
    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Run one full turn. Never returns an error: failures resolve to
    /// an outcome carrying the user-facing failure message.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_text: &str,
        cancel: &CancelToken,
    ) -> TurnOutcome {
        let turn_id = Uuid::new_v4().to_string();
        self.bus.publish(TurnEvent::TurnStarted {
            turn_id: turn_id.clone(),
            question: user_text.to_string(),
            timestamp: chrono::Utc::now(),
        });

        match self.run_turn_inner(&turn_id, session, user_text, cancel).await {
            Ok(outcome) => {
                self.bus.publish(TurnEvent::TurnCompleted {
                    turn_id,
                    answer: outcome.answer.clone(),
                    timestamp: chrono::Utc::now(),
                });
                outcome
            }
            Err(e) => {
                warn!(turn_id = %turn_id, error = %e, "turn failed");
                session.push(Message::user(user_text));
                session.push(Message::assistant(TURN_FAILURE_MESSAGE));
                session.persist().await;
                self.bus.publish(TurnEvent::TurnFailed {
                    turn_id,
                    message: TURN_FAILURE_MESSAGE.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                TurnOutcome {
                    answer: TURN_FAILURE_MESSAGE.to_string(),
                    decision: None,
                    slices: None,
                    sources: Vec::new(),
                    failed: true,
                }
            }
        }
    }

    async fn run_turn_inner(
        &self,
        turn_id: &str,
        session: &mut Session,
        user_text: &str,
        cancel: &CancelToken,
    ) -> Result<TurnOutcome, ModelError> {
        let user_message = Message::user(user_text);

        // 1. Context assembly (infallible, degrades internally).
        let mut assembled = self
            .assembler
            .build(
                user_text,
                session.history(),
                self.memory.as_deref(),
                None,
                cancel,
            )
            .await;
        self.bus.publish(TurnEvent::ContextReady {
            turn_id: turn_id.to_string(),
            slices: serde_json::to_value(&assembled.slices).unwrap_or(serde_json::Value::Null),
        });

        // 2. Planning call and decision repair.
        let planning = self
            .model
            .complete(
                CompletionRequest::new(assembled.planning_messages.clone())
                    .with_temperature(0.2)
                    .with_max_tokens(self.config.context.planning_tokens as u32)
                    .with_cancel(cancel.clone()),
            )
            .await?;
        let decision = normalize_decision(&planning.content);
        for warning in &decision.warnings {
            debug!(turn_id, warning, "decision repaired");
        }
        self.bus.publish(TurnEvent::DecisionReady {
            turn_id: turn_id.to_string(),
            decision: serde_json::to_value(&decision).unwrap_or(serde_json::Value::Null),
        });

        // 3. Optional evidence fetch, then a full context rebuild.
        let mut sources = Vec::new();
        if decision.action == DecisionAction::Search {
            if self.config.search.enabled {
                // A search decision without a query (possible after the
                // respond-to-search flip) searches the utterance itself.
                let query = decision
                    .query
                    .clone()
                    .unwrap_or_else(|| user_text.to_string());
                self.bus.publish(TurnEvent::SearchStarted {
                    turn_id: turn_id.to_string(),
                    query: query.clone(),
                });
                let bundle = self.evidence.fetch(&query, cancel).await;
                let degraded = bundle.content == SEARCH_FAILED_NOTICE;
                self.bus.publish(TurnEvent::SearchCompleted {
                    turn_id: turn_id.to_string(),
                    source_count: bundle.sources.len(),
                    degraded,
                });
                sources = bundle.sources.clone();
                assembled = self.assembler.rebuild_with_evidence(&assembled, &bundle);
            } else {
                debug!(turn_id, "search requested but disabled, answering without evidence");
            }
        }

        // 4. The answer: short-circuit on ready text, else stream.
        let answer = match &decision.response {
            Some(text) if decision.action == DecisionAction::Respond => {
                self.bus.publish(TurnEvent::AnswerFragment {
                    turn_id: turn_id.to_string(),
                    content: text.clone(),
                });
                text.clone()
            }
            _ => self.stream_answer(turn_id, &assembled, cancel).await?,
        };

        // 5. Commit to memory and persist the session.
        let assistant_message = Message::assistant(&answer);
        if let Some(memory) = self.memory.as_ref().filter(|m| m.is_enabled()) {
            memory.add(&user_message).await;
            memory.add(&assistant_message).await;
        }
        session.push(user_message);
        session.push(assistant_message);
        session.persist().await;

        info!(turn_id, action = decision.action.as_str(), chars = answer.len(), "turn resolved");
        Ok(TurnOutcome {
            answer,
            decision: Some(decision),
            slices: Some(assembled.slices),
            sources,
            failed: false,
        })
    }

    /// Stream the answer, forwarding fragments on the bus.
    ///
    /// An interruption after some content has arrived keeps the partial
    /// answer; an interruption before any content is a turn failure.
    async fn stream_answer(
        &self,
        turn_id: &str,
        assembled: &AssembledContext,
        cancel: &CancelToken,
    ) -> Result<String, ModelError> {
        let mut request = CompletionRequest::new(assembled.answer_messages.clone())
            .with_temperature(self.config.model.temperature)
            .with_max_tokens(self.config.model.max_tokens)
            .with_cancel(cancel.clone());
        request.stream = true;

        let mut rx = self.model.stream(request).await?;
        let mut answer = String::new();

        while let Some(chunk) = rx.recv().await {
            match chunk {
                Ok(chunk) => {
                    if let Some(content) = chunk.content {
                        if !content.is_empty() {
                            answer.push_str(&content);
                            self.bus.publish(TurnEvent::AnswerFragment {
                                turn_id: turn_id.to_string(),
                                content,
                            });
                        }
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(e) if answer.is_empty() => return Err(e),
                Err(e) => {
                    warn!(turn_id, error = %e, "stream interrupted, keeping partial answer");
                    break;
                }
            }
        }

        if answer.is_empty() {
            return Err(ModelError::StreamInterrupted(
                "stream ended without content".into(),
            ));
        }
        Ok(answer)
    }
}
