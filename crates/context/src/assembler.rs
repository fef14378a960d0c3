//! Context assembly — turns slices into the two prompt pairs.
//!
//! History selection and memory retrieval are independent, so they run
//! concurrently. The message pairs are a pure rendering of the slices
//! plus the bare question: when external evidence arrives after the
//! decision, both pairs are regenerated from the same slices with only
//! the evidence block replaced, never patched in place.

use std::sync::Arc;

use causerie_config::ContextConfig;
use causerie_core::cancel::CancelToken;
use causerie_core::evidence::EvidenceBundle;
use causerie_core::llm::{CompletionRequest, LanguageModel};
use causerie_core::message::{Message, Role};
use causerie_core::token::estimate_messages_tokens;
use causerie_memory::MemoryStore;
use tracing::{debug, warn};

use crate::budget::ContextBudget;
use crate::history::{HistorySelection, RECENT_KEEP, select_history_under_budget};
use crate::profile::build_request_profile;
use crate::recall::{MemoryRecall, retrieve_memories, summarize_memories};
use crate::slices::{ContextSlices, SliceCounters};

/// The built-in persona, used when configuration supplies none.
pub const DEFAULT_PERSONA: &str = "Tu es Causerie, un assistant conversationnel local. \
     Tu réponds en français, avec précision et concision. Tu t'appuies d'abord sur le \
     contexte fourni, tu distingues ce que tu sais de ce que tu supposes, et tu admets \
     sans détour ce que tu ignores.";

/// Instruction appended to the planning prompt.
const PLANNING_INSTRUCTION: &str = "Décide de la marche à suivre. Réponds UNIQUEMENT avec un \
     objet JSON de la forme :\n\
     {\"action\": \"search\" ou \"respond\", \"query\": \"requête web si action=search\", \
     \"plan\": \"étapes séparées par des points-virgules\", \"rationale\": \"justification \
     brève\", \"response\": \"réponse complète si action=respond\"}";

/// Instruction appended to the answer prompt.
const ANSWER_INSTRUCTION: &str = "Réponds à la question en t'appuyant sur le contexte \
     ci-dessus. Sois précis et structuré, cite les informations externes quand tu les \
     utilises, et signale explicitement ce que tu n'as pas pu vérifier.";

/// One turn's fully assembled context.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// The bare user question
    pub question: String,

    /// The building blocks everything below was rendered from
    pub slices: ContextSlices,

    /// System + user pair asking for a structured decision
    pub planning_messages: Vec<Message>,

    /// System + user pair asking for the final answer
    pub answer_messages: Vec<Message>,
}

/// The context assembler. Stateless between turns; create once, reuse.
pub struct ContextAssembler {
    model: Arc<dyn LanguageModel>,
    budget: ContextBudget,
    persona: Option<String>,
    anchor_count: usize,
}

impl ContextAssembler {
    pub fn new(model: Arc<dyn LanguageModel>, config: &ContextConfig) -> Self {
        Self {
            model,
            budget: ContextBudget::from_config(config),
            persona: config.persona.clone(),
            anchor_count: config.anchor_count,
        }
    }

    /// Override the resolved budget (tests, per-turn tuning).
    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Assemble the slices and both message pairs for one turn.
    ///
    /// The history and memory branches share no state and run
    /// concurrently; their results are combined only after both
    /// complete.
    pub async fn build(
        &self,
        user_text: &str,
        history: &[Message],
        memory: Option<&MemoryStore>,
        evidence: Option<&EvidenceBundle>,
        cancel: &CancelToken,
    ) -> AssembledContext {
        let question = user_text.trim().to_string();
        let profile = build_request_profile(&question, history, self.anchor_count);
        let system_prompt = self.render_system_prompt(&profile);

        let history_branch = async {
            let selection = select_history_under_budget(history, &question, self.budget.history_tokens());
            let summary = match selection.split_for_summary() {
                Some((older, _)) => self.summarize_history(older, cancel).await,
                None => None,
            };
            (selection, summary)
        };

        let memory_branch = async {
            match memory.filter(|store| store.is_enabled()) {
                Some(store) => {
                    let recall = retrieve_memories(store, &question, &profile, history).await;
                    let summary =
                        summarize_memories(self.model.as_ref(), &recall.hits, cancel).await;
                    (recall, summary)
                }
                None => (MemoryRecall::default(), None),
            }
        };

        let ((selection, history_summary), (recall, memory_summary)) =
            tokio::join!(history_branch, memory_branch);

        let slices = ContextSlices {
            system_prompt,
            profile,
            counters: SliceCounters {
                history_considered: history.len(),
                history_selected: selection.selected.len(),
                history_truncated: selection.truncated,
                memory_queries: recall.query_count,
                memory_hits: recall.hits.len(),
                ..SliceCounters::default()
            },
            selected_history: selection.selected,
            history_summary,
            memory_summary,
            memory_hits: recall.hits,
            external_context: evidence.map(render_evidence),
        };

        self.render(question, slices)
    }

    /// Rebuild both message pairs with fresh evidence.
    ///
    /// Reuses the already-computed history and memory slices; only the
    /// external block changes, and both pairs are regenerated so they
    /// stay consistent with each other.
    pub fn rebuild_with_evidence(
        &self,
        previous: &AssembledContext,
        evidence: &EvidenceBundle,
    ) -> AssembledContext {
        let mut slices = previous.slices.clone();
        slices.external_context = Some(render_evidence(evidence));
        self.render(previous.question.clone(), slices)
    }

    fn render(&self, question: String, mut slices: ContextSlices) -> AssembledContext {
        let planning_messages = vec![
            Message::system(&slices.system_prompt),
            Message::user(render_planning_prompt(&slices, &question)),
        ];
        let answer_messages = vec![
            Message::system(&slices.system_prompt),
            Message::user(render_answer_prompt(&slices, &question)),
        ];

        slices.counters.planning_prompt_tokens = estimate_messages_tokens(&planning_messages);
        slices.counters.answer_prompt_tokens = estimate_messages_tokens(&answer_messages);
        debug!(
            planning_tokens = slices.counters.planning_prompt_tokens,
            answer_tokens = slices.counters.answer_prompt_tokens,
            total_budget = self.budget.total_tokens,
            "context rendered"
        );

        AssembledContext {
            question,
            slices,
            planning_messages,
            answer_messages,
        }
    }

    fn render_system_prompt(&self, profile: &crate::profile::RequestProfile) -> String {
        let persona = self.persona.as_deref().unwrap_or(DEFAULT_PERSONA);
        let mut hints: Vec<String> = Vec::new();
        if profile.requires_fresh_data {
            hints.push("La question porte sur des informations récentes.".into());
        }
        if !profile.contextual_anchors.is_empty() {
            hints.push(format!(
                "Mots-clés du fil de discussion : {}.",
                profile.contextual_anchors.join(", ")
            ));
        }
        for signal in &profile.ambiguity_signals {
            hints.push(format!("Signal d'ambiguïté : {signal}."));
        }

        if hints.is_empty() {
            persona.to_string()
        } else {
            format!("{persona}\n\nIndices contextuels :\n{}", bulleted(&hints))
        }
    }

    /// Summarize the older accepted turns into a bullet digest.
    /// Failure degrades to no summary, never an error.
    async fn summarize_history(&self, older: &[Message], cancel: &CancelToken) -> Option<String> {
        let prompt = format!(
            "Résume ces échanges en 3 à 5 puces factuelles, sans commentaire autour :\n{}",
            render_turns(older)
        );
        let request = CompletionRequest::new(vec![Message::user(prompt)])
            .with_temperature(0.3)
            .with_max_tokens(250)
            .with_cancel(cancel.clone());

        match self.model.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                Some(response.content.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "history summarization failed, continuing without");
                None
            }
        }
    }
}

fn bulleted(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| format!("- {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_turns(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Utilisateur",
                Role::Assistant => "Assistant",
                Role::System => "Système",
                Role::Tool => "Outil",
            };
            format!("{speaker} : {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_evidence(evidence: &EvidenceBundle) -> String {
    let mut block = evidence.content.clone();
    if !evidence.sources.is_empty() {
        block.push_str("\nSources :");
        for source in &evidence.sources {
            block.push_str(&format!("\n- {} ({})", source.title, source.url));
        }
    }
    block
}

fn memory_block(slices: &ContextSlices) -> Option<String> {
    if slices.memory_hits.is_empty() {
        return None;
    }
    let lines = MemoryStore::format_summaries(&slices.memory_hits);
    Some(match &slices.memory_summary {
        Some(summary) => format!("{summary}\n{lines}"),
        None => lines,
    })
}

/// The compact prompt asking for a plan+action decision.
fn render_planning_prompt(slices: &ContextSlices, question: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(summary) = &slices.history_summary {
        blocks.push(format!("[Résumé de la conversation]\n{summary}"));
    }

    let recent_start = slices.selected_history.len().saturating_sub(RECENT_KEEP);
    let recent = &slices.selected_history[recent_start..];
    if !recent.is_empty() {
        blocks.push(format!("[Derniers échanges]\n{}", render_turns(recent)));
    }

    if let Some(memory) = memory_block(slices) {
        blocks.push(format!("[Mémoire pertinente]\n{memory}"));
    }

    if let Some(external) = &slices.external_context {
        blocks.push(format!("[Informations externes]\n{external}"));
    }

    blocks.push(format!("[Question]\n{question}"));
    blocks.push(PLANNING_INSTRUCTION.to_string());
    blocks.join("\n\n")
}

/// The full prompt asking for the final answer.
fn render_answer_prompt(slices: &ContextSlices, question: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(summary) = &slices.history_summary {
        blocks.push(format!("[Résumé de la conversation]\n{summary}"));
    }

    if !slices.selected_history.is_empty() {
        blocks.push(format!(
            "[Conversation]\n{}",
            render_turns(&slices.selected_history)
        ));
    }

    if let Some(memory) = memory_block(slices) {
        blocks.push(format!("[Mémoire pertinente]\n{memory}"));
    }

    if let Some(external) = &slices.external_context {
        blocks.push(format!("[Informations externes]\n{external}"));
    }

    blocks.push(format!("[Question]\n{question}"));
    blocks.push(ANSWER_INSTRUCTION.to_string());
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use causerie_core::error::ModelError;
    use causerie_core::evidence::EvidenceSource;
    use causerie_core::llm::CompletionResponse;
    use causerie_memory::{HashEmbedder, StoreSettings};

    /// Model stub whose every completion is the same canned text.
    struct CannedModel {
        reply: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ModelError> {
            if self.fail {
                return Err(ModelError::Network("hors ligne".into()));
            }
            Ok(CompletionResponse {
                content: self.reply.to_string(),
                model: "stub".into(),
                usage: None,
            })
        }
    }

    fn assembler(reply: &'static str) -> ContextAssembler {
        ContextAssembler::new(
            Arc::new(CannedModel { reply, fail: false }),
            &ContextConfig::default(),
        )
    }

    fn failing_assembler() -> ContextAssembler {
        ContextAssembler::new(
            Arc::new(CannedModel {
                reply: "",
                fail: true,
            }),
            &ContextConfig::default(),
        )
    }

    fn memory_store() -> MemoryStore {
        MemoryStore::new(StoreSettings::default(), Box::new(HashEmbedder::new(64)))
    }

    #[tokio::test]
    async fn both_pairs_share_the_system_prompt() {
        let assembler = assembler("- résumé");
        let built = assembler
            .build("quelle est la capitale du Japon ?", &[], None, None, &CancelToken::new())
            .await;

        assert_eq!(built.planning_messages.len(), 2);
        assert_eq!(built.answer_messages.len(), 2);
        assert_eq!(built.planning_messages[0].role, Role::System);
        assert_eq!(
            built.planning_messages[0].content,
            built.answer_messages[0].content
        );
        assert!(built.planning_messages[0].content.contains("Causerie"));
    }

    #[tokio::test]
    async fn planning_prompt_carries_the_decision_instruction() {
        let assembler = assembler("- résumé");
        let built = assembler
            .build("bonjour", &[], None, None, &CancelToken::new())
            .await;
        let planning = &built.planning_messages[1].content;
        assert!(planning.contains(r#""action""#));
        assert!(planning.contains("[Question]\nbonjour"));
        assert!(!built.answer_messages[1].content.contains(r#""action""#));
    }

    #[tokio::test]
    async fn memory_slice_appears_when_store_has_matches() {
        let store = memory_store();
        store
            .add(&Message::user("mon prochain voyage sera au Japon en avril"))
            .await;

        let assembler = assembler("- le voyage au Japon est prévu en avril");
        let built = assembler
            .build(
                "rappelle-moi mon projet de voyage",
                &[],
                Some(&store),
                None,
                &CancelToken::new(),
            )
            .await;

        assert!(!built.slices.memory_hits.is_empty());
        assert!(built.answer_messages[1].content.contains("[Mémoire pertinente]"));
        assert!(built.slices.counters.memory_queries >= 1);
    }

    #[tokio::test]
    async fn disabled_store_is_not_consulted() {
        let store = MemoryStore::new(
            StoreSettings {
                enabled: false,
                ..StoreSettings::default()
            },
            Box::new(HashEmbedder::new(64)),
        );
        store.add(&Message::user("un souvenir qui ne doit pas sortir")).await;

        let assembler = assembler("- résumé");
        let built = assembler
            .build("souvenir", &[], Some(&store), None, &CancelToken::new())
            .await;

        assert!(built.slices.memory_hits.is_empty());
        assert_eq!(built.slices.counters.memory_queries, 0);
        assert!(!built.answer_messages[1].content.contains("[Mémoire pertinente]"));
    }

    #[tokio::test]
    async fn evidence_renders_as_a_labeled_block_with_sources() {
        let assembler = assembler("- résumé");
        let evidence = EvidenceBundle {
            content: "Le sommet a eu lieu hier.".into(),
            sources: vec![EvidenceSource {
                title: "Journal".into(),
                url: "https://exemple.fr/sommet".into(),
            }],
        };
        let built = assembler
            .build("que s'est-il passé ?", &[], None, Some(&evidence), &CancelToken::new())
            .await;

        let answer = &built.answer_messages[1].content;
        assert!(answer.contains("[Informations externes]"));
        assert!(answer.contains("Le sommet a eu lieu hier."));
        assert!(answer.contains("https://exemple.fr/sommet"));
    }

    #[tokio::test]
    async fn rebuild_replaces_only_the_evidence_block() {
        let store = memory_store();
        store.add(&Message::user("je m'intéresse aux éclipses solaires")).await;

        let assembler = assembler("- intérêt pour les éclipses");
        let before = assembler
            .build(
                "quand est la prochaine éclipse ?",
                &[],
                Some(&store),
                None,
                &CancelToken::new(),
            )
            .await;
        assert!(before.slices.external_context.is_none());

        let evidence = EvidenceBundle {
            content: "Prochaine éclipse totale : 12 août 2026.".into(),
            sources: Vec::new(),
        };
        let after = assembler.rebuild_with_evidence(&before, &evidence);

        // History/memory slices are reused untouched.
        assert_eq!(after.question, before.question);
        assert_eq!(after.slices.memory_hits.len(), before.slices.memory_hits.len());
        assert_eq!(
            after.slices.selected_history.len(),
            before.slices.selected_history.len()
        );
        // Both regenerated pairs see the evidence.
        assert!(after.planning_messages[1].content.contains("12 août 2026"));
        assert!(after.answer_messages[1].content.contains("12 août 2026"));
    }

    #[tokio::test]
    async fn summarization_failure_degrades_to_no_summary() {
        let store = memory_store();
        store.add(&Message::user("premier souvenir utile")).await;

        let assembler = failing_assembler();
        let built = assembler
            .build("souvenir utile", &[], Some(&store), None, &CancelToken::new())
            .await;

        assert!(built.slices.memory_summary.is_none());
        // The raw hit lines still make it into the prompt.
        assert!(built.answer_messages[1].content.contains("souvenir utile"));
    }

    #[tokio::test]
    async fn long_truncated_history_is_split_and_summarized() {
        let base = chrono::Utc::now() - chrono::Duration::hours(1);
        let history: Vec<Message> = (0..30)
            .map(|i| {
                Message::user(format!(
                    "échange numéro {i} avec suffisamment de texte pour peser \
                     lourd dans le budget de sélection, vraiment beaucoup de texte \
                     qui remplit des tokens et encore des tokens à chaque tour"
                ))
                .with_timestamp(Some(base + chrono::Duration::minutes(i)))
            })
            .collect();

        let assembler = assembler("- résumé des anciens tours").with_budget(ContextBudget {
            answer_tokens: 1400,
            ..ContextBudget::default()
        });
        let built = assembler
            .build("où en étions-nous ?", &history, None, None, &CancelToken::new())
            .await;

        assert!(built.slices.counters.history_truncated);
        assert!(built.slices.counters.history_selected > 6);
        assert_eq!(
            built.slices.history_summary.as_deref(),
            Some("- résumé des anciens tours")
        );
        assert!(
            built.answer_messages[1]
                .content
                .contains("[Résumé de la conversation]")
        );
    }

    #[tokio::test]
    async fn planning_prompt_keeps_only_recent_turns() {
        let base = chrono::Utc::now() - chrono::Duration::hours(1);
        let history: Vec<Message> = (0..6)
            .map(|i| {
                Message::user(format!("tour numéro {i}"))
                    .with_timestamp(Some(base + chrono::Duration::minutes(i)))
            })
            .collect();

        let assembler = assembler("- résumé");
        let built = assembler
            .build("et maintenant ?", &history, None, None, &CancelToken::new())
            .await;

        let planning = &built.planning_messages[1].content;
        assert!(planning.contains("tour numéro 5"));
        assert!(!planning.contains("tour numéro 0"));
        // The answer prompt keeps the whole selection.
        assert!(built.answer_messages[1].content.contains("tour numéro 0"));
    }
}
