//! HTTP evidence fetcher against a DuckDuckGo-style instant-answer API.
//!
//! The fetch is fully degrading: HTTP errors, unparsable bodies, the
//! configured timeout, and cancellation all resolve to the
//! "search failed" bundle. The turn keeps moving either way.

use async_trait::async_trait;
use causerie_config::SearchConfig;
use causerie_core::cancel::CancelToken;
use causerie_core::evidence::{EvidenceBundle, EvidenceFetcher, EvidenceSource};
use serde::Deserialize;
use tracing::{debug, warn};

/// Fetches evidence from an instant-answer endpoint.
pub struct HttpEvidenceFetcher {
    endpoint: String,
    timeout: std::time::Duration,
    max_sources: usize,
    client: reqwest::Client,
}

impl HttpEvidenceFetcher {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: std::time::Duration::from_secs(config.evidence_timeout_secs),
            max_sources: config.max_sources,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_inner(&self, query: &str) -> Option<EvidenceBundle> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| warn!(error = %e, "evidence request failed"))
            .ok()?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "evidence endpoint returned an error");
            return None;
        }

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| warn!(error = %e, "evidence body unparsable"))
            .ok()?;

        digest(&answer, self.max_sources)
    }
}

#[async_trait]
impl EvidenceFetcher for HttpEvidenceFetcher {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn fetch(&self, query: &str, cancel: &CancelToken) -> EvidenceBundle {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("evidence fetch cancelled");
                None
            }
            result = tokio::time::timeout(self.timeout, self.fetch_inner(query)) => {
                match result {
                    Ok(bundle) => bundle,
                    Err(_) => {
                        warn!(timeout_secs = self.timeout.as_secs(), "evidence fetch timed out");
                        None
                    }
                }
            }
        };
        outcome.unwrap_or_else(EvidenceBundle::unavailable)
    }
}

/// Build the digest bundle from a parsed instant answer.
///
/// Preference order: the abstract, then the dictionary definition, then
/// related-topic snippets. Sources are unique by URL and capped.
fn digest(answer: &InstantAnswer, max_sources: usize) -> Option<EvidenceBundle> {
    let mut lines: Vec<String> = Vec::new();
    let mut sources: Vec<EvidenceSource> = Vec::new();

    if !answer.abstract_text.is_empty() {
        lines.push(answer.abstract_text.clone());
        push_source(&mut sources, max_sources, &answer.abstract_source, &answer.abstract_url);
    } else if !answer.definition.is_empty() {
        lines.push(answer.definition.clone());
        push_source(&mut sources, max_sources, &answer.definition_source, &answer.definition_url);
    }

    for topic in flatten_topics(&answer.related_topics) {
        if sources.len() >= max_sources {
            break;
        }
        if topic.text.is_empty() || topic.first_url.is_empty() {
            continue;
        }
        lines.push(format!("- {}", topic.text));
        push_source(&mut sources, max_sources, &topic.text, &topic.first_url);
    }

    if lines.is_empty() {
        return None;
    }
    Some(EvidenceBundle {
        content: lines.join("\n"),
        sources,
    })
}

fn push_source(sources: &mut Vec<EvidenceSource>, max_sources: usize, title: &str, url: &str) {
    if url.is_empty() || sources.len() >= max_sources {
        return;
    }
    if sources.iter().any(|s| s.url == url) {
        return;
    }
    sources.push(EvidenceSource {
        title: if title.is_empty() {
            url.to_string()
        } else {
            title.to_string()
        },
        url: url.to_string(),
    });
}

/// Related topics arrive either directly or grouped one level deep
/// under a category name.
fn flatten_topics(topics: &[RelatedTopic]) -> Vec<&TopicEntry> {
    let mut flat = Vec::new();
    for topic in topics {
        match topic {
            RelatedTopic::Entry(entry) => flat.push(entry),
            RelatedTopic::Group { topics } => flat.extend(topics.iter()),
        }
    }
    flat
}

#[derive(Debug, Default, Deserialize)]
struct InstantAnswer {
    #[serde(default, rename = "AbstractText")]
    abstract_text: String,
    #[serde(default, rename = "AbstractSource")]
    abstract_source: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default, rename = "Definition")]
    definition: String,
    #[serde(default, rename = "DefinitionSource")]
    definition_source: String,
    #[serde(default, rename = "DefinitionURL")]
    definition_url: String,
    #[serde(default, rename = "RelatedTopics")]
    related_topics: Vec<RelatedTopic>,
}

// Group first: with untagged deserialization the all-default Entry
// shape would otherwise swallow group objects too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<TopicEntry>,
    },
    Entry(TopicEntry),
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    #[serde(default, rename = "Text")]
    text: String,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
}
