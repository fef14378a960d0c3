//! OpenAI-compatible chat-completion backend.
//!
//! Works against any endpoint exposing `/v1/chat/completions`:
//! llama.cpp server, Ollama, vLLM, LM Studio, or a hosted service.
//! Supports non-streaming and streaming (SSE) completions, both
//! abandoned cooperatively when the request's cancellation token fires.

use async_trait::async_trait;
use causerie_config::ModelConfig;
use causerie_core::error::ModelError;
use causerie_core::llm::{
    CompletionRequest, CompletionResponse, LanguageModel, StreamChunk, TokenUsage,
};
use causerie_core::message::{Message, Role};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// A chat-completion backend speaking the OpenAI wire format.
pub struct OpenAiCompatModel {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(config: &ModelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        accept_sse: bool,
    ) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        if accept_sse {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(e.to_string())
            } else {
                ModelError::Network(e.to_string())
            }
        })?;

        match response.status().as_u16() {
            200 => Ok(response),
            429 => Err(ModelError::RateLimited {
                retry_after_secs: 5,
            }),
            401 | 403 => Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            status => {
                let message = response.text().await.unwrap_or_default();
                warn!(status, body = %message, "model endpoint returned an error");
                Err(ModelError::ApiError {
                    status_code: status,
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let body = self.request_body(&request, false);
        debug!(model = %self.model, messages = request.messages.len(), "completion request");

        let cancel = request.cancel.clone();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            result = self.post(&body, false) => result?,
        };

        let api_response: ApiResponse = tokio::select! {
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            parsed = response.json::<ApiResponse>() => parsed.map_err(|e| ModelError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?,
        };

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            usage: api_response.usage.map(ApiUsage::into_token_usage),
        })
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ModelError>>, ModelError> {
        let body = self.request_body(&request, true);
        debug!(model = %self.model, messages = request.messages.len(), "streaming request");

        let cancel = request.cancel.clone();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            result = self.post(&body, true) => result?,
        };

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            loop {
                let chunk_result = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = tx.send(Err(ModelError::Cancelled)).await;
                        return;
                    }
                    next = byte_stream.next() => match next {
                        Some(r) => r,
                        None => break,
                    },
                };

                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ModelError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        let _ = tx
                            .send(Ok(StreamChunk {
                                content: None,
                                done: true,
                                usage: None,
                            }))
                            .await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            let usage = stream_resp.usage.map(ApiUsage::into_token_usage);
                            let Some(choice) = stream_resp.choices.into_iter().next() else {
                                // usage-only frame (stream_options)
                                if usage.is_some()
                                    && tx
                                        .send(Ok(StreamChunk {
                                            content: None,
                                            done: false,
                                            usage,
                                        }))
                                        .await
                                        .is_err()
                                {
                                    return;
                                }
                                continue;
                            };

                            let has_content =
                                choice.delta.content.as_ref().is_some_and(|c| !c.is_empty());
                            if has_content || choice.finish_reason.is_some() {
                                let chunk = StreamChunk {
                                    content: choice.delta.content,
                                    done: false,
                                    usage,
                                };
                                if tx.send(Ok(chunk)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "skipping unparsable SSE frame");
                        }
                    }
                }
            }

            // Stream ended without a [DONE]; close it out anyway.
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
        });

        Ok(rx)
    }
}

fn to_api_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            json!({
                "role": match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    Role::Tool => "tool",
                },
                "content": m.content,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl ApiUsage {
    fn into_token_usage(self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
