//! OpenRouter-backed model gateway
//!
//! Talks the OpenAI-compatible chat completions protocol. A semaphore bounds
//! concurrent in-flight requests; retriable failures (429, timeouts) back
//! off exponentially within the caller's deadline.

mod types;

use crate::retry::with_retries;
use crate::{
    validate_structured, Completion, CompletionRequest, ModelGateway, StreamDelta, TokenStream,
    TokenUsage,
};
use arena_core::{ArenaResult, GatewayConfig, GatewayError};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use types::*;

/// Default cap on concurrent in-flight requests to the provider.
const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// OpenRouter API client implementing [`ModelGateway`].
pub struct OpenRouterGateway {
    client: Client,
    api_key: String,
    base_url: String,
    config: GatewayConfig,
    in_flight: Arc<Semaphore>,
}

impl OpenRouterGateway {
    /// Create a gateway against the given base URL (e.g.
    /// "https://openrouter.ai/api/v1").
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            config,
            in_flight: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
        }
    }

    fn chat_request(&self, request: &CompletionRequest, stream: bool) -> ChatRequest {
        ChatRequest {
            model: request.model_id.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt.clone(),
            }],
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            stream,
            response_format: request.options.structured.as_ref().map(|_| ResponseFormat {
                format_type: "json_object",
            }),
        }
    }

    fn deadline(&self, request: &CompletionRequest) -> Duration {
        request
            .options
            .deadline
            .unwrap_or(self.config.default_deadline)
    }

    async fn send(&self, body: &ChatRequest) -> Result<reqwest::Response, GatewayError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| GatewayError::Provider {
                provider: "openrouter".to_string(),
                status: 0,
                message: format!("request limiter closed: {}", e),
            })?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Provider {
                        provider: "openrouter".to_string(),
                        status: 0,
                        message: format!("HTTP request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .map(|secs| secs * 1000);
        let body_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body_text)
            .map(|e| e.error.message)
            .unwrap_or(body_text);

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited { retry_after_ms },
            StatusCode::REQUEST_TIMEOUT => GatewayError::Timeout,
            _ => GatewayError::Provider {
                provider: "openrouter".to_string(),
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn attempt_invoke(
        &self,
        body: &ChatRequest,
    ) -> Result<(String, TokenUsage), GatewayError> {
        let response = self.send(body).await?;
        let parsed: ChatResponse = response.json().await.map_err(|e| GatewayError::Provider {
            provider: "openrouter".to_string(),
            status: 0,
            message: format!("failed to parse response: {}", e),
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Invalid {
                reason: "response contained no choices".to_string(),
            })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(GatewayError::ContentFiltered);
        }

        let text = choice.message.content.unwrap_or_default();
        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        Ok((text, usage))
    }
}

#[async_trait]
impl ModelGateway for OpenRouterGateway {
    async fn invoke(&self, request: CompletionRequest) -> ArenaResult<Completion> {
        let body = self.chat_request(&request, false);
        let deadline = self.deadline(&request);

        let this = self;
        let body_ref = &body;
        let (text, usage) = tokio::time::timeout(
            deadline,
            with_retries(&self.config, move || this.attempt_invoke(body_ref)),
        )
        .await
        .map_err(|_| GatewayError::Timeout)??;

        let structured_data = match &request.options.structured {
            Some(schema) => Some(validate_structured(&text, schema)?),
            None => None,
        };

        Ok(Completion {
            text,
            usage,
            structured_data,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> ArenaResult<TokenStream> {
        let body = self.chat_request(&request, true);
        let deadline = self.deadline(&request);

        // Retries cover stream establishment only; an open stream is
        // non-restartable and surfaces mid-flight errors to the consumer.
        let this = self;
        let body_ref = &body;
        let response = tokio::time::timeout(
            deadline,
            with_retries(&self.config, move || this.send(body_ref)),
        )
        .await
        .map_err(|_| GatewayError::Timeout)??;

        let state = SseState {
            bytes: response.bytes_stream().boxed(),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures_util::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        // Bytes, not text: a multi-byte character may span
                        // chunk boundaries, lines never do
                        state.buffer.extend_from_slice(&chunk);
                        drain_sse_buffer(&mut state);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        state.pending.push_back(Err(GatewayError::Provider {
                            provider: "openrouter".to_string(),
                            status: 0,
                            message: format!("stream transport error: {}", e),
                        }));
                    }
                    None => {
                        state.done = true;
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

struct SseState {
    bytes: BoxByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamDelta, GatewayError>>,
    done: bool,
}

type BoxByteStream =
    futures_util::stream::BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>;

/// Split complete SSE lines off the buffer and queue their deltas.
fn drain_sse_buffer(state: &mut SseState) {
    while let Some(newline) = state.buffer.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = state.buffer.drain(..=newline).collect();
        let Ok(line) = std::str::from_utf8(&raw) else {
            tracing::warn!("Skipping non-UTF-8 stream line");
            continue;
        };
        let line = line.trim();
        let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
            continue;
        };
        if payload == "[DONE]" {
            state.done = true;
            return;
        }
        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => {
                for choice in chunk.choices {
                    if choice.finish_reason.as_deref() == Some("content_filter") {
                        state.done = true;
                        state
                            .pending
                            .push_back(Err(GatewayError::ContentFiltered));
                        return;
                    }
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            state.pending.push_back(Ok(StreamDelta { text: content }));
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparseable stream chunk");
            }
        }
    }
}

impl std::fmt::Debug for OpenRouterGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
