//! Mock gateway for testing
//!
//! Deterministic, scriptable stand-in for a real provider. Unscripted calls
//! answer with configurable defaults; scripted calls are consumed per model
//! in FIFO order, which lets tests inject failures for specific judges or
//! competitors without touching the rest of the panel.

use crate::{
    validate_structured, Completion, CompletionRequest, ModelGateway, StreamDelta, TokenStream,
    TokenUsage,
};
use arena_core::{ArenaResult, GatewayError};
use async_trait::async_trait;
use futures_util::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted answer for a model.
#[derive(Debug, Clone)]
pub enum ScriptedCall {
    /// Plain text completion.
    Text(String),
    /// Structured completion; serialized to text and returned as
    /// `structured_data` too.
    Structured(serde_json::Value),
    /// Fail the call outright.
    Fail(GatewayError),
    /// For streams: emit the prefix as deltas, then fail. For invokes this
    /// behaves like `Fail`.
    FailMidStream {
        prefix: String,
        error: GatewayError,
    },
}

/// Deterministic mock implementation of [`ModelGateway`].
pub struct MockGateway {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedCall>>>,
    calls: Mutex<Vec<CompletionRequest>>,
    default_text: String,
    default_structured: Option<serde_json::Value>,
    latency: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            default_text: "This is a mock model response.".to_string(),
            default_structured: None,
            latency: None,
        }
    }

    /// Text returned by unscripted plain calls.
    pub fn with_default_text(mut self, text: impl Into<String>) -> Self {
        self.default_text = text.into();
        self
    }

    /// Value returned by unscripted structured calls. Without this,
    /// unscripted structured calls fail with `Invalid`.
    pub fn with_default_structured(mut self, value: serde_json::Value) -> Self {
        self.default_structured = Some(value);
        self
    }

    /// Simulated provider latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a scripted answer for `model_id`. Scripts are consumed FIFO
    /// before any default applies.
    pub fn push(&self, model_id: impl Into<String>, call: ScriptedCall) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model_id.into())
            .or_default()
            .push_back(call);
    }

    /// All requests this gateway has observed, in order.
    pub fn recorded_calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn next_script(&self, model_id: &str) -> Option<ScriptedCall> {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(model_id)
            .and_then(|queue| queue.pop_front())
    }

    fn record(&self, request: &CompletionRequest) {
        self.calls.lock().unwrap().push(request.clone());
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn resolve(&self, request: &CompletionRequest) -> Result<Resolved, GatewayError> {
        match self.next_script(&request.model_id) {
            Some(ScriptedCall::Text(text)) => Ok(Resolved::Text(text)),
            Some(ScriptedCall::Structured(value)) => Ok(Resolved::Structured(value)),
            Some(ScriptedCall::Fail(error)) => Err(error),
            Some(ScriptedCall::FailMidStream { prefix, error }) => {
                Ok(Resolved::FailMidStream { prefix, error })
            }
            None => {
                if request.options.structured.is_some() {
                    match &self.default_structured {
                        Some(value) => Ok(Resolved::Structured(value.clone())),
                        None => Err(GatewayError::Invalid {
                            reason: "no structured default configured for mock".to_string(),
                        }),
                    }
                } else {
                    Ok(Resolved::Text(self.default_text.clone()))
                }
            }
        }
    }
}

enum Resolved {
    Text(String),
    Structured(serde_json::Value),
    FailMidStream {
        prefix: String,
        error: GatewayError,
    },
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGateway")
            .field("calls", &self.calls.lock().unwrap().len())
            .finish()
    }
}

/// Split text into word-sized deltas, preserving whitespace.
fn into_deltas(text: &str) -> Vec<StreamDelta> {
    let mut deltas = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch.is_whitespace() {
            deltas.push(StreamDelta {
                text: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        deltas.push(StreamDelta { text: current });
    }
    deltas
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn invoke(&self, request: CompletionRequest) -> ArenaResult<Completion> {
        self.record(&request);
        self.simulate_latency().await;

        let resolved = self.resolve(&request)?;
        let (text, structured_data) = match resolved {
            Resolved::Text(text) => (text, None),
            Resolved::Structured(value) => (value.to_string(), Some(value)),
            Resolved::FailMidStream { error, .. } => return Err(error.into()),
        };

        let structured_data = match &request.options.structured {
            Some(schema) => Some(validate_structured(&text, schema)?),
            None => structured_data,
        };

        let usage = TokenUsage {
            input_tokens: (request.prompt.len() / 4) as u32,
            output_tokens: (text.len() / 4) as u32,
        };
        Ok(Completion {
            text,
            usage,
            structured_data,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> ArenaResult<TokenStream> {
        self.record(&request);
        self.simulate_latency().await;

        let items: Vec<Result<StreamDelta, GatewayError>> = match self.resolve(&request)? {
            Resolved::Text(text) => into_deltas(&text).into_iter().map(Ok).collect(),
            Resolved::Structured(value) => into_deltas(&value.to_string())
                .into_iter()
                .map(Ok)
                .collect(),
            Resolved::FailMidStream { prefix, error } => into_deltas(&prefix)
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(error)))
                .collect(),
        };

        Ok(Box::pin(stream::iter(items)))
    }
}
