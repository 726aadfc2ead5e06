//! Arena LLM - Model Gateway
//!
//! Provider-agnostic interface for invoking language models with either a
//! single completion or a monotonic stream of text deltas. The concrete
//! OpenRouter-backed implementation is wired at startup and never re-wired
//! at runtime; tests use the deterministic mock.

use arena_core::{ArenaResult, GatewayError};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod mock;
mod retry;
mod schema;
pub mod providers;

pub use mock::{MockGateway, ScriptedCall};
pub use retry::Backoff;
pub use schema::validate_structured;

// ============================================================================
// CALL TYPES
// ============================================================================

/// Options for a single model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Hard wall-clock deadline for the whole call, including retries.
    /// Falls back to the gateway's configured default when `None`.
    pub deadline: Option<Duration>,
    /// When set, the final text must parse as strict JSON matching this
    /// schema; a mismatch fails the call with `GatewayError::Invalid`.
    pub structured: Option<serde_json::Value>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: None,
            deadline: None,
            structured: None,
        }
    }
}

/// A prompt addressed to a named model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model_id: String,
    pub prompt: String,
    pub options: CallOptions,
}

impl CompletionRequest {
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            prompt: prompt.into(),
            options: CallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A finished completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    /// Parsed JSON when the call asked for structured output.
    pub structured_data: Option<serde_json::Value>,
}

/// One increment of streamed text. Deltas are discrete, not cumulative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDelta {
    pub text: String,
}

/// A finite, non-restartable sequence of text deltas. The stream closes
/// normally at the provider's terminal token or yields a final error.
pub type TokenStream = BoxStream<'static, Result<StreamDelta, GatewayError>>;

// ============================================================================
// GATEWAY TRAIT
// ============================================================================

/// Uniform call/stream interface to external language models.
///
/// Implementations must be thread-safe and must honor cancellation: when the
/// caller's future is dropped the underlying HTTP call is aborted, and any
/// deltas already emitted to the consumer remain valid.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send a prompt and wait for the whole completion.
    async fn invoke(&self, request: CompletionRequest) -> ArenaResult<Completion>;

    /// Send a prompt and receive text deltas as they arrive.
    async fn stream(&self, request: CompletionRequest) -> ArenaResult<TokenStream>;
}
