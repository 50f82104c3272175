//! # LLM Adapter
//!
//! Normalizes heterogeneous provider HTTP responses into a single
//! [`LlmResponse`] shape so strategies never see provider-specific JSON.

mod claude;
mod gemini;
mod groq;
mod mock;
mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use mock::MockLlm;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

/// Default per-call timeout (spec §4.1/§5) applied when a provider's
/// `<provider>.timeout` property is unset.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Builds the `reqwest::Client` shared by every provider adapter, with a
/// per-call timeout so a stalled upstream surfaces as `LlmError::Timeout`
/// instead of hanging forever.
pub(crate) fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// A tool definition as presented to an LLM provider. Adapters translate this
/// into whichever JSON-schema dialect the provider expects (e.g. wrapping
/// array parameters with `items`, or nesting under `input_schema` vs a
/// top-level `parameters` key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub required: Vec<String>,
}

impl ToolDefinition {
    /// `convertMcpTools` (spec §4.1 item 3), applied one tool at a time. The
    /// per-provider schema dialect (array `items`, `input_schema` vs
    /// `parameters`) is handled downstream in each adapter's `build_*_body`;
    /// this step only normalizes the MCP-side edge cases that are dialect
    /// independent: missing descriptions and an absent/empty `required` list.
    pub fn from_mcp(name: impl Into<String>, description: Option<String>, input_schema: serde_json::Value) -> Self {
        let required = input_schema
            .get("required")
            .and_then(serde_json::Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Self {
            name: name.into(),
            description: description.unwrap_or_else(|| "No description available".to_string()),
            parameters: input_schema,
            required,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn merge(&self, other: &LlmUsage) -> LlmUsage {
        LlmUsage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<crate::message::Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<crate::message::Message>) -> Self {
        Self { system_prompt: None, messages, tools: Vec::new(), temperature: None }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Total character count across all message content plus the system
    /// prompt, used by [`validate_prompt_len`] as a stand-in for "the prompt"
    /// once a request has been assembled from several conversation turns.
    pub fn combined_text_len(&self) -> usize {
        let system_len = self.system_prompt.as_ref().map(String::len).unwrap_or(0);
        system_len + self.messages.iter().map(|m| m.content.len()).sum::<usize>()
    }

    /// True when every message (and the system prompt) is empty or
    /// whitespace-only — the spec's "empty prompt" input-validation case.
    pub fn is_text_empty(&self) -> bool {
        let system_empty = self.system_prompt.as_deref().map(str::trim).unwrap_or("").is_empty();
        system_empty && self.messages.iter().all(|m| m.content.trim().is_empty())
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// A function call an LLM asked the caller to perform. `arguments` is the raw
/// JSON text the provider returned — callers parse it lazily since a
/// malformed payload is a VALIDATION-kind error, not a transport failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A provider response, normalized to one of three shapes. This is the
/// boundary every adapter converts into; strategies never branch on provider
/// identity past this point.
#[derive(Debug, Clone)]
pub enum LlmResponse {
    Text { content: String, usage: Option<LlmUsage> },
    FunctionCall { call: FunctionCall, usage: Option<LlmUsage> },
    Error { message: String, kind: ErrorKind },
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        LlmResponse::Text { content: content.into(), usage: None }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            LlmResponse::Text { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn usage(&self) -> Option<&LlmUsage> {
        match self {
            LlmResponse::Text { usage, .. } => usage.as_ref(),
            LlmResponse::FunctionCall { usage, .. } => usage.as_ref(),
            LlmResponse::Error { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("empty response from provider")]
    EmptyResponse,
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    Input(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Transport(_) => ErrorKind::Transport,
            LlmError::Provider(_) => ErrorKind::ProviderError,
            LlmError::EmptyResponse => ErrorKind::EmptyResponse,
            LlmError::Timeout => ErrorKind::Timeout,
            LlmError::Input(_) => ErrorKind::Input,
        }
    }
}

/// What an adapter supports, surfaced so strategies can decide whether to
/// attempt function-calling at all before spending a round-trip on it.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub function_calling: bool,
    pub system_messages: bool,
    pub streaming: bool,
    pub max_context_chars: usize,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            function_calling: true,
            system_messages: true,
            streaming: false,
            max_context_chars: 200_000,
        }
    }
}

/// Object-safe client trait implemented by every provider adapter and by
/// [`MockLlm`]. Engines hold `Arc<dyn LlmClient>` so a hot-swap just replaces
/// the pointer.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Human-readable provider name, used in logs and error messages.
    fn provider_name(&self) -> &str;

    /// Declared capability set. Adapters needing non-default limits (smaller
    /// context windows, no function calling) override this.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Cheap liveness hint — no network round-trip. Defaults to `true`;
    /// adapters that track their last transport error may override it.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Input validation shared by every adapter's `invoke`: an empty prompt, or
/// one exceeding the capability's declared context budget, is an `INPUT`
/// error and is never retried (spec §4.1 "Input validation").
pub fn validate_prompt_len(text: &str, max_context_chars: usize) -> Result<(), LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::Input("prompt is empty".to_string()));
    }
    if text.len() > max_context_chars {
        return Err(LlmError::Input(format!(
            "prompt length {} exceeds max_context_chars {max_context_chars}",
            text.len()
        )));
    }
    Ok(())
}

/// Same checks as [`validate_prompt_len`], applied to an assembled
/// [`LlmRequest`] rather than a single string — every adapter's `invoke`
/// calls this first.
pub fn validate_request(request: &LlmRequest, max_context_chars: usize) -> Result<(), LlmError> {
    if request.is_text_empty() {
        return Err(LlmError::Input("prompt is empty".to_string()));
    }
    let len = request.combined_text_len();
    if len > max_context_chars {
        return Err(LlmError::Input(format!(
            "prompt length {len} exceeds max_context_chars {max_context_chars}"
        )));
    }
    Ok(())
}
