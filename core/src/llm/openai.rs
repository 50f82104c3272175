//! OpenAI (and OpenAI-compatible) adapter.
//!
//! Handles the `tools` schema dialect OpenAI expects: each tool is wrapped as
//! `{"type": "function", "function": {name, description, parameters}}`, and
//! array-typed parameters must carry an `items` schema or the API rejects the
//! request outright.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::message::{Message, Role};

use super::{build_http_client, FunctionCall, LlmClient, LlmError, LlmRequest, LlmResponse, LlmUsage, DEFAULT_TIMEOUT_SECS};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: build_http_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default 30s per-call timeout (spec §6 `openai.timeout`).
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.http = build_http_client(timeout_secs);
        self
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::System => "system",
    }
}

/// Ensures array-typed JSON-schema nodes carry an `items` clause. OpenAI's
/// function-calling validator rejects `{"type": "array"}` with no `items`;
/// other providers are more lenient, so this normalization lives here rather
/// than on the shared [`super::ToolDefinition`].
fn ensure_array_items(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = map.clone();
            if out.get("type").and_then(Value::as_str) == Some("array") && !out.contains_key("items") {
                out.insert("items".to_string(), json!({"type": "string"}));
            }
            for (_, v) in out.iter_mut() {
                *v = ensure_array_items(v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(ensure_array_items).collect()),
        other => other.clone(),
    }
}

pub(crate) fn build_openai_style_body(model: &str, request: &LlmRequest) -> Value {
    let mut messages: Vec<Value> = Vec::new();
    if let Some(system) = &request.system_prompt {
        messages.push(json!({"role": "system", "content": system}));
    }
    for m in &request.messages {
        messages.push(message_to_openai(m));
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
    });

    if let Some(temp) = request.temperature {
        body["temperature"] = json!(temp);
    }

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": ensure_array_items(&t.parameters),
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    body
}

fn message_to_openai(m: &Message) -> Value {
    let mut v = json!({"role": role_str(m.role), "content": m.content});
    if let Some(id) = &m.tool_call_id {
        v["tool_call_id"] = json!(id);
    }
    v
}

pub(crate) fn parse_openai_style_response(value: &Value) -> Result<LlmResponse, LlmError> {
    let usage = value.get("usage").map(|u| LlmUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
    });

    let choice = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(LlmError::EmptyResponse)?;

    let message = choice.get("message").ok_or(LlmError::EmptyResponse)?;

    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        if let Some(first) = tool_calls.first() {
            let function = first.get("function").ok_or(LlmError::EmptyResponse)?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or(LlmError::EmptyResponse)?
                .to_string();
            let arguments = function
                .get("arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}")
                .to_string();
            return Ok(LlmResponse::FunctionCall { call: FunctionCall { name, arguments }, usage });
        }
    }

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .ok_or(LlmError::EmptyResponse)?
        .to_string();

    Ok(LlmResponse::Text { content, usage })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        super::validate_request(&request, self.capabilities().max_context_chars)?;
        let body = build_openai_style_body(&self.model, &request);
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!("openai {status}: {text}")));
        }

        let value: Value = resp.json().await.map_err(|e| LlmError::Provider(e.to_string()))?;
        parse_openai_style_response(&value)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
