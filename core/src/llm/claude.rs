//! Anthropic (Claude) adapter.
//!
//! Claude's Messages API puts the system prompt in a top-level `system` field
//! (never as a `messages` entry), authenticates via `x-api-key` plus an
//! `anthropic-version` header rather than a bearer token, and wraps tool
//! schemas under `input_schema` instead of `parameters`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::message::{Message, Role};

use super::{build_http_client, FunctionCall, LlmClient, LlmError, LlmRequest, LlmResponse, LlmUsage, DEFAULT_TIMEOUT_SECS};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct ClaudeClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl ClaudeClient {
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

    /// Overrides the default 30s per-call timeout (spec §6 `claude.timeout`).
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.http = build_http_client(timeout_secs);
        self
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        // Claude has no separate "tool" role; tool results ride back in as a
        // user-turn content block.
        Role::User | Role::Tool => "user",
        Role::Assistant => "assistant",
        Role::System => "user",
    }
}

fn message_to_claude(m: &Message) -> Value {
    if let Some(id) = &m.tool_call_id {
        return json!({
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": id, "content": m.content}],
        });
    }
    json!({"role": role_str(m.role), "content": m.content})
}

fn build_claude_body(model: &str, request: &LlmRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(message_to_claude).collect();

    let mut body = json!({
        "model": model,
        "max_tokens": DEFAULT_MAX_TOKENS,
        "messages": messages,
    });

    if let Some(system) = &request.system_prompt {
        body["system"] = json!(system);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = json!(temp);
    }
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    body
}

fn parse_claude_response(value: &Value) -> Result<LlmResponse, LlmError> {
    let usage = value.get("usage").map(|u| LlmUsage {
        prompt_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        completion_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        total_tokens: (u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0)
            + u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0)) as u32,
    });

    let content = value
        .get("content")
        .and_then(Value::as_array)
        .ok_or(LlmError::EmptyResponse)?;

    // Claude can emit a text block followed by a tool_use block; per spec's
    // normalization rules a function call takes priority over text.
    let tool_use = content.iter().find(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"));
    if let Some(block) = tool_use {
        let name = block
            .get("name")
            .and_then(Value::as_str)
            .ok_or(LlmError::EmptyResponse)?
            .to_string();
        let arguments = block
            .get("input")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "{}".to_string());
        return Ok(LlmResponse::FunctionCall { call: FunctionCall { name, arguments }, usage });
    }

    let text = content
        .iter()
        .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
        .ok_or(LlmError::EmptyResponse)?
        .to_string();

    Ok(LlmResponse::Text { content: text, usage })
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        super::validate_request(&request, self.capabilities().max_context_chars)?;
        let body = build_claude_body(&self.model, &request);
        let url = format!("{}/messages", self.base_url);

        tracing::debug!(provider = "claude", model = %self.model, "dispatching request");

        let resp = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
            tracing::warn!(provider = "claude", %status, "provider returned error status");
            return Err(LlmError::Provider(format!("claude {status}: {text}")));
        }

        let value: Value = resp.json().await.map_err(|e| LlmError::Provider(e.to_string()))?;
        parse_claude_response(&value)
    }

    fn provider_name(&self) -> &str {
        "claude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_goes_to_top_level_field_not_messages() {
        let req = LlmRequest::new(vec![Message::user("hi")]).with_system_prompt("be terse");
        let body = build_claude_body("claude-3-5-sonnet-latest", &req);
        assert_eq!(body["system"], json!("be terse"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn tool_schema_wrapped_under_input_schema() {
        let req = LlmRequest::new(vec![]).with_tools(vec![super::super::ToolDefinition {
            name: "search".into(),
            description: "search the web".into(),
            parameters: json!({"type": "object"}),
            required: vec![],
        }]);
        let body = build_claude_body("claude-3-5-sonnet-latest", &req);
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
    }

    #[test]
    fn tool_use_block_wins_over_accompanying_text_block() {
        let value = json!({
            "content": [
                {"type": "text", "text": "let me check that"},
                {"type": "tool_use", "name": "weather", "input": {"city": "Paris"}}
            ]
        });
        let response = parse_claude_response(&value).unwrap();
        match response {
            LlmResponse::FunctionCall { call, .. } => assert_eq!(call.name, "weather"),
            other => panic!("expected function call, got {other:?}"),
        }
    }

    #[test]
    fn tool_result_message_becomes_user_turn_with_tool_result_block() {
        let msg = Message::tool_result("abc123", "42 degrees");
        let value = message_to_claude(&msg);
        assert_eq!(value["role"], json!("user"));
        assert_eq!(value["content"][0]["type"], json!("tool_result"));
        assert_eq!(value["content"][0]["tool_use_id"], json!("abc123"));
    }
}
