//! Google Gemini adapter.
//!
//! Gemini authenticates via an API key in the query string rather than a
//! header, groups messages into `contents` with a `parts` array, calls the
//! system prompt a `systemInstruction`, and returns function calls as
//! structured `functionCall` parts (arguments already a JSON object, not a
//! string — unlike OpenAI/Groq/Claude).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::message::{Message, Role};

use super::{build_http_client, FunctionCall, LlmClient, LlmError, LlmRequest, LlmResponse, LlmUsage, DEFAULT_TIMEOUT_SECS};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiClient {
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

    /// Overrides the default 30s per-call timeout (spec §6 `gemini.timeout`).
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.http = build_http_client(timeout_secs);
        self
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User | Role::Tool | Role::System => "user",
        Role::Assistant => "model",
    }
}

fn message_to_gemini(m: &Message) -> Value {
    json!({"role": role_str(m.role), "parts": [{"text": m.content}]})
}

/// Gemini rejects array parameters with no `items` the same way OpenAI does;
/// the fix is identical so it is shared rather than duplicated per adapter.
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

fn build_gemini_body(request: &LlmRequest) -> Value {
    let contents: Vec<Value> = request.messages.iter().map(message_to_gemini).collect();

    let mut body = json!({ "contents": contents });

    if let Some(system) = &request.system_prompt {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }

    let mut generation_config = serde_json::Map::new();
    if let Some(temp) = request.temperature {
        generation_config.insert("temperature".to_string(), json!(temp));
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    if !request.tools.is_empty() {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": ensure_array_items(&t.parameters),
                })
            })
            .collect();
        body["tools"] = json!([{"functionDeclarations": declarations}]);
    }

    body
}

fn parse_gemini_response(value: &Value) -> Result<LlmResponse, LlmError> {
    let usage = value.get("usageMetadata").map(|u| LlmUsage {
        prompt_tokens: u.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32,
        completion_tokens: u.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32,
        total_tokens: u.get("totalTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32,
    });

    let candidate = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(LlmError::EmptyResponse)?;

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .ok_or(LlmError::EmptyResponse)?;

    if let Some(function_call) = parts.iter().find_map(|p| p.get("functionCall")) {
        let name = function_call
            .get("name")
            .and_then(Value::as_str)
            .ok_or(LlmError::EmptyResponse)?
            .to_string();
        // Gemini hands back arguments as a JSON object already; re-stringify
        // so FunctionCall::arguments stays a uniform "raw text" contract
        // across providers.
        let arguments = function_call
            .get("args")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "{}".to_string());
        return Ok(LlmResponse::FunctionCall { call: FunctionCall { name, arguments }, usage });
    }

    let text = parts
        .iter()
        .find_map(|p| p.get("text").and_then(Value::as_str))
        .ok_or(LlmError::EmptyResponse)?
        .to_string();

    Ok(LlmResponse::Text { content: text, usage })
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        super::validate_request(&request, self.capabilities().max_context_chars)?;
        let body = build_gemini_body(&request);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        tracing::debug!(provider = "gemini", model = %self.model, "dispatching request");

        let resp = self
            .http
            .post(url)
            .query(&[("key", &self.api_key)])
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
            tracing::warn!(provider = "gemini", %status, "provider returned error status");
            return Err(LlmError::Provider(format!("gemini {status}: {text}")));
        }

        let value: Value = resp.json().await.map_err(|e| LlmError::Provider(e.to_string()))?;
        parse_gemini_response(&value)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_becomes_system_instruction() {
        let req = LlmRequest::new(vec![Message::user("hi")]).with_system_prompt("be terse");
        let body = build_gemini_body(&req);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], json!("be terse"));
    }

    #[test]
    fn assistant_role_maps_to_model() {
        let msg = Message::assistant("ok");
        let value = message_to_gemini(&msg);
        assert_eq!(value["role"], json!("model"));
    }

    #[test]
    fn array_param_without_items_gets_default_string_items() {
        let schema = json!({"type": "array"});
        let fixed = ensure_array_items(&schema);
        assert_eq!(fixed["items"], json!({"type": "string"}));
    }

    #[test]
    fn function_call_args_are_restringified_to_uniform_text_contract() {
        let value = json!({
            "candidates": [{"content": {"parts": [
                {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}
            ]}}]
        });
        let response = parse_gemini_response(&value).unwrap();
        match response {
            LlmResponse::FunctionCall { call, .. } => {
                assert_eq!(call.name, "get_weather");
                let parsed: Value = serde_json::from_str(&call.arguments).unwrap();
                assert_eq!(parsed["city"], json!("Paris"));
            }
            other => panic!("expected function call, got {other:?}"),
        }
    }

    #[test]
    fn missing_candidates_is_empty_response_error() {
        let value = json!({"candidates": []});
        let err = parse_gemini_response(&value).unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
