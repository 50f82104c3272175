//! Groq adapter. Groq's chat-completions endpoint is OpenAI-compatible, so
//! this shares [`openai`](super::openai)'s wire shapes but talks to a
//! different base URL and model catalog.

use async_trait::async_trait;
use serde_json::json;

use super::{openai::build_openai_style_body, openai::parse_openai_style_response};
use super::{build_http_client, LlmClient, LlmError, LlmRequest, LlmResponse, DEFAULT_TIMEOUT_SECS};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct GroqClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GroqClient {
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

    /// Overrides the default 30s per-call timeout (spec §6 `groq.timeout`).
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.http = build_http_client(timeout_secs);
        self
    }
}

#[async_trait]
impl LlmClient for GroqClient {
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
            return Err(LlmError::Provider(format!("groq {status}: {text}")));
        }

        let value: serde_json::Value = resp.json().await.map_err(|e| LlmError::Provider(e.to_string()))?;
        parse_openai_style_response(&value)
    }

    fn provider_name(&self) -> &str {
        "groq"
    }
}
