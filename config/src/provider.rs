//! Per-provider settings resolved from `application.properties` + environment
//! (spec §6: `<provider>.base.url`, `<provider>.model`, `<provider>.timeout`,
//! `<provider>.debug`, `<provider>.api.key` for groq/gemini/claude/openai).

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderName {
    Groq,
    Gemini,
    Claude,
    OpenAi,
}

impl ProviderName {
    pub const ALL: [ProviderName; 4] =
        [ProviderName::Groq, ProviderName::Gemini, ProviderName::Claude, ProviderName::OpenAi];

    /// The `<provider>.` prefix used in `application.properties` keys.
    pub fn property_prefix(self) -> &'static str {
        match self {
            ProviderName::Groq => "groq",
            ProviderName::Gemini => "gemini",
            ProviderName::Claude => "claude",
            ProviderName::OpenAi => "openai",
        }
    }

    /// The environment variable spec §6 names for this provider's API key.
    pub fn env_var(self) -> &'static str {
        match self {
            ProviderName::Groq => "GROQ_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
            ProviderName::Claude => "ANTHROPIC_API_KEY",
            ProviderName::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property_prefix())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub debug: bool,
    pub api_key: Option<String>,
}

/// Resolves one provider's settings from the properties map, process
/// environment, and a session-scoped override layer.
///
/// Precedence for the API key specifically (spec §6): `GROQ_API_KEY` (etc.)
/// from the process environment and a session-scoped override carry equal
/// weight — both outrank `application.properties`. Between the two, this
/// resolver lets the session override win: it represents an explicit
/// in-session action (e.g. an interactive `/llm` setup step) taken *after*
/// the process started, so it is the more specific, more recent source of
/// truth (see DESIGN.md's Open Question decisions).
pub fn resolve_provider(
    provider: ProviderName,
    properties: &HashMap<String, String>,
    session_overrides: &HashMap<String, String>,
) -> ProviderConfig {
    let prefix = provider.property_prefix();
    let prop = |suffix: &str| properties.get(&format!("{prefix}.{suffix}")).cloned();

    let api_key = session_overrides
        .get(provider.env_var())
        .cloned()
        .or_else(|| std::env::var(provider.env_var()).ok())
        .or_else(|| prop("api.key"));

    ProviderConfig {
        base_url: prop("base.url"),
        model: prop("model"),
        timeout_secs: prop("timeout").and_then(|v| v.parse().ok()),
        debug: prop("debug").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false),
        api_key,
    }
}
