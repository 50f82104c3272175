//! ToolUse strategy (spec §4.4.3): heuristically scores candidate tools for a
//! quick single-tool match, falls back to asking the model to pick a direct
//! answer or a (possibly chained) tool plan, separately extracts/corrects
//! each tool call's JSON arguments against its schema, and keeps a per-tool
//! success-rate register that nudges future scoring.
//!
//! Grounded in the teacher's `agent::tools::scoring` weighted-ranking code
//! and its `dashmap`-backed learning state; the domain hint blocks below
//! mirror the teacher's per-intent prompt-augmentation helpers.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ErrorKind;
use crate::llm::{LlmClient, LlmRequest, LlmResponse, ToolDefinition};
use crate::message::{ConversationMemory, Message};
use crate::tools::{ToolExecutor, ToolOutcome};
use weft_config::workspace_path;

use super::entities::{classify_complexity, detect_entities, Complexity};
use super::{extract_json_object, recent_history_prompt, render_tool_table, InferenceStrategy};

const MAX_RETRIES: usize = 2;
const MAX_TOOL_CHAIN_LENGTH: usize = 3;
const DIRECT_RESPONSE_MARKER: &str = "DIRECT_RESPONSE";
const USE_TOOL_MARKER: &str = "USE_TOOL:";
const TOOL_CHAIN_MARKER: &str = "TOOL_CHAIN:";

/// Minimum weighted score (spec §4.4.3's 40/30/20/10 split) a single ranked
/// tool must clear to skip the classification round-trip entirely.
const SINGLE_TOOL_MATCH_THRESHOLD: f64 = 0.5;

/// Zone assumed for a query naming an ambiguous place ("Brazil", "here")
/// with no specific city — overridable per deployment via
/// [`ToolUseStrategy::with_default_timezone`].
const DEFAULT_AMBIGUOUS_TIMEZONE: &str = "America/Sao_Paulo";

const SYSTEM_PROMPT_TEMPLATE: &str = "You are an assistant that decides how to answer a query.\n\
\n\
Tools available:\n\
{tools}\n\
\n\
Respond with exactly one line:\n\
DIRECT_RESPONSE: <answer>             — if no tool is needed\n\
USE_TOOL:<fully_qualified_tool_name>   — for a single tool call\n\
TOOL_CHAIN:<name1>,<name2>,...        — to chain up to 3 tools in order\n\
\n\
Recent conversation:\n\
{history}";

/// Tracks each tool's observed success rate in [0, 1], seeded at 0.5 (no
/// prior) and nudged ±0.1 per outcome (spec §4.4.3 learning register).
#[derive(Default)]
pub struct ToolLearningRegister {
    success_rate: DashMap<String, f64>,
}

impl ToolLearningRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(&self, tool_name: &str) -> f64 {
        self.success_rate.get(tool_name).map(|r| *r).unwrap_or(0.5)
    }

    pub fn record(&self, tool_name: &str, succeeded: bool) {
        let mut entry = self.success_rate.entry(tool_name.to_string()).or_insert(0.5);
        let delta = if succeeded { 0.1 } else { -0.1 };
        *entry = (*entry + delta).clamp(0.0, 1.0);
    }
}

/// Weighted score for one candidate tool against a query: 40% description
/// keyword overlap, 30% entity-kind relevance, 20% historical success rate,
/// 10% a small prior favoring namespaced tool names (spec §4.4.3's 40/30/20/10
/// split).
fn score_tool(tool: &ToolDefinition, query_lower: &str, entity_count: usize, register: &ToolLearningRegister) -> f64 {
    let description_lower = tool.description.to_ascii_lowercase();
    let keyword_overlap = description_lower
        .split_whitespace()
        .filter(|w| w.len() > 3 && query_lower.contains(w))
        .count() as f64;
    let keyword_score = (keyword_overlap / 5.0).min(1.0);

    let entity_score = if entity_count > 0 { 1.0 } else { 0.3 };

    let history_score = register.rate(&tool.name);

    let specificity_score = if tool.name.contains('_') { 0.8 } else { 0.5 };

    0.4 * keyword_score + 0.3 * entity_score + 0.2 * history_score + 0.1 * specificity_score
}

fn rank_tools<'a>(
    tools: &'a [ToolDefinition],
    query: &str,
    entity_count: usize,
    register: &ToolLearningRegister,
) -> Vec<(&'a ToolDefinition, f64)> {
    let query_lower = query.to_ascii_lowercase();
    let mut scored: Vec<_> =
        tools.iter().map(|t| (t, score_tool(t, &query_lower, entity_count, register))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Place name → IANA timezone lookup used by [`timezone_hint`]. Not
/// exhaustive — covers the cities that show up in the end-to-end scenarios
/// and a handful of other common ones; anything else falls through to the
/// configured default zone.
const TIMEZONE_LOOKUP: &[(&str, &str)] = &[
    ("new york", "America/New_York"),
    ("los angeles", "America/Los_Angeles"),
    ("chicago", "America/Chicago"),
    ("toronto", "America/Toronto"),
    ("mexico city", "America/Mexico_City"),
    ("sao paulo", "America/Sao_Paulo"),
    ("rio de janeiro", "America/Sao_Paulo"),
    ("brazil", "America/Sao_Paulo"),
    ("lisbon", "Europe/Lisbon"),
    ("london", "Europe/London"),
    ("paris", "Europe/Paris"),
    ("berlin", "Europe/Berlin"),
    ("moscow", "Europe/Moscow"),
    ("dubai", "Asia/Dubai"),
    ("mumbai", "Asia/Kolkata"),
    ("beijing", "Asia/Shanghai"),
    ("tokyo", "Asia/Tokyo"),
    ("sydney", "Australia/Sydney"),
];

/// Time/timezone hint block: an IANA-name requirement plus a small
/// place-name lookup table, and a default zone for ambiguous places
/// ("Brazil", "here") with no single matching city.
fn timezone_hint(default_timezone: &str) -> String {
    let mut out = String::from(
        "Hint: pass an IANA timezone name (e.g. America/Los_Angeles), never an abbreviation or UTC offset. \
         Common place names:\n",
    );
    for (place, zone) in TIMEZONE_LOOKUP {
        out.push_str(&format!("  {place} -> {zone}\n"));
    }
    out.push_str(&format!(
        "If the query names an ambiguous place (e.g. \"Brazil\" or \"here\") with no more specific city, use {default_timezone}.\n"
    ));
    out
}

fn feed_hint() -> String {
    "Hint: RSS/feed tools require a `url` argument starting with \"https://\" — a bare domain like \
     \"example.com\" must be expanded to its feed URL (e.g. \"https://example.com/feed\"), never passed as-is.\n"
        .to_string()
}

fn forecast_hint() -> String {
    "Hint: forecast/weather tools require numeric `latitude` and `longitude` arguments, not a city name string.\n"
        .to_string()
}

/// File-write hint: resolves the workspace-relative path through
/// [`workspace_path::expand_with_process_env`] so the model is steered
/// toward an absolute path rather than a relative one the tool server can't
/// resolve.
fn file_hint() -> String {
    match workspace_path::expand_with_process_env("./") {
        Ok(workspace) => format!(
            "Hint: file write/create arguments must use an absolute path under the workspace ({workspace}), \
             never a relative path or bare filename.\n"
        ),
        Err(_) => String::new(),
    }
}

/// Domain hint blocks keyed on the tool's own name (spec §4.4.3) — these run
/// on every extraction/correction prompt for a matching tool, independent of
/// how the user phrased their query.
fn domain_hints_for_tool(tool_name: &str, default_timezone: &str) -> String {
    let name_lower = tool_name.to_ascii_lowercase();
    let mut hints = String::new();
    if name_lower.contains("time") || name_lower.contains("timezone") {
        hints.push_str(&timezone_hint(default_timezone));
    }
    if name_lower.contains("feed") || name_lower.contains("rss") {
        hints.push_str(&feed_hint());
    }
    if name_lower.contains("forecast") || name_lower.contains("weather") {
        hints.push_str(&forecast_hint());
    }
    if name_lower.contains("write") || name_lower.contains("create") || name_lower.contains("file") {
        hints.push_str(&file_hint());
    }
    hints
}

/// Targeted hints for the correction prompt, keyed on what the failed tool's
/// own error message mentions rather than the tool's name — a generic tool
/// whose schema happens to have a `timezone` field still gets the timezone
/// table nudge once validation actually complains about it.
fn targeted_hints_for_error(error_message: &str, default_timezone: &str) -> String {
    let lower = error_message.to_ascii_lowercase();
    let mut hints = String::new();
    if lower.contains("timezone") {
        hints.push_str(&timezone_hint(default_timezone));
    }
    if lower.contains("url") {
        hints.push_str(&feed_hint());
    }
    hints
}

enum Plan {
    Direct(String),
    SingleTool(String),
    Chain(Vec<String>),
}

/// Parses the classification directive (spec §4.4.3 step 3): exactly one of
/// `DIRECT_RESPONSE`, `USE_TOOL:<name>`, or `TOOL_CHAIN:<n1>,<n2>,...` — no
/// JSON arguments live on this line; those are extracted separately per tool.
fn parse_plan(text: &str, tools: &[ToolDefinition]) -> Plan {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix(DIRECT_RESPONSE_MARKER) {
        return Plan::Direct(rest.trim_start_matches(':').trim().to_string());
    }
    if let Some(rest) = trimmed.strip_prefix(USE_TOOL_MARKER) {
        let name = rest.split(':').next().unwrap_or(rest).trim();
        if !name.is_empty() {
            return Plan::SingleTool(name.to_string());
        }
    }
    if let Some(rest) = trimmed.strip_prefix(TOOL_CHAIN_MARKER) {
        let names: Vec<String> = rest
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(MAX_TOOL_CHAIN_LENGTH)
            .collect();
        if !names.is_empty() {
            return Plan::Chain(names);
        }
    }

    // No recognized marker: if the whole response names exactly one known
    // tool, treat it as a single-tool plan; otherwise fall back to a direct
    // answer using the raw text.
    if let Some(tool) = tools.iter().find(|t| trimmed.contains(&t.name)) {
        return Plan::SingleTool(tool.name.clone());
    }
    Plan::Direct(trimmed.to_string())
}

pub struct ToolUseStrategy {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    tools: Vec<ToolDefinition>,
    register: ToolLearningRegister,
    default_timezone: String,
}

impl ToolUseStrategy {
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolExecutor, tools: Vec<ToolDefinition>) -> Self {
        Self {
            llm,
            executor,
            tools,
            register: ToolLearningRegister::new(),
            default_timezone: DEFAULT_AMBIGUOUS_TIMEZONE.to_string(),
        }
    }

    /// Overrides the zone assumed for an ambiguous place name with no exact
    /// match in [`TIMEZONE_LOOKUP`] (spec §4.4.3's configurable default).
    pub fn with_default_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.default_timezone = timezone.into();
        self
    }

    fn find_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// `extractParametersWithLLM` (spec §4.4.3): prompts with the tool's full
    /// JSON schema pretty-printed, the user query, the previous chain step's
    /// result text when there is one, and any hints the tool's own name
    /// triggers.
    async fn extract_parameters(
        &self,
        tool: &ToolDefinition,
        query: &str,
        prior_result: Option<&str>,
    ) -> serde_json::Value {
        let schema = serde_json::to_string_pretty(&tool.parameters).unwrap_or_else(|_| "{}".to_string());
        let mut prompt =
            format!("Tool: {}\nUser query: \"{}\"\nJSON schema for arguments:\n{}\n", tool.name, query, schema);

        if let Some(prior) = prior_result {
            prompt.push_str(&format!("\nResult of the previous step in this tool chain:\n{prior}\n"));
        }

        let hints = domain_hints_for_tool(&tool.name, &self.default_timezone);
        if !hints.is_empty() {
            prompt.push_str(&format!("\n{hints}"));
        }
        prompt.push_str("\nReply with only the JSON arguments object, no prose.");

        self.invoke_for_arguments(prompt).await
    }

    /// `correctParametersWithLLM` (spec §4.4.3): re-prompts with the failed
    /// arguments and the verbatim validation error, plus the same tool-name
    /// hints `extract_parameters` uses and any additional hint the error
    /// message itself calls for (e.g. it mentions "timezone" even though the
    /// tool's name doesn't).
    async fn correct_parameters(
        &self,
        tool: &ToolDefinition,
        query: &str,
        prev_args: &serde_json::Value,
        error_message: &str,
        prior_result: Option<&str>,
    ) -> serde_json::Value {
        let schema = serde_json::to_string_pretty(&tool.parameters).unwrap_or_else(|_| "{}".to_string());
        let mut prompt = format!(
            "Tool: {}\nUser query: \"{}\"\nJSON schema for arguments:\n{}\nPrevious arguments: {}\nThe call failed validation: {}\n",
            tool.name, query, schema, prev_args, error_message
        );

        if let Some(prior) = prior_result {
            prompt.push_str(&format!("\nResult of the previous step in this tool chain:\n{prior}\n"));
        }

        let mut hints = domain_hints_for_tool(&tool.name, &self.default_timezone);
        hints.push_str(&targeted_hints_for_error(error_message, &self.default_timezone));
        if !hints.is_empty() {
            prompt.push_str(&format!("\n{hints}"));
        }
        prompt.push_str("\nReply with only the corrected JSON arguments object, no prose.");

        self.invoke_for_arguments(prompt).await
    }

    async fn invoke_for_arguments(&self, prompt: String) -> serde_json::Value {
        let request = LlmRequest::new(vec![Message::user(prompt)]);
        match self.llm.invoke(request).await {
            Ok(LlmResponse::Text { content, .. }) => {
                extract_json_object(&content).unwrap_or_else(|| serde_json::json!({}))
            }
            Ok(LlmResponse::FunctionCall { call, .. }) => {
                serde_json::from_str(&call.arguments).unwrap_or_else(|_| serde_json::json!({}))
            }
            _ => serde_json::json!({}),
        }
    }

    /// `executeWithLLMRetry` (spec §4.4.3): extracts arguments, executes,
    /// and on a VALIDATION failure re-extracts via [`Self::correct_parameters`]
    /// up to `MAX_RETRIES` times — at most `MAX_RETRIES + 1 = 3` executor
    /// calls total (spec property P4).
    async fn execute_with_retry(&mut self, tool_name: &str, query: &str, prior_result: Option<&str>) -> String {
        let tool = match self.find_tool(tool_name) {
            Some(t) => t.clone(),
            None => return format!("error calling {tool_name}: unknown tool"),
        };

        let mut attempt = 0;
        let mut args = self.extract_parameters(&tool, query, prior_result).await;

        loop {
            let execution = self.executor.execute(&tool.name, args.clone()).await;
            let succeeded = execution.is_success();
            self.register.record(&tool.name, succeeded);

            match execution.outcome {
                ToolOutcome::Success { result_text } => return result_text,
                ToolOutcome::Failure { error_message, error_kind } => {
                    if error_kind != ErrorKind::Validation || attempt >= MAX_RETRIES {
                        return format!("error calling {}: {error_message}", tool.name);
                    }
                    args = self.correct_parameters(&tool, query, &args, &error_message, prior_result).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Runs a `TOOL_CHAIN` plan (spec §4.4.3, capped at
    /// [`MAX_TOOL_CHAIN_LENGTH`]), threading each step's result text into the
    /// next step's argument extraction and halting on the first failure.
    async fn execute_chain(&mut self, names: Vec<String>, original_query: &str) -> String {
        let mut observations = Vec::new();
        let mut prior_result: Option<String> = None;

        for name in names {
            let observation = self.execute_with_retry(&name, original_query, prior_result.as_deref()).await;
            let failed = observation.starts_with("error calling");
            observations.push(format!("{name} -> {observation}"));
            if failed {
                break;
            }
            prior_result = Some(observation);
        }

        // Portuguese-language summary line, per spec.md §4.4.3's ToolUse
        // chain-result formatting.
        format!("Resultados da cadeia de ferramentas:\n{}", observations.join("\n"))
    }
}

#[async_trait]
impl InferenceStrategy for ToolUseStrategy {
    async fn process_query(&mut self, text: &str, memory: &mut ConversationMemory) -> String {
        memory.push(Message::user(text));

        if self.tools.is_empty() {
            let system_prompt = self.build_system_prompt(memory);
            let request = LlmRequest::new(memory.history().to_vec()).with_system_prompt(system_prompt);
            let reply = match self.llm.invoke(request).await {
                Ok(LlmResponse::Text { content, .. }) => content,
                Ok(_) => "I don't have a tool or a direct answer for that.".to_string(),
                Err(e) => format!("I couldn't reach the language model: {e}"),
            };
            memory.push(Message::assistant(reply.clone()));
            return reply;
        }

        let entities = detect_entities(text);
        let complexity = classify_complexity(text, &entities);

        // Step 1 (spec §4.4.3): a query complex enough to plausibly need
        // more than one tool skips the quick match and goes straight to
        // classification, which can emit a TOOL_CHAIN directive. Simpler
        // queries get a chance at the threshold-gated fast path first.
        if complexity != Complexity::Complex {
            let ranked = rank_tools(&self.tools, text, entities.len(), &self.register);
            if let Some((top_tool, score)) = ranked.first() {
                if *score >= SINGLE_TOOL_MATCH_THRESHOLD {
                    let name = top_tool.name.clone();
                    let reply = self.execute_with_retry(&name, text, None).await;
                    memory.push(Message::assistant(reply.clone()));
                    return reply;
                }
            }
        }

        let system_prompt = self.build_system_prompt(memory);
        let request = LlmRequest::new(memory.history().to_vec())
            .with_system_prompt(system_prompt)
            .with_tools(self.tools.clone());

        let plan = match self.llm.invoke(request).await {
            Ok(LlmResponse::Text { content, .. }) => parse_plan(&content, &self.tools),
            Ok(LlmResponse::FunctionCall { call, .. }) => Plan::SingleTool(call.name),
            Ok(LlmResponse::Error { message, .. }) => {
                let reply = format!("The model reported an error: {message}");
                memory.push(Message::assistant(reply.clone()));
                return reply;
            }
            Err(e) => {
                let reply = format!("I couldn't reach the language model: {e}");
                memory.push(Message::assistant(reply.clone()));
                return reply;
            }
        };

        let reply = match plan {
            Plan::Direct(answer) => answer,
            Plan::SingleTool(name) => self.execute_with_retry(&name, text, None).await,
            Plan::Chain(names) => self.execute_chain(names, text).await,
        };

        memory.push(Message::assistant(reply.clone()));
        reply
    }

    fn build_system_prompt(&self, memory: &ConversationMemory) -> String {
        SYSTEM_PROMPT_TEMPLATE
            .replace("{tools}", &render_tool_table(&self.tools))
            .replace("{history}", &recent_history_prompt(memory, 10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlm};
    use crate::mcp::McpRegistry;

    async fn executor() -> ToolExecutor {
        ToolExecutor::new(Arc::new(McpRegistry::connect_all(vec![]).await))
    }

    fn tool(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            required: vec![],
        }
    }

    #[test]
    fn learning_register_starts_at_half_and_clamps_to_unit_interval() {
        let register = ToolLearningRegister::new();
        assert_eq!(register.rate("x"), 0.5);
        for _ in 0..20 {
            register.record("x", true);
        }
        assert_eq!(register.rate("x"), 1.0);
        for _ in 0..20 {
            register.record("x", false);
        }
        assert_eq!(register.rate("x"), 0.0);
    }

    #[test]
    fn parse_plan_reads_direct_response() {
        let plan = parse_plan("DIRECT_RESPONSE: the sky is blue", &[]);
        assert!(matches!(plan, Plan::Direct(ref s) if s == "the sky is blue"));
    }

    #[test]
    fn parse_plan_reads_single_tool_name_with_no_embedded_arguments() {
        let plan = parse_plan("USE_TOOL:time_get_current_time", &[]);
        match plan {
            Plan::SingleTool(name) => assert_eq!(name, "time_get_current_time"),
            _ => panic!("expected SingleTool"),
        }
    }

    #[test]
    fn parse_plan_reads_chain_and_caps_at_three() {
        let plan = parse_plan("TOOL_CHAIN:a,b,c,d,e", &[]);
        match plan {
            Plan::Chain(names) => assert_eq!(names, vec!["a", "b", "c"]),
            _ => panic!("expected Chain"),
        }
    }

    #[test]
    fn domain_hints_for_tool_mentions_timezone_table_for_time_tools() {
        let hints = domain_hints_for_tool("time_get_current_time", "America/Sao_Paulo");
        assert!(hints.contains("IANA timezone"));
        assert!(hints.contains("America/Sao_Paulo"));
    }

    #[test]
    fn domain_hints_for_tool_is_empty_for_unrelated_tool() {
        assert_eq!(domain_hints_for_tool("calc_add", "America/Sao_Paulo"), String::new());
    }

    #[test]
    fn targeted_hints_for_error_fires_on_message_content_not_tool_name() {
        // A generic tool whose schema happens to validate a timezone field —
        // the hint must come from the error text, not the tool's own name.
        let hints = targeted_hints_for_error("required property 'timezone' is missing", "America/Sao_Paulo");
        assert!(hints.contains("IANA timezone"));
        assert!(!targeted_hints_for_error("required property 'count' is missing", "America/Sao_Paulo")
            .contains("IANA timezone"));
    }

    #[test]
    fn rank_tools_orders_by_descending_score() {
        let tools = vec![
            tool("weather_get_forecast", "get the weather forecast for a city"),
            tool("ping_tool", "replies pong"),
        ];
        let register = ToolLearningRegister::new();
        let ranked = rank_tools(&tools, "what's the weather forecast today", 1, &register);
        assert_eq!(ranked[0].0.name, "weather_get_forecast");
    }

    #[tokio::test]
    async fn direct_response_plan_skips_tool_execution() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("DIRECT_RESPONSE: 4")]));
        let mut strategy = ToolUseStrategy::new(llm, executor().await, vec![tool("calc_add", "adds numbers")]);
        let mut memory = ConversationMemory::new();
        let reply = strategy.process_query("what is 2+2?", &mut memory).await;
        assert_eq!(reply, "4");
    }

    #[tokio::test]
    async fn single_tool_plan_against_unknown_tool_reports_error_without_panicking() {
        // "nonexistent_tool" is named only in the classify reply, never
        // registered, so find_tool fails before any extraction call is made.
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("USE_TOOL:nonexistent_tool")]));
        let mut strategy =
            ToolUseStrategy::new(llm, executor().await, vec![tool("other_tool", "does something else entirely")]);
        let mut memory = ConversationMemory::new();
        let reply = strategy.process_query("do a thing with other stuff", &mut memory).await;
        assert!(reply.contains("error calling nonexistent_tool"));
    }

    #[tokio::test]
    async fn tool_chain_plan_produces_portuguese_summary_header() {
        let llm = Arc::new(MockLlm::new(vec![
            LlmResponse::text("TOOL_CHAIN:nope_a,nope_b"),
            LlmResponse::text("{}"),
        ]));
        let mut strategy =
            ToolUseStrategy::new(llm, executor().await, vec![tool("nope_a", "does nothing registered")]);
        let mut memory = ConversationMemory::new();
        let reply = strategy.process_query("do two things", &mut memory).await;
        assert!(reply.starts_with("Resultados da cadeia de ferramentas:"));
    }

    #[tokio::test]
    async fn confident_single_match_skips_the_classification_call_entirely() {
        // "weather_get_forecast" shares several >3-letter words with the
        // query and scores above the quick-match threshold, so only the
        // (unregistered, thus failing) extraction call should ever reach
        // the mock — never a classify call.
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("{}")]));
        let mock_ref = Arc::clone(&llm);
        let mut strategy = ToolUseStrategy::new(
            llm,
            executor().await,
            vec![tool("weather_get_forecast", "get the weather forecast for a city")],
        );
        let mut memory = ConversationMemory::new();
        let _ = strategy.process_query("what's the weather forecast today", &mut memory).await;
        assert_eq!(mock_ref.call_count(), 1);
    }

    #[tokio::test]
    async fn complex_query_skips_quick_match_and_goes_straight_to_classification() {
        // Three entity kinds (location, email, time-conjunction) push this
        // past the Complex threshold, so even a high-scoring single tool
        // must not short-circuit the classify round-trip.
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("DIRECT_RESPONSE: done")]));
        let mock_ref = Arc::clone(&llm);
        let mut strategy = ToolUseStrategy::new(
            llm,
            executor().await,
            vec![tool("weather_get_forecast", "get the weather forecast for a city")],
        );
        let mut memory = ConversationMemory::new();
        let query = "check the weather forecast in Paris and then email ana@example.com";
        let reply = strategy.process_query(query, &mut memory).await;
        assert_eq!(reply, "done");
        assert_eq!(mock_ref.call_count(), 1);
    }

    #[tokio::test]
    async fn extraction_prompt_includes_prior_chain_step_result_when_present() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("{}")]));
        let mock_ref = Arc::clone(&llm);
        let strategy = ToolUseStrategy::new(llm, executor().await, vec![tool("file_write", "write to a file")]);
        let tool_def = tool("file_write", "write to a file");

        let _ = strategy.extract_parameters(&tool_def, "write it to a file", Some("Paris: 22C, sunny")).await;

        let prompt = mock_ref.last_request().unwrap().messages[0].content.clone();
        assert!(prompt.contains("Result of the previous step in this tool chain"));
        assert!(prompt.contains("Paris: 22C, sunny"));
    }

    #[tokio::test]
    async fn extraction_prompt_omits_prior_result_block_for_a_standalone_call() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("{}")]));
        let mock_ref = Arc::clone(&llm);
        let strategy = ToolUseStrategy::new(llm, executor().await, vec![tool("file_write", "write to a file")]);
        let tool_def = tool("file_write", "write to a file");

        let _ = strategy.extract_parameters(&tool_def, "write it to a file", None).await;

        let prompt = mock_ref.last_request().unwrap().messages[0].content.clone();
        assert!(!prompt.contains("Result of the previous step in this tool chain"));
    }

    #[tokio::test]
    async fn correction_prompt_carries_schema_and_tool_name_hints() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("{}")]));
        let mock_ref = Arc::clone(&llm);
        let strategy =
            ToolUseStrategy::new(llm, executor().await, vec![tool("time_get_current_time", "current time")]);
        let tool_def = ToolDefinition {
            name: "time_get_current_time".to_string(),
            description: "current time".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {"timezone": {"type": "string"}}}),
            required: vec!["timezone".to_string()],
        };

        let _ = strategy
            .correct_parameters(
                &tool_def,
                "what time is it in Brazil",
                &serde_json::json!({"timezone": "BRT"}),
                "required property 'timezone' is missing",
                None,
            )
            .await;

        let prompt = mock_ref.last_request().unwrap().messages[0].content.clone();
        assert!(prompt.contains("\"timezone\""));
        assert!(prompt.contains("required property 'timezone' is missing"));
        assert!(prompt.contains("IANA timezone"));
    }
}
