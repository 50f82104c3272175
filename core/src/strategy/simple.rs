//! Simple/Direct strategy (spec §4.4.1): a single round-trip, with one
//! optional tool call inline. No iteration, no retry on tool failure — the
//! cheapest strategy, meant for queries that plainly need at most one tool.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmRequest, LlmResponse, ToolDefinition};
use crate::message::{ConversationMemory, Message};
use crate::tools::ToolExecutor;

use super::{extract_json_object, recent_history_prompt, render_tool_table, InferenceStrategy};

const SYSTEM_PROMPT_TEMPLATE: &str = "You are a helpful assistant with access to the following tools:\n\
{tools}\n\
If a tool call would help answer the user, respond with exactly one line of the form:\n\
TOOL:<fully_qualified_tool_name>:<json_arguments>\n\
Otherwise answer directly in plain text.\n\
\n\
Recent conversation:\n\
{history}";

pub struct SimpleStrategy {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    tools: Vec<ToolDefinition>,
}

impl SimpleStrategy {
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolExecutor, tools: Vec<ToolDefinition>) -> Self {
        Self { llm, executor, tools }
    }

    /// Parses a `TOOL:<name>:<json>` directive line. Returns `None` when the
    /// response has no such line — the common "answered directly" path.
    fn parse_directive(text: &str) -> Option<(String, serde_json::Value)> {
        let line = text.lines().find(|l| l.trim_start().starts_with("TOOL:"))?;
        let rest = line.trim_start().strip_prefix("TOOL:")?;
        let (name, json_part) = rest.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let args = extract_json_object(json_part).unwrap_or_else(|| serde_json::json!({}));
        Some((name.to_string(), args))
    }
}

#[async_trait]
impl InferenceStrategy for SimpleStrategy {
    async fn process_query(&mut self, text: &str, memory: &mut ConversationMemory) -> String {
        memory.push(Message::user(text));

        let request = LlmRequest::new(memory.history().to_vec())
            .with_system_prompt(self.build_system_prompt(memory))
            .with_tools(self.tools.clone());

        let first = match self.llm.invoke(request).await {
            Ok(response) => response,
            Err(e) => {
                let reply = format!("I couldn't reach the language model: {e}");
                memory.push(Message::assistant(reply.clone()));
                return reply;
            }
        };

        let content = match &first {
            LlmResponse::Text { content, .. } => content.clone(),
            LlmResponse::FunctionCall { call, .. } => {
                format!("TOOL:{}:{}", call.name, call.arguments)
            }
            LlmResponse::Error { message, .. } => {
                let reply = format!("The model reported an error: {message}");
                memory.push(Message::assistant(reply.clone()));
                return reply;
            }
        };

        let Some((tool_name, args)) = Self::parse_directive(&content) else {
            memory.push(Message::assistant(content.clone()));
            return content;
        };

        let execution = self.executor.execute(&tool_name, args).await;
        let observation = match &execution.outcome {
            crate::tools::ToolOutcome::Success { result_text } => result_text.clone(),
            crate::tools::ToolOutcome::Failure { error_message, .. } => {
                format!("Tool call failed: {error_message}")
            }
        };

        let follow_up = LlmRequest::new(vec![
            Message::user(text),
            Message::assistant(content.clone()),
            Message::tool_result(tool_name.clone(), observation.clone()),
            Message::user("Using the tool result above, answer the original question in plain text."),
        ])
        .with_system_prompt(self.build_system_prompt(memory));

        let final_text = match self.llm.invoke(follow_up).await {
            Ok(LlmResponse::Text { content, .. }) => content,
            Ok(_) | Err(_) => observation,
        };

        memory.push(Message::assistant(final_text.clone()));
        final_text
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

    #[test]
    fn parse_directive_extracts_name_and_args() {
        let (name, args) = SimpleStrategy::parse_directive("TOOL:time_get_current_time:{\"timezone\": \"UTC\"}").unwrap();
        assert_eq!(name, "time_get_current_time");
        assert_eq!(args["timezone"], serde_json::json!("UTC"));
    }

    #[test]
    fn parse_directive_returns_none_for_plain_text() {
        assert!(SimpleStrategy::parse_directive("The answer is 42.").is_none());
    }

    #[test]
    fn parse_directive_defaults_to_empty_object_on_bad_json() {
        let (name, args) = SimpleStrategy::parse_directive("TOOL:ping:{not json}").unwrap();
        assert_eq!(name, "ping");
        assert_eq!(args, serde_json::json!({}));
    }

    #[tokio::test]
    async fn plain_text_response_is_returned_directly_without_tool_call() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("Paris is the capital of France.")]));
        let mut strategy = SimpleStrategy::new(llm, executor().await, vec![]);
        let mut memory = ConversationMemory::new();
        let reply = strategy.process_query("What is the capital of France?", &mut memory).await;
        assert_eq!(reply, "Paris is the capital of France.");
    }

    #[tokio::test]
    async fn unknown_tool_directive_surfaces_failure_as_final_answer_text() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("TOOL:nonexistent_tool:{}")]));
        let mut strategy = SimpleStrategy::new(llm, executor().await, vec![]);
        let mut memory = ConversationMemory::new();
        let reply = strategy.process_query("do a thing", &mut memory).await;
        assert!(reply.contains("Tool call failed"));
    }

    #[tokio::test]
    async fn successful_turn_appends_user_and_assistant_messages_to_memory() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("hello there")]));
        let mut strategy = SimpleStrategy::new(llm, executor().await, vec![]);
        let mut memory = ConversationMemory::new();
        strategy.process_query("hi", &mut memory).await;
        assert_eq!(memory.len(), 2);
    }
}
