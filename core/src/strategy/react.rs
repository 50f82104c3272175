//! ReAct strategy (spec §4.4.2): a bounded Thought/Action/Observation loop.
//!
//! Grounded in the teacher's `agent::react` node-loop shape (think → decide
//! → act → observe → repeat) but flattened into a single method instead of a
//! generic state-graph, per spec.md's simpler Engine/Strategy split.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmRequest, LlmResponse, ToolDefinition};
use crate::message::{ConversationMemory, Message};
use crate::tools::ToolExecutor;

use super::{extract_json_object, recent_history_prompt, render_tool_table, InferenceStrategy};

const DEFAULT_MAX_ITERATIONS: usize = 10;
const FINAL_ANSWER_MARKER: &str = "FINAL ANSWER:";
const ACTION_MARKERS: &[&str] = &["NEED ACTION:", "ACTION:", "USE TOOL", "CALL TOOL"];

const SYSTEM_PROMPT_TEMPLATE: &str = "You are a reasoning agent that solves problems step by step, \
using the ReAct pattern (Thought, Action, Observation).\n\
\n\
Tools available:\n\
{tools}\n\
\n\
On each turn, write a single Thought. If you need a tool, follow it with one of:\n\
NEED ACTION: FUNCTION_CALL:<fully_qualified_tool_name>:<json_arguments>\n\
or a JSON array of such calls. Once you have enough information, write:\n\
FINAL ANSWER: <your answer>\n\
\n\
Recent conversation:\n\
{history}";

pub struct ReActStrategy {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    tools: Vec<ToolDefinition>,
    max_iterations: usize,
}

impl ReActStrategy {
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolExecutor, tools: Vec<ToolDefinition>) -> Self {
        Self { llm, executor, tools, max_iterations: DEFAULT_MAX_ITERATIONS }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn has_action_marker(text: &str) -> bool {
        let upper = text.to_ascii_uppercase();
        ACTION_MARKERS.iter().any(|m| upper.contains(m))
    }

    fn find_final_answer(text: &str) -> Option<String> {
        let idx = text.find(FINAL_ANSWER_MARKER)?;
        Some(text[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string())
    }

    /// Parses one or more `FUNCTION_CALL:<name>:<json>` directives, or a bare
    /// JSON array of `{"name": ..., "arguments": {...}}` objects — spec
    /// §4.4.2 allows either shape for a multi-call action line.
    fn parse_actions(text: &str) -> Vec<(String, serde_json::Value)> {
        let mut actions = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("FUNCTION_CALL:") {
                if let Some((name, json_part)) = rest.split_once(':') {
                    let args = extract_json_object(json_part).unwrap_or_else(|| serde_json::json!({}));
                    actions.push((name.trim().to_string(), args));
                }
            }
        }

        if actions.is_empty() {
            if let Some(array) = extract_json_array(text) {
                for item in array {
                    if let (Some(name), args) = (
                        item.get("name").and_then(serde_json::Value::as_str),
                        item.get("arguments").cloned().unwrap_or_else(|| serde_json::json!({})),
                    ) {
                        actions.push((name.to_string(), args));
                    }
                }
            }
        }

        actions
    }
}

fn extract_json_array(text: &str) -> Option<Vec<serde_json::Value>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[async_trait]
impl InferenceStrategy for ReActStrategy {
    async fn process_query(&mut self, text: &str, memory: &mut ConversationMemory) -> String {
        memory.push(Message::user(text));

        let system_prompt = self.build_system_prompt(memory);
        let mut transcript: Vec<Message> = vec![Message::user(text)];
        let mut thoughts: Vec<String> = Vec::new();

        for iteration in 0..self.max_iterations {
            let request =
                LlmRequest::new(transcript.clone()).with_system_prompt(system_prompt.clone()).with_tools(self.tools.clone());

            let response = match self.llm.invoke(request).await {
                Ok(LlmResponse::Text { content, .. }) => content,
                Ok(LlmResponse::FunctionCall { call, .. }) => {
                    format!("NEED ACTION: FUNCTION_CALL:{}:{}", call.name, call.arguments)
                }
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

            tracing::debug!(iteration, response = %response, "react step");

            if let Some(answer) = Self::find_final_answer(&response) {
                memory.push(Message::assistant(answer.clone()));
                return answer;
            }

            thoughts.push(response.clone());
            transcript.push(Message::assistant(response.clone()));

            if !Self::has_action_marker(&response) {
                // No action requested and no FINAL ANSWER marker — nudge the
                // model rather than looping forever on ambiguous output.
                transcript.push(Message::user(
                    "Continue reasoning. If you are done, begin your reply with FINAL ANSWER:",
                ));
                continue;
            }

            let actions = Self::parse_actions(&response);
            if actions.is_empty() {
                transcript.push(Message::user(
                    "I could not parse an action from that. Use FUNCTION_CALL:<tool>:<json args> or FINAL ANSWER:",
                ));
                continue;
            }

            for (name, args) in actions {
                let execution = self.executor.execute(&name, args).await;
                let observation = match &execution.outcome {
                    crate::tools::ToolOutcome::Success { result_text } => result_text.clone(),
                    crate::tools::ToolOutcome::Failure { error_message, .. } => {
                        format!("error: {error_message}")
                    }
                };
                transcript.push(Message::user(format!("Observation ({name}): {observation}")));
            }
        }

        // Iteration budget exhausted (spec §4.4.2 scenario 6): fall back to
        // the concatenated thoughts rather than an empty reply.
        let fallback = if thoughts.is_empty() {
            "I was unable to reach a conclusion within the iteration budget.".to_string()
        } else {
            thoughts.join("\n")
        };
        memory.push(Message::assistant(fallback.clone()));
        fallback
    }

    fn build_system_prompt(&self, memory: &ConversationMemory) -> String {
        SYSTEM_PROMPT_TEMPLATE
            .replace("{tools}", &render_tool_table(&self.tools))
            .replace("{history}", &recent_history_prompt(memory, 10))
    }
}
