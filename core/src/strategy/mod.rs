//! Inference Strategies (spec §2 Module D, §4.4).
//!
//! Three pluggable query processors — [`simple::SimpleStrategy`],
//! [`react::ReActStrategy`], [`tooluse::ToolUseStrategy`] — all implementing
//! the same [`InferenceStrategy`] capability, grounded in the teacher's
//! `agent::react` `Node<State>` shape but flattened to the simpler
//! Engine/Strategy model spec.md describes (no generic state-graph).
//!
//! Per spec.md §9's "dynamic casting between strategy subtypes" redesign
//! flag, callers never downcast a `Box<dyn InferenceStrategy>` back to a
//! concrete type — everything the Engine needs is on the trait.

pub mod entities;
pub mod react;
pub mod simple;
pub mod tooluse;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::llm::ToolDefinition;
use crate::message::{ConversationMemory, Role};

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no LLM response after {0} iterations")]
    MaxIterationsExceeded(usize),

    #[error("could not parse directive from model response: {0}")]
    UnparseableDirective(String),
}

impl StrategyError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Input
    }
}

/// A pluggable turn processor. The Engine owns [`ConversationMemory`] and
/// passes it in by mutable reference on every turn, rather than each
/// strategy holding its own copy — that's what lets memory survive a
/// hot-swap untouched (spec §4.6 property P5) instead of resetting every
/// time the Engine swaps the LLM client or strategy kind.
///
/// Strategies never close resources they don't own — only the Engine closes
/// the registry, and only at shutdown, never on hot-swap (spec.md §9
/// "per-inference subprocess lifecycle bugs").
#[async_trait]
pub trait InferenceStrategy: Send + Sync {
    async fn process_query(&mut self, text: &str, memory: &mut ConversationMemory) -> String;

    fn build_system_prompt(&self, memory: &ConversationMemory) -> String;

    /// No-op by default. A strategy with strategy-local state to flush
    /// (none currently do) would override this; it must never reach into
    /// the registry or any other shared resource.
    fn close(&mut self) {}
}

/// Renders the shared "name, description, parameter summary with `required`
/// flags" table every strategy includes in its prompts (spec §4.4.1 step 1).
pub fn render_tool_table(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return "(no tools available)".to_string();
    }
    let mut out = String::new();
    for tool in tools {
        let params = tool
            .parameters
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .map(|props| {
                props
                    .keys()
                    .map(|k| {
                        if tool.required.iter().any(|r| r == k) {
                            format!("{k}*")
                        } else {
                            k.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        out.push_str(&format!("- {}: {} (params: {})\n", tool.name, tool.description, params));
    }
    out
}

/// Formats up to `k` recent turns as alternating `User: … / Assistant: …`
/// lines (spec §4.5), skipping tool-result entries which have no natural
/// rendering in that two-speaker transcript shape.
pub fn recent_history_prompt(memory: &ConversationMemory, k: usize) -> String {
    let history = memory.history();
    let start = history.len().saturating_sub(k);
    let mut out = String::new();
    for message in &history[start..] {
        match message.role {
            Role::User => out.push_str(&format!("User: {}\n", message.content)),
            Role::Assistant => out.push_str(&format!("Assistant: {}\n", message.content)),
            Role::Tool | Role::System => {}
        }
    }
    out
}

/// Strips fenced code delimiters (``` or ```json) and decodes the outermost
/// `{...}` block as a JSON object. Used by every directive parser
/// (`TOOL:<name>:{...}`, `FUNCTION_CALL:<name>:{...}`, ToolUse's extraction
/// prompts) — on decode failure callers get `None` rather than an error,
/// since an empty map is the spec-mandated fallback that triggers the
/// correction/retry loop downstream.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let stripped = text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&stripped[start..=end]).ok()
}
