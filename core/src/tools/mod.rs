//! Tool Executor (spec §2 Module C, §4.3).
//!
//! Grounded in the teacher's `tools::trait::Tool` / `tools::mcp_adapter::McpToolAdapter`
//! pattern — a thin wrapper that resolves a fully-qualified name through the
//! registry's reverse map, dispatches into the matching `ServerConnection`,
//! and times the round trip.

use std::time::Instant;

use serde_json::Value;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::mcp::{McpError, SharedRegistry};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error(transparent)]
    Mcp(#[from] McpError),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::UnknownTool(_) => ErrorKind::UnknownTool,
            ToolError::Mcp(e) => e.kind(),
        }
    }
}

/// The VALIDATION substring markers spec §4.3 names verbatim. Matched
/// case-insensitively against the failure message — tool servers rarely
/// report a structured error code, just a string.
const VALIDATION_MARKERS: &[&str] =
    &["validation error", "required property", "missing", "invalid parameter"];

fn classify(error: &ToolError) -> ErrorKind {
    if matches!(error.kind(), ErrorKind::ServerUnavailable | ErrorKind::Timeout | ErrorKind::UnknownTool) {
        return error.kind();
    }
    let text = error.to_string().to_ascii_lowercase();
    if VALIDATION_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorKind::Validation
    } else {
        error.kind()
    }
}

#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Success { result_text: String },
    Failure { error_message: String, error_kind: ErrorKind },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }
}

/// Immutable record appended to the current turn's execution log (spec §3).
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub tool_name: String,
    pub arguments: Value,
    pub outcome: ToolOutcome,
    pub elapsed_millis: u64,
}

impl ToolExecution {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

pub struct ToolExecutor {
    registry: SharedRegistry,
}

impl ToolExecutor {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// `execute` (spec §4.3): resolves, dispatches, times, and classifies.
    /// Never returns `Err` — failure is data, represented as
    /// `ToolOutcome::Failure` inside the returned [`ToolExecution`], per
    /// spec.md §9's "exception-as-control-flow" redesign flag.
    pub async fn execute(&self, fully_qualified_name: &str, arguments: Value) -> ToolExecution {
        let start = Instant::now();

        let Some((server_name, local_name)) = self.registry.resolve(fully_qualified_name) else {
            return ToolExecution {
                tool_name: fully_qualified_name.to_string(),
                arguments,
                outcome: ToolOutcome::Failure {
                    error_message: format!("unknown tool '{fully_qualified_name}'"),
                    error_kind: ErrorKind::UnknownTool,
                },
                elapsed_millis: elapsed_ms(start),
            };
        };

        match self.registry.call_tool(&server_name, &local_name, arguments.clone()).await {
            Ok(result_text) => ToolExecution {
                tool_name: fully_qualified_name.to_string(),
                arguments,
                outcome: ToolOutcome::Success { result_text },
                elapsed_millis: elapsed_ms(start),
            },
            Err(mcp_err) => {
                let tool_err = ToolError::from(mcp_err);
                let error_kind = classify(&tool_err);
                ToolExecution {
                    tool_name: fully_qualified_name.to_string(),
                    arguments,
                    outcome: ToolOutcome::Failure { error_message: tool_err.to_string(), error_kind },
                    elapsed_millis: elapsed_ms(start),
                }
            }
        }
    }

    /// Chain mode (ToolUse strategy, spec §4.3): executes `calls` in order,
    /// stopping at the first failure. Always returns at least one record
    /// when `calls` is non-empty.
    pub async fn execute_chain(&self, calls: Vec<(String, Value)>) -> Vec<ToolExecution> {
        let mut executions = Vec::with_capacity(calls.len());
        for (name, args) in calls {
            let execution = self.execute(&name, args).await;
            let succeeded = execution.is_success();
            executions.push(execution);
            if !succeeded {
                break;
            }
        }
        executions
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::McpRegistry;

    async fn empty_registry() -> SharedRegistry {
        std::sync::Arc::new(McpRegistry::connect_all(vec![]).await)
    }

    #[tokio::test]
    async fn unknown_tool_name_is_classified_correctly() {
        let registry = empty_registry().await;
        let executor = ToolExecutor::new(registry);
        let execution = executor.execute("nope_tool", serde_json::json!({})).await;
        match execution.outcome {
            ToolOutcome::Failure { error_kind, .. } => assert_eq!(error_kind, ErrorKind::UnknownTool),
            ToolOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn elapsed_millis_is_never_negative() {
        let registry = empty_registry().await;
        let executor = ToolExecutor::new(registry);
        let execution = executor.execute("nope_tool", serde_json::json!({})).await;
        // u64 can't be negative, but this documents property P2 explicitly.
        assert!(execution.elapsed_millis < u64::MAX);
    }

    #[tokio::test]
    async fn chain_mode_returns_one_record_and_stops_on_first_failure() {
        let registry = empty_registry().await;
        let executor = ToolExecutor::new(registry);
        let executions = executor
            .execute_chain(vec![
                ("nope_a".to_string(), serde_json::json!({})),
                ("nope_b".to_string(), serde_json::json!({})),
            ])
            .await;
        assert_eq!(executions.len(), 1);
        assert!(!executions[0].is_success());
    }

    #[test]
    fn validation_markers_are_matched_case_insensitively() {
        let err = ToolError::Mcp(McpError::JsonRpc("Required Property 'timezone' is missing".to_string()));
        assert_eq!(classify(&err), ErrorKind::Validation);
    }

    #[test]
    fn non_validation_server_error_keeps_its_original_kind() {
        let err = ToolError::Mcp(McpError::JsonRpc("internal server panic".to_string()));
        assert_eq!(classify(&err), ErrorKind::ServerError);
    }
}
