//! Unified error taxonomy for the agent core.
//!
//! Each module owns a narrow `thiserror::Error` enum; [`AgentError`] wraps all
//! of them with `#[from]` so the Engine and its callers can match on a single
//! type without losing the originating module's detail.

use thiserror::Error;

use crate::llm::LlmError;
use crate::mcp::McpError;
use crate::strategy::StrategyError;
use crate::tools::ToolError;

/// Top-level error kind, used for classification independent of which module
/// raised the error (spec §7's error taxonomy table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Transport,
    ProviderError,
    EmptyResponse,
    UnknownTool,
    ServerUnavailable,
    Validation,
    Timeout,
    ServerError,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("configuration: {0}")]
    Config(String),
}

impl AgentError {
    /// Classifies this error into the spec's error-kind taxonomy. Strategies
    /// use this (rather than matching on variants directly) to decide whether
    /// a failure is worth a repair-and-retry pass.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Llm(e) => e.kind(),
            AgentError::Mcp(e) => e.kind(),
            AgentError::Tool(e) => e.kind(),
            AgentError::Strategy(_) => ErrorKind::Input,
            AgentError::Config(_) => ErrorKind::Input,
        }
    }
}
