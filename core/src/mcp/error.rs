use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("spawning MCP server process: {0}")]
    Spawn(String),

    #[error("MCP transport: {0}")]
    Transport(String),

    #[error("MCP request timed out")]
    Timeout,

    #[error("MCP initialize handshake failed: {0}")]
    Initialize(String),

    #[error("MCP server returned a JSON-RPC error: {0}")]
    JsonRpc(String),

    #[error("malformed MCP message: {0}")]
    Protocol(String),

    #[error("server '{0}' is not READY")]
    ServerUnavailable(String),

    #[error("duplicate fully-qualified tool name '{0}' (configuration error)")]
    DuplicateToolName(String),
}

impl McpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::Spawn(_) | McpError::Transport(_) => ErrorKind::Transport,
            McpError::Timeout => ErrorKind::Timeout,
            McpError::Initialize(_) | McpError::JsonRpc(_) | McpError::Protocol(_) => {
                ErrorKind::ServerError
            }
            McpError::ServerUnavailable(_) => ErrorKind::ServerUnavailable,
            McpError::DuplicateToolName(_) => ErrorKind::ServerError,
        }
    }
}
