//! MCP Registry (spec §2 Module B, §4.2).
//!
//! Tracks configured tool servers, spawns the enabled ones in descending
//! `priority` order, and maintains the fully-qualified-name reverse map the
//! Tool Executor dispatches through. A server that fails to connect is
//! marked `FAILED` and skipped — registry startup itself never aborts for a
//! single bad server (zeroclaw's `connect_all` behavior). A fully-qualified
//! name collision across servers, by contrast, is a configuration error and
//! panics immediately (Codex's `mcp_connection_manager::list_all_tools`
//! invariant) — see spec.md §9's "name-splitting by convention" redesign
//! flag: the reverse map below exists precisely so nothing ever re-derives a
//! server name by splitting on `_`.

pub mod dependencies;
mod error;
pub mod manifest;
mod session;

pub use error::McpError;
pub use session::McpSession;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use dependencies::DependencyFlag;

use crate::llm::ToolDefinition;

#[derive(Debug, Clone)]
pub struct ServerDescriptor {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub description: String,
    pub enabled: bool,
    pub priority: u8,
    pub env: HashMap<String, String>,
    pub dependency_flags: HashSet<DependencyFlag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

/// One tool as listed by its server, before namespacing.
#[derive(Debug, Clone)]
pub struct LocalTool {
    pub local_name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// A live (or dead) connection to one configured server. Owns the stdio
/// session exclusively — the Tool Executor is the only caller that reaches
/// into `session`, and always through the registry, never directly.
pub struct ServerConnection {
    pub descriptor: ServerDescriptor,
    pub state: ConnectionState,
    pub tool_index: HashMap<String, LocalTool>,
    session: Option<McpSession>,
}

impl ServerConnection {
    fn failed(descriptor: ServerDescriptor) -> Self {
        Self { descriptor, state: ConnectionState::Failed, tool_index: HashMap::new(), session: None }
    }
}

/// Owns every [`ServerConnection`] and the fully-qualified-name reverse map.
/// The Engine holds this behind an `Arc` so it survives hot-swap untouched.
pub struct McpRegistry {
    servers: DashMap<String, ServerConnection>,
    /// fully-qualified name → (server name, local tool name)
    reverse: DashMap<String, (String, String)>,
}

fn fully_qualified_name(server: &str, local: &str) -> String {
    format!("{server}_{local}")
}

impl McpRegistry {
    /// Connects every enabled, dependency-satisfied descriptor in
    /// descending-priority order. Per-server failures are logged and leave
    /// that server `FAILED`; registry construction itself always succeeds.
    ///
    /// # Panics
    /// Panics if two servers' tools produce the same fully-qualified name —
    /// spec.md §3 calls this invariant violation a "fatal configuration
    /// error", and the panic is the loudest way to surface a misconfigured
    /// manifest immediately rather than silently shadowing one tool with
    /// another.
    pub async fn connect_all(mut descriptors: Vec<ServerDescriptor>) -> Self {
        descriptors.sort_by(|a, b| b.priority.cmp(&a.priority));

        let registry = Self { servers: DashMap::new(), reverse: DashMap::new() };

        for descriptor in descriptors {
            registry.connect_one(descriptor).await;
        }

        registry
    }

    async fn connect_one(&self, descriptor: ServerDescriptor) {
        let name = descriptor.name.clone();

        if !descriptor.enabled {
            tracing::info!(server = %name, "server disabled in manifest, skipping");
            self.servers.insert(name, ServerConnection::failed(descriptor));
            return;
        }

        if let Some(reason) = dependencies::unmet_reason(&descriptor.dependency_flags) {
            tracing::warn!(server = %name, reason, "dependency unmet, skipping");
            self.servers.insert(name, ServerConnection::failed(descriptor));
            return;
        }

        match McpSession::spawn(&descriptor.command, &descriptor.args, &descriptor.env).await {
            Ok(session) => match session.list_tools().await {
                Ok(tools) => {
                    let mut tool_index = HashMap::new();
                    for (local_name, description, schema) in tools {
                        let fq = fully_qualified_name(&name, &local_name);
                        if self.reverse.contains_key(&fq) {
                            panic!(
                                "duplicate fully-qualified tool name '{fq}': \
                                 server '{name}' collides with an earlier server's tool"
                            );
                        }
                        self.reverse.insert(fq, (name.clone(), local_name.clone()));
                        tool_index.insert(
                            local_name.clone(),
                            LocalTool { local_name, description, input_schema: schema },
                        );
                    }
                    tracing::info!(server = %name, tools = tool_index.len(), "server connected");
                    self.servers.insert(
                        name,
                        ServerConnection {
                            descriptor,
                            state: ConnectionState::Ready,
                            tool_index,
                            session: Some(session),
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "tools/list failed");
                    self.servers.insert(name, ServerConnection::failed(descriptor));
                }
            },
            Err(e) => {
                tracing::warn!(server = %name, error = %e, "failed to spawn/initialize");
                self.servers.insert(name, ServerConnection::failed(descriptor));
            }
        }
    }

    /// Resolves a fully-qualified name back to `(server_name, local_name)`
    /// without ever splitting the string — the reverse map is the only
    /// source of truth, per spec.md §9.
    pub fn resolve(&self, fully_qualified_name: &str) -> Option<(String, String)> {
        self.reverse.get(fully_qualified_name).map(|r| r.clone())
    }

    /// Read-only view of every tool across every `READY` server, converted
    /// for presentation to an LLM provider. `convertMcpTools` (spec §4.1
    /// item 3) happens one call site downstream, inside each adapter's
    /// request-building code; this just normalizes the MCP-side shape via
    /// [`ToolDefinition::from_mcp`].
    pub fn all_tools(&self) -> Vec<ToolDefinition> {
        let mut out = Vec::new();
        for entry in self.servers.iter() {
            if entry.state != ConnectionState::Ready {
                continue;
            }
            for tool in entry.tool_index.values() {
                let fq = fully_qualified_name(entry.key(), &tool.local_name);
                out.push(ToolDefinition::from_mcp(fq, tool.description.clone(), tool.input_schema.clone()));
            }
        }
        out
    }

    pub fn server_state(&self, server_name: &str) -> Option<ConnectionState> {
        self.servers.get(server_name).map(|s| s.state)
    }

    /// Invokes `local_name` on `server_name`'s live session.
    pub async fn call_tool(
        &self,
        server_name: &str,
        local_name: &str,
        arguments: Value,
    ) -> Result<String, McpError> {
        // Cloning the session handle out from under the DashMap guard would
        // require `Clone`; instead we hold the guard across the await, which
        // is safe here because each server has exactly one caller path
        // (Tool Executor) and DashMap shards make this a narrow, short-lived
        // lock rather than a whole-registry one.
        let entry = self
            .servers
            .get(server_name)
            .ok_or_else(|| McpError::ServerUnavailable(server_name.to_string()))?;
        if entry.state != ConnectionState::Ready {
            return Err(McpError::ServerUnavailable(server_name.to_string()));
        }
        let session = entry
            .session
            .as_ref()
            .ok_or_else(|| McpError::ServerUnavailable(server_name.to_string()))?;
        session.call_tool(local_name, arguments).await
    }
}

pub type SharedRegistry = Arc<McpRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, priority: u8, enabled: bool) -> ServerDescriptor {
        ServerDescriptor {
            name: name.to_string(),
            command: "_nonexistent_binary_xyz_".to_string(),
            args: vec![],
            description: String::new(),
            enabled,
            priority,
            env: HashMap::new(),
            dependency_flags: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn disabled_descriptor_is_skipped_without_spawning() {
        let registry = McpRegistry::connect_all(vec![descriptor("a", 1, false)]).await;
        assert_eq!(registry.server_state("a"), Some(ConnectionState::Failed));
    }

    #[tokio::test]
    async fn unspawnable_command_marks_server_failed_not_fatal() {
        let registry = McpRegistry::connect_all(vec![descriptor("a", 1, true)]).await;
        assert_eq!(registry.server_state("a"), Some(ConnectionState::Failed));
    }

    #[tokio::test]
    async fn unknown_server_resolve_returns_none() {
        let registry = McpRegistry::connect_all(vec![]).await;
        assert!(registry.resolve("nope_tool").is_none());
    }

    #[tokio::test]
    async fn call_tool_on_unready_server_is_server_unavailable() {
        let registry = McpRegistry::connect_all(vec![descriptor("a", 1, false)]).await;
        let err = registry.call_tool("a", "x", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::ServerUnavailable(_)));
    }

    #[tokio::test]
    async fn all_tools_is_empty_when_nothing_connected() {
        let registry = McpRegistry::connect_all(vec![descriptor("a", 1, false)]).await;
        assert!(registry.all_tools().is_empty());
    }
}
