//! `.mcp.json` manifest loading (spec §6).
//!
//! Tolerates unknown keys throughout (`#[serde(default)]`) so an operator's
//! local additions never break parsing, and recreates the file with
//! documented defaults when it's missing — grounded in the teacher's
//! `config` crate's habit of recreating defaults rather than failing closed.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::dependencies::DependencyFlag;
use super::ServerDescriptor;

const REQUIRES_NODEJS: &str = "REQUIRES_NODEJS";
const REQUIRE_UVX: &str = "REQUIRE_UVX";
const REQUIRES_ONLINE: &str = "REQUIRES_ONLINE";
const REQUIRES_ENV: &str = "REQUIRES_ENV";

/// Embedded default manifest, written to disk the first time `load` finds no
/// file at the given path.
pub const DEFAULT_MANIFEST: &str = r#"{
  "mcpServers": {
    "filesystem": {
      "description": "Read and write files under the configured workspace",
      "command": "npx",
      "args": ["-y", "@modelcontextprotocol/server-filesystem"],
      "priority": 3,
      "enabled": true,
      "env": { "REQUIRES_NODEJS": "true" }
    },
    "time": {
      "description": "Current time and timezone conversions",
      "command": "uvx",
      "args": ["mcp-server-time"],
      "priority": 2,
      "enabled": true,
      "env": { "REQUIRE_UVX": "true" }
    }
  }
}
"#;

#[derive(Debug, Deserialize, Default)]
struct RawManifest {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: HashMap<String, RawServerEntry>,
}

#[derive(Debug, Deserialize, Default)]
struct RawServerEntry {
    #[serde(default)]
    description: String,
    command: String,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    args: Vec<String>,
}

fn default_priority() -> u8 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Loads `path`, recreating it with [`DEFAULT_MANIFEST`] when absent.
/// Returns descriptors in no particular order — connection ordering by
/// descending priority happens at registry construction time.
pub fn load_or_create(path: &Path) -> Result<Vec<ServerDescriptor>, super::McpError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(path, DEFAULT_MANIFEST)
            .map_err(|e| super::McpError::Spawn(format!("writing default manifest: {e}")))?;
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| super::McpError::Spawn(format!("reading manifest: {e}")))?;
    parse(&text)
}

/// Parses manifest JSON text directly, without touching the filesystem.
pub fn parse(text: &str) -> Result<Vec<ServerDescriptor>, super::McpError> {
    let raw: RawManifest = serde_json::from_str(text)
        .map_err(|e| super::McpError::Protocol(format!("invalid .mcp.json: {e}")))?;

    let mut descriptors = Vec::with_capacity(raw.mcp_servers.len());
    for (name, entry) in raw.mcp_servers {
        descriptors.push(to_descriptor(name, entry));
    }
    Ok(descriptors)
}

/// Resolves a `"$ENV_VAR_NAME"` value against the process environment so a
/// manifest can name a secret by reference instead of embedding it in
/// `.mcp.json` directly. A value that isn't a bare `$NAME` token, or whose
/// named variable isn't set, is left untouched (or left empty, not panicked
/// on) — a manifest author who doesn't want substitution just writes a
/// literal value with no leading `$`.
fn resolve_env_value(value: &str) -> String {
    match value.strip_prefix('$') {
        Some(var_name) if !var_name.is_empty() && var_name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()) => {
            std::env::var(var_name).unwrap_or_default()
        }
        _ => value.to_string(),
    }
}

fn to_descriptor(name: String, entry: RawServerEntry) -> ServerDescriptor {
    let mut dependency_flags = HashSet::new();
    let mut spawn_env = HashMap::new();

    for (key, value) in entry.env {
        match key.as_str() {
            REQUIRES_NODEJS => {
                dependency_flags.insert(DependencyFlag::NeedsNodejs);
            }
            REQUIRE_UVX => {
                dependency_flags.insert(DependencyFlag::NeedsUvx);
            }
            REQUIRES_ONLINE => {
                dependency_flags.insert(DependencyFlag::NeedsOnline);
            }
            REQUIRES_ENV => {
                dependency_flags.insert(DependencyFlag::NeedsEnv(value));
            }
            _ => {
                spawn_env.insert(key, resolve_env_value(&value));
            }
        }
    }

    ServerDescriptor {
        name,
        command: entry.command,
        args: entry.args,
        description: entry.description,
        enabled: entry.enabled,
        priority: entry.priority.clamp(1, 3),
        env: spawn_env,
        dependency_flags,
    }
}

/// Round-trips a descriptor back into the raw JSON shape, used when the CLI
/// prints the effective manifest for `/workspace`-style inspection commands.
pub fn descriptor_to_value(descriptor: &ServerDescriptor) -> Value {
    serde_json::json!({
        "description": descriptor.description,
        "command": descriptor.command,
        "args": descriptor.args,
        "priority": descriptor.priority,
        "enabled": descriptor.enabled,
        "env": descriptor.env,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_env_flags_into_dependency_flags() {
        let text = r#"{"mcpServers": {"fs": {
            "command": "npx",
            "env": {"REQUIRES_NODEJS": "true", "REQUIRES_ENV": "GITLAB_TOKEN"}
        }}}"#;
        let descriptors = parse(text).unwrap();
        assert_eq!(descriptors.len(), 1);
        let fs = &descriptors[0];
        assert!(fs.dependency_flags.contains(&DependencyFlag::NeedsNodejs));
        assert!(fs.dependency_flags.contains(&DependencyFlag::NeedsEnv("GITLAB_TOKEN".to_string())));
    }

    #[test]
    fn non_flag_env_keys_are_forwarded_as_subprocess_env() {
        let text = r#"{"mcpServers": {"gitlab": {
            "command": "npx",
            "env": {"GITLAB_TOKEN": "abc123"}
        }}}"#;
        let descriptors = parse(text).unwrap();
        assert_eq!(descriptors[0].env.get("GITLAB_TOKEN").map(String::as_str), Some("abc123"));
        assert!(descriptors[0].dependency_flags.is_empty());
    }

    #[test]
    fn dollar_prefixed_env_value_resolves_against_process_environment() {
        std::env::set_var("WEFT_MANIFEST_TEST_TOKEN", "secret-value");
        let text = r#"{"mcpServers": {"gitlab": {
            "command": "npx",
            "env": {"GITLAB_TOKEN": "$WEFT_MANIFEST_TEST_TOKEN"}
        }}}"#;
        let descriptors = parse(text).unwrap();
        assert_eq!(descriptors[0].env.get("GITLAB_TOKEN").map(String::as_str), Some("secret-value"));
        std::env::remove_var("WEFT_MANIFEST_TEST_TOKEN");
    }

    #[test]
    fn dollar_prefixed_env_value_with_unset_variable_resolves_empty() {
        std::env::remove_var("WEFT_MANIFEST_TEST_UNSET_TOKEN");
        let text = r#"{"mcpServers": {"gitlab": {
            "command": "npx",
            "env": {"GITLAB_TOKEN": "$WEFT_MANIFEST_TEST_UNSET_TOKEN"}
        }}}"#;
        let descriptors = parse(text).unwrap();
        assert_eq!(descriptors[0].env.get("GITLAB_TOKEN").map(String::as_str), Some(""));
    }

    #[test]
    fn env_value_without_dollar_prefix_is_forwarded_literally() {
        let text = r#"{"mcpServers": {"gitlab": {
            "command": "npx",
            "env": {"GITLAB_TOKEN": "not-a-reference"}
        }}}"#;
        let descriptors = parse(text).unwrap();
        assert_eq!(descriptors[0].env.get("GITLAB_TOKEN").map(String::as_str), Some("not-a-reference"));
    }

    #[test]
    fn unknown_top_level_keys_are_tolerated() {
        let text = r#"{"mcpServers": {}, "somethingElseEntirely": 42}"#;
        assert!(parse(text).is_ok());
    }

    #[test]
    fn missing_priority_and_enabled_default_to_one_and_true() {
        let text = r#"{"mcpServers": {"x": {"command": "cat"}}}"#;
        let descriptors = parse(text).unwrap();
        assert_eq!(descriptors[0].priority, 1);
        assert!(descriptors[0].enabled);
    }

    #[test]
    fn load_or_create_writes_default_manifest_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join(".mcp.json");
        let descriptors = load_or_create(&path).unwrap();
        assert!(path.exists());
        assert!(!descriptors.is_empty());
    }

    #[test]
    fn invalid_json_is_a_protocol_error() {
        let err = parse("not json").unwrap_err();
        assert!(matches!(err, super::super::McpError::Protocol(_)));
    }
}
