//! Configuration Surface (spec §2 Module G).
//!
//! Loads `config/application.properties`, layers environment variables and a
//! session-scoped override on top (§6), and exposes workspace path expansion.
//! Built as a single immutable value constructed once at startup and passed
//! down — replacing the source's habit of instantiating a fresh `Config` in
//! many call sites (spec §9 "Global singleton-ish configuration").

mod error;
mod provider;
mod properties;
pub mod workspace_path;

pub use error::ConfigError;
pub use provider::{resolve_provider, ProviderConfig, ProviderName};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

const WORKSPACE_KEY: &str = "filesystem.base.path";
const DEFAULT_WORKSPACE: &str = "./documents";

/// The read-only capability bag handed to the LLM Adapter and MCP Registry.
/// Built once at startup via [`AppConfig::load`]; everything downstream
/// borrows it rather than re-reading the properties file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    properties: HashMap<String, String>,
    session_overrides: HashMap<String, String>,
    /// Resolved absolute workspace path (already expanded).
    pub workspace_path: PathBuf,
}

impl AppConfig {
    /// Loads `application.properties` from `properties_path` (a missing file
    /// is not an error — defaults apply) and expands the workspace path
    /// against the real process home directory and current working
    /// directory.
    pub fn load(properties_path: &Path) -> Result<Self, ConfigError> {
        let properties = properties::load(properties_path)?;
        let raw_workspace = properties
            .get(WORKSPACE_KEY)
            .cloned()
            .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());
        let expanded = workspace_path::expand_with_process_env(&raw_workspace)
            .map_err(|e| ConfigError::Io("workspace path expansion".to_string(), e))?;
        Ok(Self {
            properties,
            session_overrides: HashMap::new(),
            workspace_path: PathBuf::from(expanded),
        })
    }

    /// Builds a config directly from an in-memory properties map and a
    /// pre-resolved workspace path — used by tests and by callers that have
    /// already parsed the file themselves.
    pub fn from_properties(properties: HashMap<String, String>, workspace_path: PathBuf) -> Self {
        Self { properties, session_overrides: HashMap::new(), workspace_path }
    }

    /// Sets (or clears, via `None`) a session-scoped override for an
    /// environment-variable-shaped key (e.g. `"OPENAI_API_KEY"`). Equal
    /// priority to the process environment — see
    /// [`provider::resolve_provider`]'s doc comment for the tie-break rule.
    pub fn set_session_override(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match value {
            Some(v) => {
                self.session_overrides.insert(key, v);
            }
            None => {
                self.session_overrides.remove(&key);
            }
        }
    }

    pub fn provider(&self, name: ProviderName) -> ProviderConfig {
        resolve_provider(name, &self.properties, &self.session_overrides)
    }

    pub fn raw_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_properties_file_falls_back_to_default_workspace_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(&dir.path().join("does-not-exist.properties")).unwrap();
        assert!(cfg.workspace_path.ends_with("documents"));
    }

    #[test]
    fn workspace_key_is_read_and_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let props_path = dir.path().join("application.properties");
        std::fs::write(&props_path, "filesystem.base.path=${JAR_DIR}\n").unwrap();
        let cfg = AppConfig::load(&props_path).unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(cfg.workspace_path, cwd);
    }

    #[test]
    fn provider_lookup_reads_from_loaded_properties() {
        let dir = tempfile::tempdir().unwrap();
        let props_path = dir.path().join("application.properties");
        std::fs::write(&props_path, "groq.model=llama-3.1-70b\n").unwrap();
        let cfg = AppConfig::load(&props_path).unwrap();
        let groq = cfg.provider(ProviderName::Groq);
        assert_eq!(groq.model.as_deref(), Some("llama-3.1-70b"));
    }

    #[test]
    fn session_override_is_visible_to_provider_resolution() {
        let mut cfg = AppConfig::from_properties(HashMap::new(), PathBuf::from("/w"));
        cfg.set_session_override("ANTHROPIC_API_KEY", Some("sk-session".to_string()));
        let claude = cfg.provider(ProviderName::Claude);
        assert_eq!(claude.api_key.as_deref(), Some("sk-session"));
    }

    #[test]
    fn clearing_session_override_falls_back_to_next_source() {
        let mut cfg = AppConfig::from_properties(
            [("claude.api.key".to_string(), "sk-from-file".to_string())].into(),
            PathBuf::from("/w"),
        );
        cfg.set_session_override("ANTHROPIC_API_KEY", Some("sk-session".to_string()));
        cfg.set_session_override("ANTHROPIC_API_KEY", None);
        let claude = cfg.provider(ProviderName::Claude);
        assert_eq!(claude.api_key.as_deref(), Some("sk-from-file"));
    }
}
