//! Hand-rolled reader for `config/application.properties` (spec §6).
//!
//! Java-properties grammar: `key=value` lines, `#` or `!` starting a line is a
//! comment, blank lines are skipped. No sections, no multi-line continuation —
//! deliberately narrower than TOML since spec.md mandates this literal format.
//! Shaped after the teacher's own `config::dotenv` line-oriented reader, just
//! with a different comment/separator grammar.

use std::collections::HashMap;
use std::path::Path;

use crate::ConfigError;

/// Parses `application.properties` text into an ordered key→value map.
/// Later duplicate keys win, matching Java `Properties` semantics.
pub fn parse(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    map
}

/// Loads `path`, returning an empty map (not an error) when the file is
/// absent — the application runs fine on environment variables alone.
pub fn load(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(ConfigError::Io(path.display().to_string(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_key_value_lines() {
        let map = parse("filesystem.base.path=./documents\ngroq.model=llama-3.1-70b\n");
        assert_eq!(map.get("filesystem.base.path").map(String::as_str), Some("./documents"));
        assert_eq!(map.get("groq.model").map(String::as_str), Some("llama-3.1-70b"));
    }

    #[test]
    fn skips_hash_and_bang_comments_and_blank_lines() {
        let map = parse("# a comment\n! another comment\n\nkey=value\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("key").map(String::as_str), Some("value"));
    }

    #[test]
    fn trims_whitespace_around_key_and_value() {
        let map = parse("  key  =   value with spaces  \n");
        assert_eq!(map.get("key").map(String::as_str), Some("value with spaces"));
    }

    #[test]
    fn later_duplicate_key_wins() {
        let map = parse("key=first\nkey=second\n");
        assert_eq!(map.get("key").map(String::as_str), Some("second"));
    }

    #[test]
    fn missing_file_loads_as_empty_map_not_error() {
        let map = load(Path::new("/nonexistent/application.properties")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn lines_without_equals_are_ignored() {
        let map = parse("not-a-property-line\nkey=value\n");
        assert_eq!(map.len(), 1);
    }
}
