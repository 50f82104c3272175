//! Entity detection and complexity classification for the ToolUse strategy
//! (spec §4.4.3 step 1). Grounded in the teacher's `once_cell::sync::Lazy`
//! static-regex pattern used throughout its intent-classification code.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w./\\-]+\.\w{1,5}\b").unwrap());
static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bin\s+([A-Z][a-zA-Z]+(?:\s[A-Z][a-zA-Z]+)*)").unwrap());
static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2}:\d{2}(?::\d{2})?|\d{4}-\d{2}-\d{2}|today|tomorrow|yesterday|now)\b")
        .unwrap()
});
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Url,
    Email,
    File,
    Location,
    Time,
    Number,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: EntityKind,
    pub text: String,
}

/// Runs every entity regex over `text`, longest-match patterns first (URL and
/// email before the looser number pattern) so a URL's digits aren't also
/// reported as a standalone `Number` entity.
pub fn detect_entities(text: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut consumed: Vec<(usize, usize)> = Vec::new();

    let mut push_matches = |kind: EntityKind, re: &Regex, consumed: &mut Vec<(usize, usize)>| {
        for m in re.find_iter(text) {
            if consumed.iter().any(|&(s, e)| m.start() < e && s < m.end()) {
                continue;
            }
            consumed.push((m.start(), m.end()));
            entities.push(Entity { kind, text: m.as_str().to_string() });
        }
    };

    push_matches(EntityKind::Url, &URL_RE, &mut consumed);
    push_matches(EntityKind::Email, &EMAIL_RE, &mut consumed);
    push_matches(EntityKind::File, &FILE_RE, &mut consumed);
    push_matches(EntityKind::Time, &TIME_RE, &mut consumed);
    push_matches(EntityKind::Number, &NUMBER_RE, &mut consumed);

    for cap in LOCATION_RE.captures_iter(text) {
        if let Some(m) = cap.get(1) {
            entities.push(Entity { kind: EntityKind::Location, text: m.as_str().to_string() });
        }
    }

    entities
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Classifies a query's complexity from entity count and a few structural
/// signals (question marks, conjunctions suggesting multiple sub-tasks).
/// `Complex` queries are the ones ToolUse allows to chain tools; `Simple`
/// queries skip straight to a direct LLM answer.
pub fn classify_complexity(text: &str, entities: &[Entity]) -> Complexity {
    let conjunction_count =
        [" and then ", " after that ", " followed by ", " then "].iter().filter(|c| text.to_ascii_lowercase().contains(**c)).count();

    if conjunction_count >= 1 || entities.len() >= 3 {
        Complexity::Complex
    } else if entities.is_empty() && text.split_whitespace().count() <= 6 {
        Complexity::Simple
    } else {
        Complexity::Moderate
    }
}
