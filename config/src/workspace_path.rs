//! Workspace path expansion rules (spec §6).
//!
//! Applied, in order, to the first pattern that matches:
//! - `${USER_DOCUMENTS}` → user home + `/Documents`
//! - `${JAR_DIR}` → process working directory
//! - leading `~/` → user home + remainder
//! - leading `./` → process working directory + remainder
//! - otherwise: returned unchanged
//!
//! Idempotent on already-absolute paths (testable property P6 in spec.md §8):
//! none of the four patterns above match a path that is already absolute and
//! doesn't start with `./`, so a second `expand` call is a no-op.

const USER_DOCUMENTS_TOKEN: &str = "${USER_DOCUMENTS}";
const JAR_DIR_TOKEN: &str = "${JAR_DIR}";

/// Expands `raw` against `home` (user home directory) and `cwd` (process
/// working directory), both supplied by the caller so this function stays a
/// pure string transform and is trivially testable without touching the
/// real filesystem or environment.
pub fn expand(raw: &str, home: &std::path::Path, cwd: &std::path::Path) -> String {
    if raw == USER_DOCUMENTS_TOKEN {
        return home.join("Documents").to_string_lossy().into_owned();
    }
    if raw == JAR_DIR_TOKEN {
        return cwd.to_string_lossy().into_owned();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest).to_string_lossy().into_owned();
    }
    if let Some(rest) = raw.strip_prefix("./") {
        return cwd.join(rest).to_string_lossy().into_owned();
    }
    raw.to_string()
}

/// Expands using the real process home directory and current working
/// directory. Falls back to `/` for home if it cannot be resolved (headless
/// CI containers without `$HOME`), which only affects the rare
/// `${USER_DOCUMENTS}`/`~/` cases.
pub fn expand_with_process_env(raw: &str) -> std::io::Result<String> {
    let home = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("/"));
    let cwd = std::env::current_dir()?;
    Ok(expand(raw, &home, &cwd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn user_documents_token_expands_under_home() {
        let out = expand("${USER_DOCUMENTS}", Path::new("/home/alice"), Path::new("/w"));
        assert_eq!(out, "/home/alice/Documents");
    }

    #[test]
    fn jar_dir_token_expands_to_cwd() {
        let out = expand("${JAR_DIR}", Path::new("/home/alice"), Path::new("/w"));
        assert_eq!(out, "/w");
    }

    #[test]
    fn leading_tilde_expands_under_home() {
        let out = expand("~/projects/x", Path::new("/home/alice"), Path::new("/w"));
        assert_eq!(out, "/home/alice/projects/x");
    }

    #[test]
    fn leading_dot_slash_expands_under_cwd() {
        let out = expand("./documents", Path::new("/home/alice"), Path::new("/w"));
        assert_eq!(out, "/w/documents");
    }

    #[test]
    fn unmatched_pattern_returned_unchanged() {
        let out = expand("/already/absolute/path", Path::new("/home/alice"), Path::new("/w"));
        assert_eq!(out, "/already/absolute/path");
    }

    #[test]
    fn already_absolute_path_is_idempotent_under_repeated_expansion() {
        let once = expand("./documents", Path::new("/home/alice"), Path::new("/w"));
        let twice = expand(&once, Path::new("/home/alice"), Path::new("/w"));
        assert_eq!(once, twice);
    }
}
