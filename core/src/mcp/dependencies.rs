//! Dependency screening (spec §4.2b): decides whether a configured server
//! should even be spawned, before any subprocess or handshake cost is paid.
//!
//! Grounded in zeroclaw's graceful-skip-on-missing-binary test pattern:
//! presence checks run one `<cmd> --version` per flag rather than scanning
//! `$PATH` by hand.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyFlag {
    NeedsNodejs,
    NeedsUvx,
    NeedsOnline,
    NeedsEnv(String),
}

fn binary_present(cmd: &str) -> bool {
    std::process::Command::new(cmd)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Evaluates every flag against the current process environment / `$PATH`.
/// Returns the first unmet flag's reason, or `None` when all are satisfied.
///
/// `NEEDS_ONLINE` is accepted unconditionally: spec.md names it as a
/// recognized flag but does not define a connectivity probe, and a registry
/// construction step that makes a live network call would make every test
/// touching the registry flaky. This is recorded as an open decision in
/// DESIGN.md rather than guessed at.
pub fn unmet_reason(flags: &HashSet<DependencyFlag>) -> Option<String> {
    for flag in flags {
        match flag {
            DependencyFlag::NeedsNodejs if !binary_present("node") => {
                return Some("node is not on PATH".to_string())
            }
            DependencyFlag::NeedsUvx if !binary_present("uvx") => {
                return Some("uvx is not on PATH".to_string())
            }
            DependencyFlag::NeedsEnv(var) if std::env::var(var).is_err() => {
                return Some(format!("required environment variable {var} is not set"))
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_var_flag_is_reported() {
        std::env::remove_var("WEFT_TEST_NEVER_SET_XYZ");
        let mut flags = HashSet::new();
        flags.insert(DependencyFlag::NeedsEnv("WEFT_TEST_NEVER_SET_XYZ".to_string()));
        assert!(unmet_reason(&flags).is_some());
    }

    #[test]
    fn present_env_var_flag_is_satisfied() {
        std::env::set_var("WEFT_TEST_PRESENT_XYZ", "1");
        let mut flags = HashSet::new();
        flags.insert(DependencyFlag::NeedsEnv("WEFT_TEST_PRESENT_XYZ".to_string()));
        assert!(unmet_reason(&flags).is_none());
        std::env::remove_var("WEFT_TEST_PRESENT_XYZ");
    }

    #[test]
    fn online_flag_never_blocks_by_itself() {
        let mut flags = HashSet::new();
        flags.insert(DependencyFlag::NeedsOnline);
        assert!(unmet_reason(&flags).is_none());
    }

    #[test]
    fn empty_flag_set_is_always_satisfied() {
        assert!(unmet_reason(&HashSet::new()).is_none());
    }

    #[test]
    fn missing_binary_is_reported_for_nonexistent_tool() {
        let mut flags = HashSet::new();
        flags.insert(DependencyFlag::NeedsUvx);
        // uvx is unlikely to be installed in the CI sandbox; if it is, this
        // still exercises the "satisfied" branch without failing.
        let _ = unmet_reason(&flags);
    }
}
