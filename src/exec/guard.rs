//! Dangerous-pattern guard.
//!
//! A case-insensitive substring check over the fully interpolated command or
//! script text. It is a heuristic, not a parser: it will flag harmless text
//! that happens to contain a pattern and will miss equivalent commands
//! spelled differently. Treat a pass as "nothing obvious", never as "safe".

use serde::Deserialize;

/// Built-in deny-list for shell commands.
pub const SHELL_PATTERNS: &[&str] = &[
    "rm -rf",
    "sudo",
    "mkfs",
    "dd if=",
    "format",
    "del /s",
    "> /dev/",
];

/// Built-in deny-list for AppleScript source.
pub const APPLESCRIPT_PATTERNS: &[&str] = &["do shell script", "system events", "delete", "remove"];

/// What a connector does with a guard match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardPolicy {
    /// Reject before anything is spawned.
    #[default]
    Block,
    /// Attach a warning and run anyway.
    Warn,
}

/// Outcome of [`PatternGuard::inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardVerdict {
    /// Whether the text passed.
    pub allowed: bool,
    /// The deny-list entry (or allow-list miss) that decided it.
    pub matched_pattern: Option<String>,
}

impl GuardVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            matched_pattern: None,
        }
    }

    fn reject(pattern: impl Into<String>) -> Self {
        Self {
            allowed: false,
            matched_pattern: Some(pattern.into()),
        }
    }
}

/// Static deny-list plus an optional allow-list of program names.
#[derive(Debug, Clone, Default)]
pub struct PatternGuard {
    patterns: Vec<String>,
    allowed_programs: Vec<String>,
}

impl PatternGuard {
    /// Guard over the given deny-list.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            allowed_programs: Vec::new(),
        }
    }

    /// Guard with the built-in shell deny-list.
    pub fn shell() -> Self {
        Self::new(SHELL_PATTERNS)
    }

    /// Guard with the built-in AppleScript deny-list.
    pub fn applescript() -> Self {
        Self::new(APPLESCRIPT_PATTERNS)
    }

    /// Append extra deny-list entries.
    pub fn with_patterns<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns.extend(
            extra
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty()),
        );
        self
    }

    /// Restrict the first word of the text to these program names.
    ///
    /// An empty list disables the check.
    pub fn with_allowed_programs<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_programs = programs.into_iter().map(Into::into).collect();
        self
    }

    /// Deny-list entries, lowercased.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check `text`. First deny-list match wins; the allow-list is consulted
    /// only when no pattern matched.
    pub fn inspect(&self, text: &str) -> GuardVerdict {
        let lowered = text.to_lowercase();
        if let Some(pattern) = self.patterns.iter().find(|p| lowered.contains(p.as_str())) {
            return GuardVerdict::reject(pattern.clone());
        }

        if !self.allowed_programs.is_empty() {
            let program = program_name(text);
            if !self.allowed_programs.iter().any(|allowed| allowed == program) {
                return GuardVerdict::reject(format!(
                    "program '{}' not in allowed_commands",
                    program
                ));
            }
        }

        GuardVerdict::allow()
    }
}

/// Basename of the first word of a command line.
fn program_name(text: &str) -> &str {
    let first = text.split_whitespace().next().unwrap_or("");
    first.rsplit('/').next().unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_list_match_is_case_insensitive() {
        let guard = PatternGuard::shell();
        let verdict = guard.inspect("SUDO rm /tmp/x");
        assert!(!verdict.allowed);
        assert_eq!(verdict.matched_pattern.as_deref(), Some("sudo"));
    }

    #[test]
    fn first_match_wins() {
        let verdict = PatternGuard::shell().inspect("sudo rm -rf /");
        assert_eq!(verdict.matched_pattern.as_deref(), Some("rm -rf"));
    }

    #[test]
    fn every_builtin_pattern_rejects() {
        let guard = PatternGuard::shell();
        for pattern in SHELL_PATTERNS {
            let text = format!("echo x; {} y", pattern.to_uppercase());
            assert!(!guard.inspect(&text).allowed, "{pattern} should reject");
        }
    }

    #[test]
    fn plain_commands_pass() {
        let verdict = PatternGuard::shell().inspect("echo hello");
        assert_eq!(verdict, GuardVerdict::allow());
    }

    #[test]
    fn applescript_list_flags_system_events() {
        let verdict =
            PatternGuard::applescript().inspect("tell application \"System Events\" to beep");
        assert_eq!(verdict.matched_pattern.as_deref(), Some("system events"));
    }

    #[test]
    fn extra_patterns_are_lowercased() {
        let guard = PatternGuard::new(Vec::<String>::new()).with_patterns(["Shutdown"]);
        assert!(!guard.inspect("shutdown -h now").allowed);
    }

    #[test]
    fn allow_list_checks_program_basename() {
        let guard = PatternGuard::shell().with_allowed_programs(["ls", "echo"]);
        assert!(guard.inspect("/bin/ls -la").allowed);
        assert!(guard.inspect("echo hi").allowed);

        let verdict = guard.inspect("curl example.com");
        assert!(!verdict.allowed);
        assert_eq!(
            verdict.matched_pattern.as_deref(),
            Some("program 'curl' not in allowed_commands")
        );
    }

    #[test]
    fn deny_list_beats_allow_list() {
        let guard = PatternGuard::shell().with_allowed_programs(["rm"]);
        let verdict = guard.inspect("rm -rf build");
        assert_eq!(verdict.matched_pattern.as_deref(), Some("rm -rf"));
    }
}
