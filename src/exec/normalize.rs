//! Turns raw execution outcomes into tool results.
//!
//! All human-facing wording for command and script results lives here.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crate::error::Error;
use crate::protocol::ToolCallResult;

/// What kind of text was executed; picks the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// A shell command line.
    Command,
    /// An AppleScript program.
    Script,
}

impl Subject {
    /// Capitalized label, e.g. `Command`.
    pub fn label(self) -> &'static str {
        match self {
            Subject::Command => "Command",
            Subject::Script => "Script",
        }
    }

    /// Lowercase noun, e.g. `command`.
    pub fn noun(self) -> &'static str {
        match self {
            Subject::Command => "command",
            Subject::Script => "script",
        }
    }
}

/// Context the outcome alone does not carry.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Labels to use.
    pub subject: Subject,
    /// The executed command or script text.
    pub text: &'a str,
    /// Working directory, when one was set.
    pub working_directory: Option<&'a Path>,
    /// The effective timeout.
    pub timeout: Duration,
}

/// Build the result for a finished (or killed) process.
pub fn normalize(
    outcome: &crate::exec::ExecutionOutcome,
    ctx: &NormalizeContext<'_>,
) -> ToolCallResult {
    if outcome.timed_out {
        return ToolCallResult::error(
            format!(
                "Error: {} timed out after {}",
                ctx.subject.label(),
                format_seconds(ctx.timeout)
            ),
            format!("{} timeout", ctx.subject.label()),
        );
    }

    let exit_code = match outcome.exit_code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    };

    let mut text = String::new();
    let _ = writeln!(text, "{}: {}", ctx.subject.label(), ctx.text);
    if let Some(dir) = ctx.working_directory {
        let _ = writeln!(text, "Working Directory: {}", dir.display());
    }
    let _ = writeln!(text, "Exit Code: {}", exit_code);
    text.push('\n');

    if !outcome.stdout.is_empty() {
        let _ = writeln!(text, "STDOUT:\n{}", outcome.stdout);
    }
    if !outcome.stderr.is_empty() {
        let _ = writeln!(text, "STDERR:\n{}", outcome.stderr);
    }
    if outcome.stdout.is_empty() && outcome.stderr.is_empty() {
        text.push_str("No output\n");
    }

    if outcome.succeeded() {
        ToolCallResult::text(text)
    } else {
        let message = format!("{} exited with code {}", ctx.subject.label(), exit_code);
        ToolCallResult::error(text, message)
    }
}

/// Build the result for a process that never started.
pub fn normalize_spawn_error(error: &Error, ctx: &NormalizeContext<'_>) -> ToolCallResult {
    ToolCallResult::error(
        format!("Error executing {}: {}", ctx.subject.noun(), error),
        error.summary(),
    )
}

/// Build the result for text the guard rejected.
pub fn guard_rejection(subject: Subject, pattern: &str) -> ToolCallResult {
    ToolCallResult::error(
        format!(
            "Error: {} contains potentially dangerous operations (matched dangerous pattern '{}')",
            subject.label(),
            pattern
        ),
        format!("Dangerous {} blocked", subject.noun()),
    )
}

/// Warning block attached when the guard matched under the warn policy.
pub fn guard_warning(subject: Subject, pattern: &str) -> String {
    format!(
        "Warning: {} contains potentially sensitive operations (matched '{}'). Proceeding with caution.",
        subject.label(),
        pattern
    )
}

/// "1 second", "5 seconds", "1.5 seconds".
pub fn format_seconds(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if duration == Duration::from_secs(1) {
        "1 second".to_string()
    } else {
        format!("{} seconds", secs)
    }
}
