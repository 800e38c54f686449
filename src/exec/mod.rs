//! Command execution pipeline: guard, run, normalize.

pub mod group;
pub mod guard;
pub mod normalize;
pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

pub use group::{run_group, FailureReason, GroupFailure, MemberFailure};
pub use guard::{GuardPolicy, GuardVerdict, PatternGuard};
pub use normalize::{normalize, NormalizeContext, Subject};
pub use runner::{
    truncate_output, CommandRunner, CommandSpec, ExecutionOutcome, ProcessRunner,
    TRUNCATION_MARKER,
};

use crate::protocol::ToolCallResult;

/// A command or script ready to go through the pipeline.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Labels for the result text.
    pub subject: Subject,
    /// The text the guard inspects and the result echoes back.
    pub text: String,
    /// Process to launch.
    pub spec: CommandSpec,
}

/// Result of the guard step.
#[derive(Debug)]
pub enum GuardCheck {
    /// Nothing matched.
    Clear,
    /// Matched under [`GuardPolicy::Warn`]; carries the warning text.
    Warned(String),
    /// Matched under [`GuardPolicy::Block`]; carries the error result.
    Blocked(ToolCallResult),
}

/// Guard + runner + normalizer, shared by every command-backed connector.
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn CommandRunner>,
    guard: PatternGuard,
    policy: GuardPolicy,
}

impl CommandExecutor {
    /// Create an executor.
    pub fn new(runner: Arc<dyn CommandRunner>, guard: PatternGuard, policy: GuardPolicy) -> Self {
        Self {
            runner,
            guard,
            policy,
        }
    }

    /// The underlying runner.
    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// The configured guard policy.
    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Apply the guard and policy to `text`.
    pub fn check(&self, subject: Subject, text: &str) -> GuardCheck {
        let GuardVerdict { allowed, matched_pattern } = self.guard.inspect(text);
        if allowed {
            return GuardCheck::Clear;
        }
        let pattern = matched_pattern.unwrap_or_default();
        match self.policy {
            GuardPolicy::Block => {
                warn!(pattern = %pattern, "guard blocked {}", subject.noun());
                GuardCheck::Blocked(normalize::guard_rejection(subject, &pattern))
            }
            GuardPolicy::Warn => {
                warn!(pattern = %pattern, "guard flagged {}, proceeding", subject.noun());
                GuardCheck::Warned(normalize::guard_warning(subject, &pattern))
            }
        }
    }

    /// Guard, run and normalize.
    pub async fn execute(&self, request: CommandRequest) -> ToolCallResult {
        match self.check(request.subject, &request.text) {
            GuardCheck::Blocked(result) => result,
            GuardCheck::Warned(notice) => self.execute_unguarded(request).await.with_notice(notice),
            GuardCheck::Clear => self.execute_unguarded(request).await,
        }
    }

    /// Run and normalize without the guard; for text built from fixed templates.
    pub async fn execute_unguarded(&self, request: CommandRequest) -> ToolCallResult {
        let ctx = NormalizeContext {
            subject: request.subject,
            text: &request.text,
            working_directory: request.spec.working_directory.as_deref(),
            timeout: request.spec.timeout,
        };

        match self.runner.run(&request.spec).await {
            Ok(outcome) => {
                info!(
                    program = %request.spec.program,
                    exit_code = ?outcome.exit_code,
                    timed_out = outcome.timed_out,
                    duration_ms = outcome.duration.as_millis() as u64,
                    "{} finished",
                    request.subject.noun()
                );
                normalize(&outcome, &ctx)
            }
            Err(e) => {
                warn!(program = %request.spec.program, error = %e, "spawn failed");
                normalize::normalize_spawn_error(&e, &ctx)
            }
        }
    }

    /// Run a template and hand back trimmed stdout on success, or the
    /// normalized error result otherwise.
    pub async fn capture(
        &self,
        request: CommandRequest,
    ) -> std::result::Result<String, ToolCallResult> {
        let ctx = NormalizeContext {
            subject: request.subject,
            text: &request.text,
            working_directory: request.spec.working_directory.as_deref(),
            timeout: request.spec.timeout,
        };

        match self.runner.run(&request.spec).await {
            Ok(outcome) if outcome.succeeded() => Ok(outcome.stdout.trim().to_string()),
            Ok(outcome) => Err(normalize(&outcome, &ctx)),
            Err(e) => Err(normalize::normalize_spawn_error(&e, &ctx)),
        }
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("guard", &self.guard)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Resolve a working directory override against a default.
pub fn resolve_working_dir(requested: Option<&str>, default: Option<&PathBuf>) -> Option<PathBuf> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => default.cloned(),
    }
}
