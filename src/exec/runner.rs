//! Subprocess execution with a deadline.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Marker appended to output cut at the cap.
pub const TRUNCATION_MARKER: &str = "... (output truncated)";

/// One process to launch.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Executable.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory (inherited when `None`).
    pub working_directory: Option<PathBuf>,
    /// Wall-clock budget covering exit and output draining.
    pub timeout: Duration,
    /// Extra environment variables.
    pub environment: HashMap<String, String>,
    /// Character cap for stdout and stderr, each.
    pub max_output_length: usize,
}

impl CommandSpec {
    /// A spec with the default 30s timeout and 10,000 character cap.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_directory: None,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            environment: HashMap::new(),
            max_output_length: crate::config::DEFAULT_MAX_OUTPUT_LENGTH,
        }
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add environment variables.
    pub fn envs(mut self, vars: &HashMap<String, String>) -> Self {
        self.environment
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the output cap.
    pub fn max_output_length(mut self, cap: usize) -> Self {
        self.max_output_length = cap;
        self
    }
}

/// Raw result of one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Exit code; `None` when killed by a signal or timed out.
    pub exit_code: Option<i32>,
    /// Decoded, possibly truncated stdout.
    pub stdout: String,
    /// Decoded, possibly truncated stderr.
    pub stderr: String,
    /// The deadline fired and the process was killed.
    pub timed_out: bool,
    /// Wall-clock time spent.
    pub duration: Duration,
}

impl ExecutionOutcome {
    /// Exited with status 0 before the deadline.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Anything that can turn a [`CommandSpec`] into an [`ExecutionOutcome`].
///
/// Connectors hold an `Arc<dyn CommandRunner>` so tests can count or script
/// invocations without spawning anything.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one process to completion or to its deadline.
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionOutcome>;
}

/// The real runner, backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionOutcome> {
        let start = Instant::now();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_directory {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        // The group id outlives the leader: `id()` is `None` once the shell
        // has been reaped, while its background jobs may still be running.
        let pgid = child.id();
        debug!(program = %spec.program, pid = ?pgid, timeout = ?spec.timeout, "spawned process");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let collect = async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr));
            (status, stdout, stderr)
        };

        let collected = tokio::time::timeout(spec.timeout, collect).await;
        match collected {
            Ok((status, stdout, stderr)) => {
                let status = status?;
                Ok(ExecutionOutcome {
                    exit_code: status.code(),
                    stdout: decode(&stdout, spec.max_output_length),
                    stderr: decode(&stderr, spec.max_output_length),
                    timed_out: false,
                    duration: start.elapsed(),
                })
            }
            Err(_) => {
                terminate(&mut child, pgid).await;
                warn!(
                    program = %spec.program,
                    timeout = ?spec.timeout,
                    "process killed at deadline"
                );
                Ok(ExecutionOutcome {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: true,
                    duration: start.elapsed(),
                })
            }
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            debug!(error = %e, "output pipe closed early");
        }
    }
    buf
}

fn decode(bytes: &[u8], cap: usize) -> String {
    truncate_output(&String::from_utf8_lossy(bytes), cap)
}

/// SIGKILL the process group `pgid`, then kill and reap the child itself.
///
/// `pgid` is the leader's pid captured at spawn; `process_group(0)` made it
/// the group id of every process the command starts.
async fn terminate(child: &mut Child, pgid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pgid {
            // SAFETY: killpg only sends a signal to the group created at spawn.
            let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                let error = std::io::Error::last_os_error();
                debug!(pgid, error = %error, "process group already gone");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;

    if let Err(e) = child.kill().await {
        debug!(error = %e, "child already gone");
    }
}

/// Cut `text` to `cap` characters and append [`TRUNCATION_MARKER`].
///
/// Text at or under the cap is returned unchanged.
pub fn truncate_output(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((byte_index, _)) => {
            let mut truncated = String::with_capacity(byte_index + TRUNCATION_MARKER.len());
            truncated.push_str(&text[..byte_index]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_untouched() {
        assert_eq!(truncate_output("hello", 5), "hello");
        assert_eq!(truncate_output("", 5), "");
    }

    #[test]
    fn long_output_is_cut_at_cap() {
        let text = "a".repeat(12);
        assert_eq!(truncate_output(&text, 10), format!("{}{}", "a".repeat(10), TRUNCATION_MARKER));
    }

    #[test]
    fn cap_counts_characters_not_bytes() {
        let text = "héllo wörld";
        assert_eq!(truncate_output(text, 4), format!("héll{}", TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_is_deterministic() {
        let text = "x".repeat(50_000);
        assert_eq!(truncate_output(&text, 10_000), truncate_output(&text, 10_000));
        assert_eq!(
            truncate_output(&text, 10_000).chars().count(),
            10_000 + TRUNCATION_MARKER.len()
        );
    }

    #[test]
    fn outcome_success_requires_zero_and_no_timeout() {
        let mut outcome = ExecutionOutcome {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            duration: Duration::ZERO,
        };
        assert!(outcome.succeeded());
        outcome.exit_code = Some(1);
        assert!(!outcome.succeeded());
        outcome.exit_code = None;
        outcome.timed_out = true;
        assert!(!outcome.succeeded());
    }
}
