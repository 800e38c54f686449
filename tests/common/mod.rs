//! Shared test doubles.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use mcp_desktop_gateway::exec::{CommandRunner, CommandSpec, ExecutionOutcome};
use mcp_desktop_gateway::Result;

type Script = Box<dyn Fn(&CommandSpec) -> Result<ExecutionOutcome> + Send + Sync>;

/// Runner that records every spec and answers from a script instead of
/// spawning anything.
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    script: Script,
}

impl RecordingRunner {
    /// Every call exits 0 with `stdout`.
    pub fn succeeding(stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::scripted(move |_| Ok(outcome(Some(0), &stdout, "")))
    }

    /// Answer each call with `script`.
    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<ExecutionOutcome> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    /// Number of processes that would have been spawned.
    pub fn spawn_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Recorded specs, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// The text after `-c` / `-e` of every recorded call.
    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|spec| spec.args.get(1).cloned())
            .collect()
    }
}

#[async_trait::async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionOutcome> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.script)(spec)
    }
}

/// Outcome of a process that exited.
pub fn outcome(exit_code: Option<i32>, stdout: &str, stderr: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        exit_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        timed_out: false,
        duration: Duration::from_millis(5),
    }
}

/// Outcome of a process killed at its deadline.
pub fn timed_out() -> ExecutionOutcome {
    ExecutionOutcome {
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        timed_out: true,
        duration: Duration::from_secs(1),
    }
}

/// Whether `pid` still names a running process.
///
/// Zombies count as gone: once SIGKILLed, an orphan may wait a while for
/// its new parent to reap it.
#[cfg(unix)]
pub fn process_running(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence and permission.
    if unsafe { libc::kill(pid, 0) } != 0 {
        return std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH);
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // state is the first field after the parenthesized command name
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .map_or(true, |state| state != 'Z'),
        Err(_) => true,
    }
}

/// Poll until `pid` is gone or `within` elapses; true when it is gone.
#[cfg(unix)]
pub async fn wait_until_gone(pid: i32, within: Duration) -> bool {
    let deadline = std::time::Instant::now() + within;
    while std::time::Instant::now() < deadline {
        if !process_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    !process_running(pid)
}

/// Read a pid written by a test command.
pub fn read_pid(path: &std::path::Path) -> i32 {
    std::fs::read_to_string(path)
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}
