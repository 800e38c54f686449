//! Shell connector: runs commands through a shell interpreter.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{effective_timeout, ShellConfig};
use crate::connectors::{parse_args, render_static, require, Connector, StaticPrompt};
use crate::error::{Error, Result};
use crate::exec::{
    normalize, resolve_working_dir, run_group, CommandExecutor, CommandRequest, CommandRunner,
    CommandSpec, FailureReason, GuardCheck, NormalizeContext, PatternGuard, Subject,
};
use crate::protocol::{
    GetPromptResult, PromptDefinition, ResourceContents, ResourceDefinition, ToolCallResult,
    ToolDefinition,
};
use crate::state::{ConnectorState, RequestKind};

/// Environment variable names containing any of these are hidden from `shell://env`.
const SENSITIVE_ENV_MARKERS: &[&str] = &["password", "secret", "key", "token", "auth"];

const PROMPTS: &[StaticPrompt] = &[
    StaticPrompt {
        name: "shell_help",
        description: "Get help with shell commands and safety guidelines",
        text: "Shell Connector Help:

AVAILABLE TOOLS:
1. execute_command - Run a shell command
2. execute_commands - Run several commands concurrently
3. list_directory - Browse the file system
4. get_system_info - Get system information

SAFETY FEATURES:
- Commands are scanned for dangerous patterns before anything runs
- Output is truncated past a configured length
- Every command has a timeout; the whole process group is killed when it expires

EXAMPLE USAGE:
- execute_command: command=\"ls -la\"
- execute_command: command=\"ps aux | grep python\"
- execute_commands: commands=[\"uname -a\", \"df -h\"]
- list_directory: path=\"/Users\" show_hidden=true
- get_system_info: (no parameters)

BEST PRACTICES:
- Use specific paths rather than wildcards
- Check system info before running platform-specific commands
- Use list_directory to explore before executing commands",
    },
    StaticPrompt {
        name: "system_analysis",
        description: "Perform basic system analysis",
        text: "Perform basic system analysis:

1. Get system information with get_system_info
2. Check the current directory with list_directory
3. Look at the environment with the shell://env resource
4. Check running processes: execute_command \"ps aux | head -20\"
5. Check disk usage: execute_command \"df -h\"
6. Check memory: execute_command \"free -h\" (Linux) or \"vm_stat\" (macOS)

This gives a good overview of the current system state.",
    },
];

/// Tools exposed by [`ShellConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellTool {
    /// Run one command.
    ExecuteCommand,
    /// Run several commands concurrently.
    ExecuteCommands,
    /// List a directory.
    ListDirectory,
    /// Report host details.
    GetSystemInfo,
}

impl ShellTool {
    /// Every tool, in listing order.
    pub const ALL: [ShellTool; 4] = [
        ShellTool::ExecuteCommand,
        ShellTool::ExecuteCommands,
        ShellTool::ListDirectory,
        ShellTool::GetSystemInfo,
    ];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            ShellTool::ExecuteCommand => "execute_command",
            ShellTool::ExecuteCommands => "execute_commands",
            ShellTool::ListDirectory => "list_directory",
            ShellTool::GetSystemInfo => "get_system_info",
        }
    }

    /// Look up by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn definition(self, max_timeout: u64) -> ToolDefinition {
        let (description, input_schema) = match self {
            ShellTool::ExecuteCommand => (
                "Execute a shell command. Commands matching the dangerous-pattern list are rejected.".to_string(),
                json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "Shell command to execute"
                        },
                        "working_dir": {
                            "type": "string",
                            "description": "Working directory (optional)"
                        },
                        "timeout": {
                            "type": "number",
                            "description": format!("Timeout in seconds (optional, max {})", max_timeout)
                        }
                    },
                    "required": ["command"]
                }),
            ),
            ShellTool::ExecuteCommands => (
                "Execute several shell commands concurrently; fails if any of them fails.".to_string(),
                json!({
                    "type": "object",
                    "properties": {
                        "commands": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Shell commands to execute"
                        },
                        "working_dir": {
                            "type": "string",
                            "description": "Working directory for every command (optional)"
                        },
                        "timeout": {
                            "type": "number",
                            "description": format!("Per-command timeout in seconds (optional, max {})", max_timeout)
                        }
                    },
                    "required": ["commands"]
                }),
            ),
            ShellTool::ListDirectory => (
                "List files and directories".to_string(),
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Directory path to list (default: current directory)"
                        },
                        "show_hidden": {
                            "type": "boolean",
                            "description": "Show hidden files and directories"
                        }
                    }
                }),
            ),
            ShellTool::GetSystemInfo => (
                "Get system information".to_string(),
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
        };

        ToolDefinition {
            name: self.name().into(),
            description,
            input_schema,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteCommandArgs {
    command: Option<String>,
    working_dir: Option<String>,
    timeout: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExecuteCommandsArgs {
    #[serde(default)]
    commands: Vec<String>,
    working_dir: Option<String>,
    timeout: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ListDirectoryArgs {
    path: Option<String>,
    #[serde(default)]
    show_hidden: bool,
}

/// Runs commands via `<shell> -c <command>`.
pub struct ShellConnector {
    config: ShellConfig,
    executor: CommandExecutor,
    state: ConnectorState,
}

impl ShellConnector {
    /// Connector name.
    pub const NAME: &'static str = "shell";

    /// Create a shell connector.
    pub fn new(config: ShellConfig, runner: Arc<dyn CommandRunner>, state: ConnectorState) -> Self {
        let guard = PatternGuard::shell()
            .with_patterns(&config.extra_patterns)
            .with_allowed_programs(config.allowed_commands.iter().cloned());
        let executor = CommandExecutor::new(runner, guard, config.guard_policy);
        Self {
            config,
            executor,
            state,
        }
    }

    fn default_dir(&self) -> Option<PathBuf> {
        self.config
            .working_directory
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    fn command_request(
        &self,
        command: String,
        working_dir: Option<&str>,
        timeout: Option<f64>,
    ) -> CommandRequest {
        let timeout = effective_timeout(
            timeout,
            self.config.default_timeout(),
            self.config.timeout_ceiling(),
        );
        let args = ["-c".to_string(), command.clone()];
        let mut spec = CommandSpec::new(self.config.shell.clone(), args)
            .timeout(timeout)
            .max_output_length(self.config.max_output_length)
            .envs(&self.config.environment);
        spec.working_directory = resolve_working_dir(working_dir, self.default_dir().as_ref());

        CommandRequest {
            subject: Subject::Command,
            text: command,
            spec,
        }
    }

    async fn execute_command(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: ExecuteCommandArgs = parse_args(arguments)?;
        let command = require(args.command, "command")?;
        let request = self.command_request(command, args.working_dir.as_deref(), args.timeout);
        Ok(self.executor.execute(request).await)
    }

    async fn execute_commands(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: ExecuteCommandsArgs = parse_args(arguments)?;
        if args.commands.is_empty() {
            return Err(Error::MissingArgument("commands".into()));
        }

        let mut requests = Vec::with_capacity(args.commands.len());
        for (index, command) in args.commands.into_iter().enumerate() {
            let command = require(Some(command), &format!("commands[{}]", index))?;
            requests.push(self.command_request(command, args.working_dir.as_deref(), args.timeout));
        }

        // Nothing runs unless every member clears the guard.
        let total = requests.len();
        let mut warnings = Vec::new();
        for (index, request) in requests.iter().enumerate() {
            match self.executor.check(request.subject, &request.text) {
                GuardCheck::Clear => {}
                GuardCheck::Warned(notice) => {
                    warnings.push(format!("[{}/{}] {}", index + 1, total, notice))
                }
                GuardCheck::Blocked(result) => {
                    return Ok(result.with_notice(format!(
                        "Command {} of {} rejected; no commands were run.",
                        index + 1,
                        total
                    )));
                }
            }
        }

        let specs: Vec<CommandSpec> = requests.iter().map(|r| r.spec.clone()).collect();
        debug!(count = total, "running command group");

        let section = |index: usize, outcome: &crate::exec::ExecutionOutcome| {
            let request = &requests[index];
            let ctx = NormalizeContext {
                subject: request.subject,
                text: &request.text,
                working_directory: request.spec.working_directory.as_deref(),
                timeout: request.spec.timeout,
            };
            format!("[{}/{}] {}", index + 1, total, normalize(outcome, &ctx).text_content())
        };

        let mut result = match run_group(self.executor.runner(), &specs).await {
            Ok(outcomes) => {
                let text = outcomes
                    .iter()
                    .enumerate()
                    .map(|(index, outcome)| section(index, outcome))
                    .collect::<Vec<_>>()
                    .join("\n");
                ToolCallResult::text(format!("All {} commands succeeded\n\n{}", total, text))
            }
            Err(failure) => {
                let mut text = format!("Error: {}\n", failure);
                for member in &failure.failures {
                    let command = &requests[member.index].text;
                    let reason = match &member.reason {
                        FailureReason::Exited(outcome) if outcome.timed_out => {
                            let limit = requests[member.index].spec.timeout;
                            let limit = crate::exec::normalize::format_seconds(limit);
                            format!("timed out after {}", limit)
                        }
                        FailureReason::Exited(outcome) => match outcome.exit_code {
                            Some(code) => format!("exit code {}", code),
                            None => "terminated by signal".to_string(),
                        },
                        FailureReason::Spawn(e) => format!("failed to start: {}", e),
                    };
                    let position = member.index + 1;
                    let _ = writeln!(text, "- [{}/{}] {}: {}", position, total, command, reason);
                }
                for (index, outcome) in failure.outcomes.iter().enumerate() {
                    if let Some(outcome) = outcome {
                        text.push('\n');
                        text.push_str(&section(index, outcome));
                    }
                }
                ToolCallResult::error(text, failure.to_string())
            }
        };

        for warning in warnings.into_iter().rev() {
            result = result.with_notice(warning);
        }
        Ok(result)
    }

    async fn list_directory(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: ListDirectoryArgs = parse_args(arguments)?;
        let requested = args.path.unwrap_or_else(|| ".".into());
        let base = self.default_dir().unwrap_or_else(|| PathBuf::from("."));
        let path = base.join(expand_home(&requested));

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return Ok(ToolCallResult::error(
                    format!("Error: Path does not exist: {}", path.display()),
                    "Path not found",
                ));
            }
        };
        if !metadata.is_dir() {
            return Ok(ToolCallResult::error(
                format!("Error: Path is not a directory: {}", path.display()),
                "Not a directory",
            ));
        }

        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !args.show_hidden && name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut rows = Vec::with_capacity(names.len());
        for name in &names {
            let item_path = path.join(name);
            let row = match tokio::fs::metadata(&item_path).await {
                Ok(meta) => {
                    let kind = if meta.is_dir() { "DIR" } else { "FILE" };
                    let size = if meta.is_file() { meta.len() } else { 0 };
                    let modified = meta
                        .modified()
                        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|_| "N/A".into());
                    format!("{:4} {:>10} {:>19} {}", kind, size, modified, name)
                }
                Err(_) => format!("{:4} {:>10} {:>19} {}", "FILE", "N/A", "N/A", name),
            };
            rows.push(row);
        }

        let mut text = format!("Directory: {}\n", path.display());
        let _ = writeln!(text, "{:4} {:>10} {:>19} NAME", "TYPE", "SIZE", "MODIFIED");
        text.push_str(&"-".repeat(60));
        text.push('\n');
        if rows.is_empty() {
            text.push_str("Directory is empty");
        } else {
            text.push_str(&rows.join("\n"));
        }

        Ok(ToolCallResult::text(text))
    }

    fn system_info(&self) -> ToolCallResult {
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".into());
        let info = [
            ("System", std::env::consts::OS.to_string()),
            ("Family", std::env::consts::FAMILY.to_string()),
            ("Machine", std::env::consts::ARCH.to_string()),
            ("Current Directory", cwd),
            ("User", std::env::var("USER").unwrap_or_else(|_| "unknown".into())),
            ("Shell", std::env::var("SHELL").unwrap_or_else(|_| "unknown".into())),
            ("Command Interpreter", self.config.shell.clone()),
            ("Process Id", std::process::id().to_string()),
            ("Gateway Version", env!("CARGO_PKG_VERSION").to_string()),
        ];

        let mut text = String::from("=== System Information ===\n");
        for (key, value) in info {
            let _ = writeln!(text, "{}: {}", key, value);
        }
        ToolCallResult::text(text)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(path.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_ENV_MARKERS.iter().any(|marker| key.contains(marker))
}

#[async_trait::async_trait]
impl Connector for ShellConnector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        ShellTool::ALL
            .into_iter()
            .map(|tool| tool.definition(self.config.max_timeout))
            .collect()
    }

    fn resources(&self) -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition {
                uri: "shell://env".into(),
                name: "Environment Variables".into(),
                description: "Current environment variables, sensitive names removed".into(),
                mime_type: "application/json".into(),
            },
            ResourceDefinition {
                uri: "shell://cwd".into(),
                name: "Current Working Directory".into(),
                description: "Current working directory information".into(),
                mime_type: "application/json".into(),
            },
        ]
    }

    fn state(&self) -> &ConnectorState {
        &self.state
    }

    async fn execute_tool(&self, name: &str, arguments: serde_json::Value) -> ToolCallResult {
        self.state.record(RequestKind::Tool, name, &arguments);

        let Some(tool) = ShellTool::from_name(name) else {
            return Error::ToolNotFound(name.to_string()).into_tool_result();
        };

        let result = match tool {
            ShellTool::ExecuteCommand => self.execute_command(arguments).await,
            ShellTool::ExecuteCommands => self.execute_commands(arguments).await,
            ShellTool::ListDirectory => self.list_directory(arguments).await,
            ShellTool::GetSystemInfo => Ok(self.system_info()),
        };
        result.unwrap_or_else(Error::into_tool_result)
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        self.state.record(RequestKind::Resource, uri, &serde_json::Value::Null);

        match uri {
            "shell://env" => {
                let env: BTreeMap<String, String> = std::env::vars()
                    .filter(|(key, _)| !is_sensitive(key))
                    .collect();
                ResourceContents::json(uri, &json!(env))
            }
            "shell://cwd" => {
                let cwd = std::env::current_dir()?;
                let writable = std::fs::metadata(&cwd)
                    .map(|m| !m.permissions().readonly())
                    .unwrap_or(false);
                ResourceContents::json(
                    uri,
                    &json!({
                        "current_directory": cwd.display().to_string(),
                        "exists": cwd.exists(),
                        "is_writable": writable,
                        "parent_directory": cwd.parent().map(|p| p.display().to_string()),
                    }),
                )
            }
            _ => Err(Error::ResourceNotFound(uri.to_string())),
        }
    }

    fn prompts(&self) -> Vec<PromptDefinition> {
        PROMPTS.iter().map(StaticPrompt::definition).collect()
    }

    fn get_prompt(&self, name: &str, arguments: serde_json::Value) -> Result<GetPromptResult> {
        self.state.record(RequestKind::Prompt, name, &arguments);
        render_static(PROMPTS, name)
    }
}
