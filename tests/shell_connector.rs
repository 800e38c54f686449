//! Shell connector behavior: argument validation, guard, timeouts, output
//! normalization and command groups.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

#[cfg(unix)]
use common::{read_pid, wait_until_gone};
use common::{outcome, timed_out, RecordingRunner};
use mcp_desktop_gateway::config::ShellConfig;
use mcp_desktop_gateway::connectors::{Connector, ShellConnector};
use mcp_desktop_gateway::exec::{GuardPolicy, ProcessRunner};
use mcp_desktop_gateway::ConnectorState;

fn recorded(config: ShellConfig, runner: &Arc<RecordingRunner>) -> ShellConnector {
    ShellConnector::new(config, runner.clone(), ConnectorState::new(50))
}

fn real(config: ShellConfig) -> ShellConnector {
    ShellConnector::new(config, Arc::new(ProcessRunner), ConnectorState::new(50))
}

#[cfg(unix)]
#[tokio::test]
async fn echo_runs_and_reports_stdout() {
    let shell = real(ShellConfig::default());
    let result = shell
        .execute_tool("execute_command", json!({"command": "echo hello"}))
        .await;

    assert!(!result.is_error, "{}", result.text_content());
    let text = result.text_content();
    assert!(text.starts_with("Command: echo hello\n"));
    assert!(text.contains("Exit Code: 0\n"));
    assert!(text.contains("STDOUT:\nhello\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn long_command_is_killed_at_timeout() {
    let shell = real(ShellConfig::default());
    let start = Instant::now();
    let result = shell
        .execute_tool("execute_command", json!({"command": "sleep 100", "timeout": 1}))
        .await;

    assert!(result.is_error);
    assert_eq!(result.text_content(), "Error: Command timed out after 1 second");
    assert_eq!(result.error_message.as_deref(), Some("Command timeout"));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[cfg(unix)]
#[tokio::test]
async fn background_job_is_killed_after_shell_exits() {
    // The shell exits at once; the background job keeps stdout open until
    // the deadline.
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let command = format!("sleep 60 & echo $! > {}; echo started", pid_file.display());

    let shell = real(ShellConfig::default());
    let start = Instant::now();
    let result = shell
        .execute_tool("execute_command", json!({"command": command, "timeout": 1}))
        .await;

    assert!(result.is_error);
    assert_eq!(result.text_content(), "Error: Command timed out after 1 second");
    assert!(start.elapsed() < Duration::from_secs(10));

    let pid = read_pid(&pid_file);
    assert!(
        wait_until_gone(pid, Duration::from_secs(2)).await,
        "background job {} survived the timeout",
        pid
    );
}

#[cfg(unix)]
#[tokio::test]
async fn child_of_running_shell_is_killed_at_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let command = format!("sleep 60 & echo $! > {}; wait", pid_file.display());

    let shell = real(ShellConfig::default());
    let result = shell
        .execute_tool("execute_command", json!({"command": command, "timeout": 1}))
        .await;

    assert!(result.is_error);
    let pid = read_pid(&pid_file);
    assert!(
        wait_until_gone(pid, Duration::from_secs(2)).await,
        "child {} survived the timeout",
        pid
    );
}

#[tokio::test]
async fn dangerous_command_never_spawns() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell
        .execute_tool("execute_command", json!({"command": "rm -rf /"}))
        .await;

    assert!(result.is_error);
    assert!(result.text_content().contains("rm -rf"));
    assert_eq!(result.error_message.as_deref(), Some("Dangerous command blocked"));
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn guard_is_case_insensitive() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell
        .execute_tool("execute_command", json!({"command": "SUDO reboot"}))
        .await;

    assert!(result.is_error);
    assert!(result.text_content().contains("'sudo'"));
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn missing_or_blank_command_is_rejected() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let shell = recorded(ShellConfig::default(), &runner);

    for args in [json!({}), json!({"command": ""}), json!({"command": "   "}), json!(null)] {
        let result = shell.execute_tool("execute_command", args).await;
        assert!(result.is_error);
        assert_eq!(result.text_content(), "Error: command is required");
    }
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell.execute_tool("bogus_tool", json!({})).await;

    assert!(result.is_error);
    assert_eq!(result.text_content(), "Tool 'bogus_tool' not found");
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn spec_carries_shell_timeout_env_and_dir() {
    let runner = Arc::new(RecordingRunner::succeeding("ok"));
    let config = ShellConfig {
        shell: "/bin/bash".into(),
        environment: HashMap::from([("GATEWAY_TEST".to_string(), "1".to_string())]),
        ..ShellConfig::default()
    };
    let shell = recorded(config, &runner);

    let result = shell
        .execute_tool(
            "execute_command",
            json!({"command": "pwd", "working_dir": "/tmp", "timeout": 500}),
        )
        .await;

    assert!(!result.is_error);
    assert!(result.text_content().contains("Working Directory: /tmp\n"));

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let spec = &calls[0];
    assert_eq!(spec.program, "/bin/bash");
    assert_eq!(spec.args, vec!["-c".to_string(), "pwd".to_string()]);
    assert_eq!(spec.working_directory.as_deref(), Some(std::path::Path::new("/tmp")));
    // clamped to the 60s ceiling
    assert_eq!(spec.timeout, Duration::from_secs(60));
    assert_eq!(spec.environment.get("GATEWAY_TEST").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn nonzero_exit_is_an_error_with_both_streams() {
    let runner = Arc::new(RecordingRunner::scripted(|_| Ok(outcome(Some(2), "partial", "boom"))));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell
        .execute_tool("execute_command", json!({"command": "make"}))
        .await;

    assert!(result.is_error);
    assert_eq!(result.error_message.as_deref(), Some("Command exited with code 2"));
    let text = result.text_content();
    assert!(text.contains("Exit Code: 2\n"));
    assert!(text.contains("STDOUT:\npartial\n"));
    assert!(text.contains("STDERR:\nboom\n"));
}

#[tokio::test]
async fn warn_policy_runs_and_prepends_notice() {
    let runner = Arc::new(RecordingRunner::succeeding("done"));
    let config = ShellConfig {
        guard_policy: GuardPolicy::Warn,
        ..ShellConfig::default()
    };
    let shell = recorded(config, &runner);

    let result = shell
        .execute_tool("execute_command", json!({"command": "sudo true"}))
        .await;

    assert!(!result.is_error);
    assert_eq!(result.content.len(), 2);
    let warning = "Warning: Command contains potentially sensitive operations (matched 'sudo')";
    assert!(result.text_content().starts_with(warning));
    assert_eq!(runner.spawn_count(), 1);
}

#[tokio::test]
async fn allow_list_restricts_programs() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let config = ShellConfig {
        allowed_commands: vec!["ls".into(), "echo".into()],
        ..ShellConfig::default()
    };
    let shell = recorded(config, &runner);

    let denied = shell
        .execute_tool("execute_command", json!({"command": "cat /etc/hosts"}))
        .await;
    assert!(denied.is_error);
    assert!(denied.text_content().contains("not in allowed_commands"));
    assert_eq!(runner.spawn_count(), 0);

    let allowed = shell
        .execute_tool("execute_command", json!({"command": "/bin/ls -la"}))
        .await;
    assert!(!allowed.is_error);
    assert_eq!(runner.spawn_count(), 1);
}

#[tokio::test]
async fn extra_patterns_extend_the_deny_list() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let config = ShellConfig {
        extra_patterns: vec!["Shutdown".into()],
        ..ShellConfig::default()
    };
    let shell = recorded(config, &runner);

    let result = shell
        .execute_tool("execute_command", json!({"command": "shutdown -h now"}))
        .await;
    assert!(result.is_error);
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn recorded_timeout_is_reported_with_the_effective_limit() {
    let runner = Arc::new(RecordingRunner::scripted(|_| Ok(timed_out())));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell
        .execute_tool("execute_command", json!({"command": "yes"}))
        .await;

    assert!(result.is_error);
    assert_eq!(result.text_content(), "Error: Command timed out after 30 seconds");
}

#[cfg(unix)]
#[tokio::test]
async fn output_is_truncated_at_the_cap() {
    let config = ShellConfig {
        max_output_length: 10,
        ..ShellConfig::default()
    };
    let shell = real(config);

    let result = shell
        .execute_tool("execute_command", json!({"command": "printf abcdefghijklmnop"}))
        .await;

    assert!(!result.is_error);
    assert!(result
        .text_content()
        .contains("STDOUT:\nabcdefghij... (output truncated)\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn each_stream_is_capped_on_its_own() {
    let config = ShellConfig {
        max_output_length: 10,
        ..ShellConfig::default()
    };
    let shell = real(config);

    let result = shell
        .execute_tool(
            "execute_command",
            json!({"command": "printf abc; printf abcdefghijklmnop >&2"}),
        )
        .await;

    assert!(!result.is_error);
    let text = result.text_content();
    assert!(text.contains("STDOUT:\nabc\n"));
    assert!(text.contains("STDERR:\nabcdefghij... (output truncated)\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn invalid_utf8_is_replaced() {
    let shell = real(ShellConfig::default());

    let result = shell
        .execute_tool("execute_command", json!({"command": r"printf '\377ok'"}))
        .await;

    assert!(!result.is_error);
    assert!(result.text_content().contains("\u{FFFD}ok"));
}

#[cfg(unix)]
#[tokio::test]
async fn missing_interpreter_is_a_spawn_error() {
    let config = ShellConfig {
        shell: "/nonexistent/interpreter".into(),
        ..ShellConfig::default()
    };
    let shell = real(config);

    let result = shell
        .execute_tool("execute_command", json!({"command": "true"}))
        .await;

    assert!(result.is_error);
    assert!(result.text_content().starts_with("Error executing command:"));
}

#[tokio::test]
async fn group_success_reports_every_member() {
    let runner = Arc::new(RecordingRunner::succeeding("ok"));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell
        .execute_tool("execute_commands", json!({"commands": ["echo a", "echo b"]}))
        .await;

    assert!(!result.is_error);
    let text = result.text_content();
    assert!(text.starts_with("All 2 commands succeeded\n\n"));
    assert!(text.contains("[1/2] Command: echo a"));
    assert!(text.contains("[2/2] Command: echo b"));
    assert_eq!(runner.spawn_count(), 2);
}

#[tokio::test]
async fn group_failure_lists_every_failed_member() {
    let runner = Arc::new(RecordingRunner::scripted(|spec| {
        if spec.args[1] == "false" {
            Ok(outcome(Some(1), "", ""))
        } else if spec.args[1] == "slow" {
            Ok(timed_out())
        } else {
            Ok(outcome(Some(0), "fine", ""))
        }
    }));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell
        .execute_tool(
            "execute_commands",
            json!({"commands": ["true", "false", "slow"], "timeout": 2}),
        )
        .await;

    assert!(result.is_error);
    assert_eq!(result.error_message.as_deref(), Some("2 of 3 commands failed"));
    let text = result.text_content();
    assert!(text.starts_with("Error: 2 of 3 commands failed\n"));
    assert!(text.contains("- [2/3] false: exit code 1\n"));
    assert!(text.contains("- [3/3] slow: timed out after 2 seconds\n"));
    // every member still ran
    assert_eq!(runner.spawn_count(), 3);
}

#[tokio::test]
async fn group_with_a_dangerous_member_runs_nothing() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell
        .execute_tool("execute_commands", json!({"commands": ["ls", "sudo ls"]}))
        .await;

    assert!(result.is_error);
    assert!(result
        .text_content()
        .starts_with("Command 2 of 2 rejected; no commands were run.\n"));
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn empty_group_is_rejected() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let shell = recorded(ShellConfig::default(), &runner);

    let result = shell.execute_tool("execute_commands", json!({"commands": []})).await;
    assert!(result.is_error);
    assert_eq!(result.text_content(), "Error: commands is required");
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn list_directory_shows_entries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join(".secret"), "x").unwrap();

    let runner = Arc::new(RecordingRunner::succeeding(""));
    let shell = recorded(ShellConfig::default(), &runner);
    let path = dir.path().display().to_string();

    let result = shell
        .execute_tool("list_directory", json!({"path": path}))
        .await;
    assert!(!result.is_error);
    let text = result.text_content();
    assert!(text
        .lines()
        .any(|l| l.starts_with("FILE") && l.ends_with(" notes.txt") && l.contains(" 5 ")));
    assert!(text.lines().any(|l| l.starts_with("DIR") && l.ends_with(" sub")));
    assert!(!text.contains(".secret"));

    let result = shell
        .execute_tool("list_directory", json!({"path": path, "show_hidden": true}))
        .await;
    assert!(result.text_content().contains(".secret"));
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn list_directory_errors() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("file"), "").unwrap();
    let shell = recorded(ShellConfig::default(), &Arc::new(RecordingRunner::succeeding("")));

    let missing = shell
        .execute_tool(
            "list_directory",
            json!({"path": dir.path().join("nope").display().to_string()}),
        )
        .await;
    assert!(missing.is_error);
    assert_eq!(missing.error_message.as_deref(), Some("Path not found"));

    let file = shell
        .execute_tool(
            "list_directory",
            json!({"path": dir.path().join("file").display().to_string()}),
        )
        .await;
    assert!(file.is_error);
    assert_eq!(file.error_message.as_deref(), Some("Not a directory"));
}

#[tokio::test]
async fn system_info_and_resources() {
    let shell = recorded(ShellConfig::default(), &Arc::new(RecordingRunner::succeeding("")));

    let info = shell.execute_tool("get_system_info", json!({})).await;
    assert!(info.text_content().starts_with("=== System Information ===\n"));

    std::env::set_var("GATEWAY_TEST_API_TOKEN", "hunter2");
    let env = shell.read_resource("shell://env").await.unwrap();
    let env: serde_json::Value = serde_json::from_str(&env.text).unwrap();
    assert!(env.get("GATEWAY_TEST_API_TOKEN").is_none());

    let cwd = shell.read_resource("shell://cwd").await.unwrap();
    assert_eq!(cwd.mime_type, "application/json");
    assert!(shell.read_resource("shell://nope").await.is_err());
}

#[tokio::test]
async fn every_call_is_logged() {
    let shell = recorded(ShellConfig::default(), &Arc::new(RecordingRunner::succeeding("")));

    shell.execute_tool("execute_command", json!({"command": "ls"})).await;
    shell.execute_tool("bogus_tool", json!({})).await;
    let _ = shell.read_resource("shell://cwd").await;

    let state = shell.state();
    assert_eq!(state.request_count(), 3);
    let names: Vec<_> = state.log().recent(10).into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["execute_command", "bogus_tool", "shell://cwd"]);
}
