//! Registry routing, configuration loading and concurrent command groups.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use common::{outcome, RecordingRunner};
use mcp_desktop_gateway::exec::{run_group, CommandSpec, FailureReason, GuardPolicy};
use mcp_desktop_gateway::{Connector, Error, GatewayConfig, HostPlatform, ToolRegistry};

fn registry(config: &GatewayConfig, runner: &Arc<RecordingRunner>) -> ToolRegistry {
    ToolRegistry::with_platform(config, runner.clone(), HostPlatform::Other)
}

#[tokio::test]
async fn default_registry_exposes_every_connector() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let registry = registry(&GatewayConfig::default(), &runner);

    let names: Vec<_> = registry.connectors().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names, vec!["hello_world", "shell", "applescript", "safari"]);

    let tools: Vec<_> = registry.list_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(tools.len(), 3 + 4 + 6 + 15);
    assert_eq!(&tools[..3], &["hello_world", "gateway_diagnostics", "echo"]);
    assert!(tools.contains(&"execute_command".to_string()));
    assert!(tools.contains(&"safari_search".to_string()));

    let uris: Vec<_> = registry.list_resources().into_iter().map(|r| r.uri).collect();
    assert!(uris.contains(&"gateway://hello/logs".to_string()));
    assert!(uris.contains(&"shell://env".to_string()));
    assert!(uris.contains(&"safari://tabs".to_string()));
}

#[tokio::test]
async fn disabled_connectors_are_not_registered() {
    let config = assert_ok!(GatewayConfig::from_toml_str(
        r#"
        [applescript]
        enabled = false

        [hello_world]
        enabled = false
        "#,
    ));
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let registry = registry(&config, &runner);

    let names: Vec<_> = registry.connectors().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names, vec!["shell"]);

    let result = registry.execute("echo", json!({"message": "hi"})).await;
    assert!(result.is_error);
    assert_eq!(result.text_content(), "Tool 'echo' not found");
}

#[tokio::test]
async fn safari_can_be_switched_off_alone() {
    let config = assert_ok!(GatewayConfig::from_toml_str("[applescript]\nsafari = false\n"));
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let registry = registry(&config, &runner);

    assert!(registry.connector("applescript").is_some());
    assert!(registry.connector("safari").is_none());
}

#[tokio::test]
async fn calls_are_routed_to_the_owning_connector() {
    let runner = Arc::new(RecordingRunner::succeeding("routed"));
    let registry = registry(&GatewayConfig::default(), &runner);

    let echo = registry.execute("echo", json!({"message": "hi"})).await;
    assert_eq!(echo.text_content(), "Echo: hi");

    let shell = registry.execute("execute_command", json!({"command": "echo x"})).await;
    assert!(shell.text_content().contains("routed"));

    let gated = registry.execute("get_clipboard", json!({})).await;
    assert_eq!(gated.text_content(), "AppleScript is only available on macOS");

    assert_eq!(runner.spawn_count(), 1);
    let shell_state = registry.connector("shell").unwrap().state();
    assert_eq!(shell_state.request_count(), 1);
}

#[tokio::test]
async fn unknown_tool_and_resource() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let registry = registry(&GatewayConfig::default(), &runner);

    let result = registry.execute("bogus_tool", json!({})).await;
    assert!(result.is_error);
    assert_eq!(result.text_content(), "Tool 'bogus_tool' not found");
    assert_eq!(result.error_message.as_deref(), Some("Tool 'bogus_tool' not found"));
    assert_eq!(runner.spawn_count(), 0);

    let err = assert_err!(registry.read_resource("nowhere://x").await);
    assert!(matches!(err, Error::ResourceNotFound(_)));
}

#[test]
fn prompts_are_routed_to_the_owning_connector() {
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let registry = registry(&GatewayConfig::default(), &runner);

    let names: Vec<_> = registry.list_prompts().into_iter().map(|p| p.name).collect();
    assert_eq!(
        names,
        vec![
            "hello_quick_test",
            "hello_debug_info",
            "shell_help",
            "system_analysis",
            "applescript_help",
            "automate_task",
        ]
    );

    let help = assert_ok!(registry.get_prompt("shell_help", json!({})));
    assert!(help.text_content().contains("execute_commands"));
    let shell = registry.connector("shell").unwrap();
    assert_eq!(shell.state().request_count(), 1);

    // prompts are text only, so the macOS gate does not apply
    let task = assert_ok!(registry.get_prompt("automate_task", json!({"task": "rename photos"})));
    assert_eq!(task.description, "Automation guidance for: rename photos");
    assert!(task.text_content().starts_with("Automating task: rename photos"));

    let missing = assert_err!(registry.get_prompt("automate_task", json!({})));
    assert!(matches!(missing, Error::MissingArgument(ref f) if f == "task"));

    let unknown = assert_err!(registry.get_prompt("nope", json!({})));
    assert!(matches!(unknown, Error::PromptNotFound(_)));
    assert_eq!(runner.spawn_count(), 0);
}

#[tokio::test]
async fn hello_resources_reflect_configured_log_capacity() {
    let config = assert_ok!(GatewayConfig::from_toml_str("request_log_capacity = 3\n"));
    let runner = Arc::new(RecordingRunner::succeeding(""));
    let registry = registry(&config, &runner);

    for i in 0..5 {
        registry.execute("echo", json!({"message": i.to_string()})).await;
    }
    let hello = registry.connector("hello_world").unwrap();
    assert_eq!(hello.state().log().capacity(), 3);
    assert_eq!(hello.state().log().len(), 3);

    let status = assert_ok!(registry.read_resource("gateway://hello/status").await);
    let status: serde_json::Value = serde_json::from_str(&status.text).unwrap();
    assert_eq!(status["metrics"]["total_requests"], 6);
}

#[test]
fn config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[shell]
shell = "/bin/bash"
timeout = 10
max_timeout = 20
allowed_commands = ["ls", "git"]
guard_policy = "warn"

[shell.environment]
LANG = "C"
"#
    )
    .unwrap();

    let config = assert_ok!(GatewayConfig::load(file.path()));
    assert_ok!(config.validate());
    assert_eq!(config.shell.shell, "/bin/bash");
    assert_eq!(config.shell.default_timeout(), Duration::from_secs(10));
    assert_eq!(config.shell.guard_policy, GuardPolicy::Warn);
    assert_eq!(config.shell.allowed_commands, vec!["ls", "git"]);
    assert_eq!(config.shell.environment.get("LANG").map(String::as_str), Some("C"));
    assert_eq!(config.applescript.guard_policy, GuardPolicy::Warn);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = assert_err!(GatewayConfig::load(&dir.path().join("absent.toml")));
    assert!(matches!(err, Error::Io(_)));
}

#[tokio::test]
async fn group_returns_outcomes_in_submission_order() {
    let runner = RecordingRunner::scripted(|spec| Ok(outcome(Some(0), &spec.args[1], "")));
    let specs: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|text| CommandSpec::new("/bin/sh", ["-c", *text]))
        .collect();

    let outcomes = assert_ok!(run_group(&runner, &specs).await);
    let stdout: Vec<_> = outcomes.into_iter().map(|o| o.stdout).collect();
    assert_eq!(stdout, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn group_failure_keeps_successful_outcomes() {
    let runner = RecordingRunner::scripted(|spec| match spec.args[1].as_str() {
        "spawn" => Err(Error::Spawn {
            program: spec.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        }),
        "fail" => Ok(outcome(Some(3), "", "bad")),
        _ => Ok(outcome(Some(0), "good", "")),
    });
    let specs: Vec<_> = ["ok", "fail", "spawn"]
        .iter()
        .map(|text| CommandSpec::new("/bin/sh", ["-c", *text]))
        .collect();

    let failure = assert_err!(run_group(&runner, &specs).await);
    assert_eq!(failure.to_string(), "2 of 3 commands failed");
    assert_eq!(failure.total, 3);
    assert_eq!(failure.failures.len(), 2);
    assert!(matches!(
        &failure.failures[0].reason,
        FailureReason::Exited(o) if o.exit_code == Some(3)
    ));
    assert!(matches!(
        &failure.failures[1].reason,
        FailureReason::Spawn(msg) if msg.contains("No such file")
    ));
    assert!(failure.outcomes[0].is_some());
    assert!(failure.outcomes[2].is_none());
    assert_eq!(runner.spawn_count(), 3);
}
