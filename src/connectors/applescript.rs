//! AppleScript connector: macOS automation through `osascript`.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::config::{effective_timeout, AppleScriptConfig};
use crate::connectors::{
    escape_applescript, parse_args, render_static, require, Connector, HostPlatform, StaticPrompt,
    APPLESCRIPT_UNSUPPORTED,
};
use crate::error::{Error, Result};
use crate::exec::{
    CommandExecutor, CommandRequest, CommandRunner, CommandSpec, PatternGuard, Subject,
};
use crate::protocol::{
    GetPromptResult, PromptDefinition, ResourceContents, ResourceDefinition, ToolCallResult,
    ToolDefinition,
};
use crate::state::{ConnectorState, RequestKind};

const RUNNING_APPS_SCRIPT: &str = r#"
tell application "System Events"
    set appList to {}
    repeat with proc in (every process whose background only is false)
        set end of appList to name of proc
    end repeat
end tell
return appList
"#;

/// `osascript` plumbing shared by the AppleScript family of connectors.
#[derive(Debug, Clone)]
pub(crate) struct ScriptHost {
    config: AppleScriptConfig,
    executor: CommandExecutor,
    platform: HostPlatform,
}

impl ScriptHost {
    pub(crate) fn new(
        config: AppleScriptConfig,
        runner: Arc<dyn CommandRunner>,
        platform: HostPlatform,
    ) -> Self {
        let executor =
            CommandExecutor::new(runner, PatternGuard::applescript(), config.guard_policy);
        Self {
            config,
            executor,
            platform,
        }
    }

    pub(crate) fn supported(&self) -> bool {
        self.platform.is_macos()
    }

    /// Fixed result for every call on a non-macOS host.
    pub(crate) fn unsupported() -> ToolCallResult {
        Error::PlatformUnsupported(APPLESCRIPT_UNSUPPORTED.into()).into_tool_result()
    }

    /// Tool description, flagged when the host cannot run it.
    pub(crate) fn describe(&self, description: &str) -> String {
        if self.supported() {
            description.to_string()
        } else {
            format!("{} (macOS only)", description)
        }
    }

    pub(crate) fn max_timeout(&self) -> u64 {
        self.config.max_timeout
    }

    fn request(&self, script: &str, timeout: Option<f64>) -> CommandRequest {
        let timeout = effective_timeout(
            timeout,
            self.config.default_timeout(),
            self.config.timeout_ceiling(),
        );
        let spec = CommandSpec::new("osascript", ["-e".to_string(), script.to_string()])
            .timeout(timeout)
            .max_output_length(self.config.max_output_length);
        CommandRequest {
            subject: Subject::Script,
            text: script.to_string(),
            spec,
        }
    }

    /// Run caller-supplied script text through the guard.
    pub(crate) async fn run(&self, script: &str, timeout: Option<f64>) -> ToolCallResult {
        self.executor.execute(self.request(script, timeout)).await
    }

    /// Run a script built from a fixed template.
    pub(crate) async fn run_template(&self, script: &str) -> ToolCallResult {
        self.executor.execute_unguarded(self.request(script, None)).await
    }

    /// Run a template and return its trimmed stdout.
    pub(crate) async fn capture(
        &self,
        script: &str,
    ) -> std::result::Result<String, ToolCallResult> {
        self.executor.capture(self.request(script, None)).await
    }
}

/// Split AppleScript list output (`a, b, c`) into items.
pub(crate) fn parse_list(output: &str) -> Vec<String> {
    output
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(", ")
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tools exposed by [`AppleScriptConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppleScriptTool {
    /// Run raw AppleScript.
    RunAppleScript,
    /// Show a notification.
    SystemNotification,
    /// List foreground applications.
    GetRunningApps,
    /// Activate, quit or hide an application.
    ControlApp,
    /// Read the clipboard.
    GetClipboard,
    /// Write the clipboard.
    SetClipboard,
}

impl AppleScriptTool {
    /// Every tool, in listing order.
    pub const ALL: [AppleScriptTool; 6] = [
        AppleScriptTool::RunAppleScript,
        AppleScriptTool::SystemNotification,
        AppleScriptTool::GetRunningApps,
        AppleScriptTool::ControlApp,
        AppleScriptTool::GetClipboard,
        AppleScriptTool::SetClipboard,
    ];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            AppleScriptTool::RunAppleScript => "run_applescript",
            AppleScriptTool::SystemNotification => "system_notification",
            AppleScriptTool::GetRunningApps => "get_running_apps",
            AppleScriptTool::ControlApp => "control_app",
            AppleScriptTool::GetClipboard => "get_clipboard",
            AppleScriptTool::SetClipboard => "set_clipboard",
        }
    }

    /// Look up by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn definition(self, host: &ScriptHost) -> ToolDefinition {
        let (description, input_schema) = match self {
            AppleScriptTool::RunAppleScript => (
                "Execute AppleScript code",
                json!({
                    "type": "object",
                    "properties": {
                        "script": {
                            "type": "string",
                            "description": "AppleScript code to execute"
                        },
                        "timeout": {
                            "type": "number",
                            "description": format!("Timeout in seconds (optional, max {})", host.max_timeout())
                        }
                    },
                    "required": ["script"]
                }),
            ),
            AppleScriptTool::SystemNotification => (
                "Display a system notification",
                json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Notification title"},
                        "message": {"type": "string", "description": "Notification message"},
                        "sound": {"type": "string", "description": "Sound name (optional)"}
                    },
                    "required": ["title", "message"]
                }),
            ),
            AppleScriptTool::GetRunningApps => (
                "Get list of currently running applications",
                json!({"type": "object", "properties": {}}),
            ),
            AppleScriptTool::ControlApp => (
                "Control applications (activate, quit, hide)",
                json!({
                    "type": "object",
                    "properties": {
                        "app_name": {"type": "string", "description": "Name of the application"},
                        "action": {
                            "type": "string",
                            "enum": ["activate", "quit", "hide"],
                            "description": "Action to perform"
                        }
                    },
                    "required": ["app_name", "action"]
                }),
            ),
            AppleScriptTool::GetClipboard => (
                "Get clipboard contents",
                json!({"type": "object", "properties": {}}),
            ),
            AppleScriptTool::SetClipboard => (
                "Set clipboard contents",
                json!({
                    "type": "object",
                    "properties": {
                        "text": {"type": "string", "description": "Text to copy to clipboard"}
                    },
                    "required": ["text"]
                }),
            ),
        };

        ToolDefinition {
            name: self.name().into(),
            description: host.describe(description),
            input_schema,
        }
    }
}

const HELP_PROMPT: StaticPrompt = StaticPrompt {
    name: "applescript_help",
    description: "Get help with AppleScript automation",
    text: r#"AppleScript Connector Help

TOOLS:
1. run_applescript - Execute AppleScript code
   script: the code to run, e.g. tell application "Safari" to activate
2. system_notification - Display a macOS notification
   title, message, optional sound
3. get_running_apps - List running applications
4. control_app - activate, quit or hide an application
   app_name="Safari" action="activate"
5. get_clipboard - Read the clipboard text
6. set_clipboard - Replace the clipboard text

Safari is driven by the safari_* tools of the safari connector.

RESOURCES:
- applescript://apps - running applications
- applescript://system - automation capabilities

SAFETY:
- Scripts are checked for dangerous patterns (warned or blocked per configuration)
- Every script runs under a timeout
- Only available on macOS

COMMON PATTERNS:
1. Activating an app:
   tell application "AppName" to activate
2. GUI automation:
   tell application "System Events"
       tell process "AppName"
           click menu item "Save" of menu "File" of menu bar 1
       end tell
   end tell
3. Window names:
   tell application "AppName" to get name of every window"#,
};

const AUTOMATE_TASK: &str = "automate_task";

#[derive(Debug, Deserialize)]
struct AutomateTaskArgs {
    task: Option<String>,
}

fn automate_task_prompt(task: &str) -> String {
    format!(
        "Automating task: {}

APPROACH:
1. Identify the applications involved
2. Check whether they are running with get_running_apps
3. Use control_app to activate or manage them
4. Use run_applescript for custom automation
5. Test with simple operations first

COMMON BUILDING BLOCKS:
- Opening applications: control_app with action \"activate\"
- Notifications: system_notification
- Clipboard: get_clipboard, set_clipboard
- Window management: run_applescript with System Events

EXAMPLE WORKFLOW:
1. get_running_apps to see the current state
2. control_app to open the required applications
3. run_applescript for the specific automation
4. system_notification to confirm completion",
        task
    )
}

#[derive(Debug, Deserialize)]
struct RunArgs {
    script: Option<String>,
    timeout: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NotificationArgs {
    title: Option<String>,
    message: Option<String>,
    sound: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ControlAppArgs {
    app_name: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClipboardArgs {
    text: Option<String>,
}

/// Application lifecycle actions for `control_app`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppAction {
    Activate,
    Quit,
    Hide,
}

impl AppAction {
    fn parse(action: &str) -> Result<Self> {
        match action.to_lowercase().as_str() {
            "activate" => Ok(AppAction::Activate),
            "quit" => Ok(AppAction::Quit),
            "hide" => Ok(AppAction::Hide),
            _ => Err(Error::InvalidParams(format!("unknown action '{}'", action))),
        }
    }

    fn script(self, app: &str) -> String {
        let app = escape_applescript(app);
        match self {
            AppAction::Activate => format!(r#"tell application "{}" to activate"#, app),
            AppAction::Quit => format!(r#"tell application "{}" to quit"#, app),
            AppAction::Hide => format!(
                r#"tell application "System Events" to set visible of process "{}" to false"#,
                app
            ),
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            AppAction::Activate => "activated",
            AppAction::Quit => "quit",
            AppAction::Hide => "hid",
        }
    }
}

/// General-purpose AppleScript connector.
pub struct AppleScriptConnector {
    host: ScriptHost,
    state: ConnectorState,
}

impl AppleScriptConnector {
    /// Connector name.
    pub const NAME: &'static str = "applescript";

    /// Create a connector for the host this binary runs on.
    pub fn new(
        config: AppleScriptConfig,
        runner: Arc<dyn CommandRunner>,
        state: ConnectorState,
    ) -> Self {
        Self::with_platform(config, runner, state, HostPlatform::current())
    }

    /// Create a connector with an explicit platform.
    pub fn with_platform(
        config: AppleScriptConfig,
        runner: Arc<dyn CommandRunner>,
        state: ConnectorState,
        platform: HostPlatform,
    ) -> Self {
        Self {
            host: ScriptHost::new(config, runner, platform),
            state,
        }
    }

    async fn run_applescript(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: RunArgs = parse_args(arguments)?;
        let script = require(args.script, "script")?;
        Ok(self.host.run(&script, args.timeout).await)
    }

    async fn system_notification(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: NotificationArgs = parse_args(arguments)?;
        let title = require(args.title, "title")?;
        let message = require(args.message, "message")?;

        let mut script = format!(
            r#"display notification "{}" with title "{}""#,
            escape_applescript(&message),
            escape_applescript(&title)
        );
        if let Some(sound) = args.sound.filter(|s| !s.trim().is_empty()) {
            script.push_str(&format!(r#" sound name "{}""#, escape_applescript(&sound)));
        }

        let result = self.host.run_template(&script).await;
        if result.is_error {
            return Ok(result);
        }
        Ok(ToolCallResult::text(format!("Notification displayed: {}", title)))
    }

    async fn running_apps(&self) -> std::result::Result<Vec<String>, ToolCallResult> {
        let output = self.host.capture(RUNNING_APPS_SCRIPT).await?;
        Ok(parse_list(&output))
    }

    async fn get_running_apps(&self) -> ToolCallResult {
        match self.running_apps().await {
            Ok(apps) if apps.is_empty() => ToolCallResult::text("Running Applications:\n(none)"),
            Ok(apps) => {
                let list = apps
                    .iter()
                    .map(|app| format!("- {}", app))
                    .collect::<Vec<_>>()
                    .join("\n");
                ToolCallResult::text(format!("Running Applications:\n{}", list))
            }
            Err(result) => result,
        }
    }

    async fn control_app(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: ControlAppArgs = parse_args(arguments)?;
        let app_name = require(args.app_name, "app_name")?;
        let action = AppAction::parse(&require(args.action, "action")?)?;

        let result = self.host.run_template(&action.script(&app_name)).await;
        if result.is_error {
            return Ok(result);
        }
        Ok(ToolCallResult::text(format!(
            "Successfully {} {}",
            action.past_tense(),
            app_name
        )))
    }

    async fn get_clipboard(&self) -> ToolCallResult {
        match self.host.capture("return the clipboard").await {
            Ok(contents) => ToolCallResult::text(format!("Clipboard contents:\n{}", contents)),
            Err(result) => result,
        }
    }

    async fn set_clipboard(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: ClipboardArgs = parse_args(arguments)?;
        let text = match args.text {
            Some(text) if !text.is_empty() => text,
            _ => return Err(Error::MissingArgument("text".into())),
        };

        let script = format!(r#"set the clipboard to "{}""#, escape_applescript(&text));
        let result = self.host.run_template(&script).await;
        if result.is_error {
            return Ok(result);
        }

        let preview: String = text.chars().take(50).collect();
        let ellipsis = if text.chars().count() > 50 { "..." } else { "" };
        Ok(ToolCallResult::text(format!(
            "Successfully copied to clipboard: {}{}",
            preview, ellipsis
        )))
    }
}

#[async_trait::async_trait]
impl Connector for AppleScriptConnector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        AppleScriptTool::ALL
            .into_iter()
            .map(|tool| tool.definition(&self.host))
            .collect()
    }

    fn resources(&self) -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition {
                uri: "applescript://apps".into(),
                name: "Running Applications".into(),
                description: "List of currently running applications".into(),
                mime_type: "application/json".into(),
            },
            ResourceDefinition {
                uri: "applescript://system".into(),
                name: "System Information".into(),
                description: "macOS automation capabilities".into(),
                mime_type: "application/json".into(),
            },
        ]
    }

    fn state(&self) -> &ConnectorState {
        &self.state
    }

    async fn execute_tool(&self, name: &str, arguments: serde_json::Value) -> ToolCallResult {
        self.state.record(RequestKind::Tool, name, &arguments);

        if !self.host.supported() {
            return ScriptHost::unsupported();
        }

        let Some(tool) = AppleScriptTool::from_name(name) else {
            return Error::ToolNotFound(name.to_string()).into_tool_result();
        };

        let result = match tool {
            AppleScriptTool::RunAppleScript => self.run_applescript(arguments).await,
            AppleScriptTool::SystemNotification => self.system_notification(arguments).await,
            AppleScriptTool::GetRunningApps => Ok(self.get_running_apps().await),
            AppleScriptTool::ControlApp => self.control_app(arguments).await,
            AppleScriptTool::GetClipboard => Ok(self.get_clipboard().await),
            AppleScriptTool::SetClipboard => self.set_clipboard(arguments).await,
        };
        result.unwrap_or_else(Error::into_tool_result)
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        self.state.record(RequestKind::Resource, uri, &serde_json::Value::Null);

        if !self.host.supported() {
            return Err(Error::PlatformUnsupported(APPLESCRIPT_UNSUPPORTED.into()));
        }

        match uri {
            "applescript://apps" => {
                let apps = self
                    .running_apps()
                    .await
                    .map_err(|result| Error::Internal(result.text_content()))?;
                ResourceContents::json(
                    uri,
                    &json!({
                        "running_applications": apps,
                        "count": apps.len(),
                        "timestamp": Utc::now().to_rfc3339(),
                    }),
                )
            }
            "applescript://system" => ResourceContents::json(
                uri,
                &json!({
                    "platform": "macOS",
                    "applescript_available": true,
                    "guard_policy": format!("{:?}", self.host.executor.policy()).to_lowercase(),
                    "timestamp": Utc::now().to_rfc3339(),
                    "capabilities": [
                        "notifications",
                        "app_control",
                        "clipboard_access",
                        "system_events"
                    ],
                }),
            ),
            _ => Err(Error::ResourceNotFound(uri.to_string())),
        }
    }

    fn prompts(&self) -> Vec<PromptDefinition> {
        vec![
            HELP_PROMPT.definition(),
            PromptDefinition::new(AUTOMATE_TASK, "Get guidance for automating a specific task")
                .argument("task", "Description of the task to automate", true),
        ]
    }

    fn get_prompt(&self, name: &str, arguments: serde_json::Value) -> Result<GetPromptResult> {
        self.state.record(RequestKind::Prompt, name, &arguments);

        if name == AUTOMATE_TASK {
            let args: AutomateTaskArgs = parse_args(arguments)?;
            let task = require(args.task, "task")?;
            return Ok(GetPromptResult::user_text(
                format!("Automation guidance for: {}", task),
                automate_task_prompt(&task),
            ));
        }
        render_static(&[HELP_PROMPT], name)
    }
}
