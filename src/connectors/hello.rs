//! Hello-world connector: greeting, diagnostics and echo.
//!
//! Needs no host facilities, which makes it the quickest way to check that
//! a gateway is wired up.

use std::fmt::Write as _;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::config::HelloWorldConfig;
use crate::connectors::{parse_args, render_static, Connector, StaticPrompt};
use crate::error::{Error, Result};
use crate::protocol::{
    GetPromptResult, PromptDefinition, ResourceContents, ResourceDefinition, ToolCallResult,
    ToolDefinition,
};
use crate::state::{ConnectorState, RequestKind};

const SERVICE: &str = "mcp-desktop-gateway";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_TAIL: usize = 10;

const PROMPTS: &[StaticPrompt] = &[
    StaticPrompt {
        name: "hello_quick_test",
        description: "Quick test of hello world connector features",
        text: "Test the Hello World connector:

1. Greet me using the hello_world tool
2. Show diagnostics using the gateway_diagnostics tool with verbose=true
3. Echo \"MCP Gateway is working!\" using the echo tool with include_metadata=true
4. Read and display the gateway://hello/status resource
5. Read the gateway://hello/logs resource

This verifies the hello world connector end to end.",
    },
    StaticPrompt {
        name: "hello_debug_info",
        description: "Get debug information from hello world connector",
        text: "Gather debug information from the hello world connector:

1. Run the gateway_diagnostics tool with verbose=true
2. Read all three resources:
   - gateway://hello/config
   - gateway://hello/status
   - gateway://hello/logs
3. Call the echo tool with the current timestamp
4. Summarize the connector health",
    },
];

/// Tools exposed by [`HelloWorldConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloTool {
    /// Greeting with gateway info.
    HelloWorld,
    /// Diagnostics report.
    GatewayDiagnostics,
    /// Echo a message.
    Echo,
}

impl HelloTool {
    /// Every tool, in listing order.
    pub const ALL: [HelloTool; 3] = [
        HelloTool::HelloWorld,
        HelloTool::GatewayDiagnostics,
        HelloTool::Echo,
    ];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            HelloTool::HelloWorld => "hello_world",
            HelloTool::GatewayDiagnostics => "gateway_diagnostics",
            HelloTool::Echo => "echo",
        }
    }

    /// Look up by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn definition(self) -> ToolDefinition {
        let (description, input_schema) = match self {
            HelloTool::HelloWorld => (
                "Greet the user with gateway information",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Name to greet (optional)"}
                    }
                }),
            ),
            HelloTool::GatewayDiagnostics => (
                "Get gateway diagnostics and service information",
                json!({
                    "type": "object",
                    "properties": {
                        "verbose": {"type": "boolean", "description": "Include detailed diagnostics"}
                    }
                }),
            ),
            HelloTool::Echo => (
                "Echo back user input with metadata",
                json!({
                    "type": "object",
                    "properties": {
                        "message": {"type": "string", "description": "Message to echo back"},
                        "include_metadata": {"type": "boolean", "description": "Include request metadata"}
                    },
                    "required": ["message"]
                }),
            ),
        };

        ToolDefinition {
            name: self.name().into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HelloArgs {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiagnosticsArgs {
    #[serde(default)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct EchoArgs {
    message: Option<String>,
    #[serde(default)]
    include_metadata: bool,
}

/// Greeting, diagnostics and echo tools.
pub struct HelloWorldConnector {
    config: HelloWorldConfig,
    state: ConnectorState,
}

impl HelloWorldConnector {
    /// Connector name.
    pub const NAME: &'static str = "hello_world";

    /// Create a connector.
    pub fn new(config: HelloWorldConfig, state: ConnectorState) -> Self {
        Self { config, state }
    }

    fn hello(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: HelloArgs = parse_args(arguments)?;
        let name = args
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "User".into());

        Ok(ToolCallResult::text(format!(
            "Hello {}!\n\n\
             Welcome to the desktop gateway\n\
             Service: {}\n\
             Connector: {}\n\
             Version: {}\n\n\
             Current Status: Operational\n\
             Uptime: {}\n\
             Requests Handled: {}",
            name,
            SERVICE,
            Self::NAME,
            VERSION,
            self.state.uptime(),
            self.state.request_count(),
        )))
    }

    fn diagnostics(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: DiagnosticsArgs = parse_args(arguments)?;
        let mut report = format!(
            "=== Gateway Diagnostics ===\n\
             Service: {}\n\
             Connector: {}\n\
             Version: {}\n\
             Status: Operational\n\n\
             System Information:\n\
             - Platform: {}\n\
             - Architecture: {}\n\
             - Start Time: {}\n\
             - Uptime: {}\n\n\
             Connector Metrics:\n\
             - Total Requests: {}\n\
             - Tools Available: {}\n\
             - Resources Available: {}",
            SERVICE,
            Self::NAME,
            VERSION,
            std::env::consts::OS,
            std::env::consts::ARCH,
            self.state.started_at().to_rfc3339(),
            self.state.uptime(),
            self.state.request_count(),
            HelloTool::ALL.len(),
            self.resources().len(),
        );

        if args.verbose {
            let cwd = std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|e| format!("unavailable ({})", e));
            let _ = write!(
                report,
                "\n\nDetailed Information:\n- Process ID: {}\n- Working Directory: {}\n\nRecent Requests:",
                std::process::id(),
                cwd,
            );
            let recent = self.state.log().recent(5);
            if recent.is_empty() {
                report.push_str("\n  (none)");
            }
            for entry in recent {
                let _ = write!(
                    report,
                    "\n  [{}] {}: {}",
                    entry.timestamp.to_rfc3339(),
                    entry.kind,
                    entry.name
                );
            }
        }

        Ok(ToolCallResult::text(report))
    }

    fn echo(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: EchoArgs = parse_args(arguments)?;
        let message = args.message.ok_or_else(|| Error::MissingArgument("message".into()))?;
        let mut response = format!("Echo: {}", message);

        if args.include_metadata {
            let metadata = json!({
                "timestamp": Utc::now().to_rfc3339(),
                "request_number": self.state.request_count(),
                "message_length": message.chars().count(),
                "connector": Self::NAME,
                "service": SERVICE,
            });
            let _ = write!(response, "\n\nMetadata:\n{}", serde_json::to_string_pretty(&metadata)?);
        }

        Ok(ToolCallResult::text(response))
    }

    fn logs(&self) -> String {
        let mut logs = format!(
            "=== {} Activity Logs ===\n\nConnector Started: {}\nTotal Requests: {}\n\n",
            Self::NAME,
            self.state.started_at().to_rfc3339(),
            self.state.request_count(),
        );
        let recent = self.state.log().recent(LOG_TAIL);
        if recent.is_empty() {
            logs.push_str("No requests logged yet.\n");
        } else {
            logs.push_str("Recent Requests:\n");
            for entry in recent {
                let _ = writeln!(
                    logs,
                    "  [{}] {}: {} {}",
                    entry.timestamp.to_rfc3339(),
                    entry.kind,
                    entry.name,
                    entry.arguments
                );
            }
        }
        logs
    }
}

#[async_trait::async_trait]
impl Connector for HelloWorldConnector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        HelloTool::ALL.into_iter().map(HelloTool::definition).collect()
    }

    fn resources(&self) -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition {
                uri: "gateway://hello/config".into(),
                name: "Hello World Configuration".into(),
                description: "Current hello world connector configuration".into(),
                mime_type: "application/json".into(),
            },
            ResourceDefinition {
                uri: "gateway://hello/status".into(),
                name: "Connector Status".into(),
                description: "Hello world connector status and metrics".into(),
                mime_type: "application/json".into(),
            },
            ResourceDefinition {
                uri: "gateway://hello/logs".into(),
                name: "Activity Logs".into(),
                description: "Recent hello world connector activity".into(),
                mime_type: "text/plain".into(),
            },
        ]
    }

    fn state(&self) -> &ConnectorState {
        &self.state
    }

    async fn execute_tool(&self, name: &str, arguments: serde_json::Value) -> ToolCallResult {
        self.state.record(RequestKind::Tool, name, &arguments);

        let Some(tool) = HelloTool::from_name(name) else {
            return Error::ToolNotFound(name.to_string()).into_tool_result();
        };

        let result = match tool {
            HelloTool::HelloWorld => self.hello(arguments),
            HelloTool::GatewayDiagnostics => self.diagnostics(arguments),
            HelloTool::Echo => self.echo(arguments),
        };
        result.unwrap_or_else(Error::into_tool_result)
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        self.state.record(RequestKind::Resource, uri, &serde_json::Value::Null);

        match uri {
            "gateway://hello/config" => ResourceContents::json(
                uri,
                &json!({
                    "connector": {"name": Self::NAME, "version": VERSION, "type": "hello_world"},
                    "features": {
                        "tools": HelloTool::ALL.iter().map(|t| t.name()).collect::<Vec<_>>(),
                        "resources": ["config", "status", "logs"],
                        "prompts": PROMPTS.iter().map(|p| p.name).collect::<Vec<_>>(),
                    },
                    "configuration": self.config,
                }),
            ),
            "gateway://hello/status" => ResourceContents::json(
                uri,
                &json!({
                    "status": "operational",
                    "connector": Self::NAME,
                    "uptime": self.state.uptime(),
                    "metrics": {
                        "total_requests": self.state.request_count(),
                        "log_entries": self.state.log().len(),
                        "start_time": self.state.started_at().to_rfc3339(),
                        "current_time": Utc::now().to_rfc3339(),
                    },
                }),
            ),
            "gateway://hello/logs" => Ok(ResourceContents::plain(uri, self.logs())),
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
