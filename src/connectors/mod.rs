//! Connectors: pluggable groups of tools and resources.

pub mod applescript;
pub mod hello;
pub mod safari;
pub mod shell;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::protocol::{
    GetPromptResult, PromptDefinition, ResourceContents, ResourceDefinition, ToolCallResult,
    ToolDefinition,
};
use crate::state::ConnectorState;

pub use applescript::AppleScriptConnector;
pub use hello::HelloWorldConnector;
pub use safari::SafariConnector;
pub use shell::ShellConnector;

/// A named set of tools and resources.
///
/// `execute_tool` never fails: every outcome, including unknown names and
/// bad arguments, comes back as a [`ToolCallResult`] with `is_error` set.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Connector name.
    fn name(&self) -> &str;

    /// Tools this connector exposes.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Resources this connector exposes.
    fn resources(&self) -> Vec<ResourceDefinition> {
        Vec::new()
    }

    /// Runtime state for this instance.
    fn state(&self) -> &ConnectorState;

    /// Execute a tool.
    async fn execute_tool(&self, name: &str, arguments: serde_json::Value) -> ToolCallResult;

    /// Read a resource.
    async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        Err(Error::ResourceNotFound(uri.to_string()))
    }

    /// Prompts this connector exposes.
    fn prompts(&self) -> Vec<PromptDefinition> {
        Vec::new()
    }

    /// Render a prompt.
    fn get_prompt(&self, name: &str, _arguments: serde_json::Value) -> Result<GetPromptResult> {
        Err(Error::PromptNotFound(name.to_string()))
    }
}

/// Prompt whose text never varies.
pub(crate) struct StaticPrompt {
    pub name: &'static str,
    pub description: &'static str,
    pub text: &'static str,
}

impl StaticPrompt {
    pub(crate) fn definition(&self) -> PromptDefinition {
        PromptDefinition::new(self.name, self.description)
    }

    pub(crate) fn render(&self) -> GetPromptResult {
        GetPromptResult::user_text(self.description, self.text)
    }
}

/// Render the prompt called `name` from a fixed set.
pub(crate) fn render_static(prompts: &[StaticPrompt], name: &str) -> Result<GetPromptResult> {
    prompts
        .iter()
        .find(|prompt| prompt.name == name)
        .map(StaticPrompt::render)
        .ok_or_else(|| Error::PromptNotFound(name.to_string()))
}

/// Deserialize tool arguments; `null` counts as an empty object.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: serde_json::Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))
}

/// Trimmed, non-empty value of a required string argument.
pub(crate) fn require(value: Option<String>, field: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingArgument(field.to_string())),
    }
}

/// Whether this host can run `osascript`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    /// macOS.
    MacOs,
    /// Anything else.
    Other,
}

impl HostPlatform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Other
        }
    }

    /// Whether AppleScript is available.
    pub fn is_macos(self) -> bool {
        self == HostPlatform::MacOs
    }
}

/// Message returned by every AppleScript-family tool off macOS.
pub const APPLESCRIPT_UNSUPPORTED: &str = "AppleScript is only available on macOS";

/// Escape text for use inside an AppleScript double-quoted string literal.
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\0', "")
}
