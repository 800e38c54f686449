//! Tool registry: routes tool calls, resource reads and prompts to connectors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::connectors::{
    AppleScriptConnector, Connector, HelloWorldConnector, HostPlatform, SafariConnector,
    ShellConnector,
};
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::protocol::{
    GetPromptResult, PromptDefinition, ResourceContents, ResourceDefinition, ToolCallResult,
    ToolDefinition,
};
use crate::state::ConnectorState;

/// Registry of connectors, indexed by tool name, resource URI and prompt
/// name.
///
/// When two connectors expose the same key, the one registered last wins.
#[derive(Default)]
pub struct ToolRegistry {
    connectors: Vec<Arc<dyn Connector>>,
    tools: HashMap<String, usize>,
    resources: HashMap<String, usize>,
    prompts: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every connector enabled in `config`, spawning real processes.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    /// Registry with a custom command runner.
    pub fn with_runner(config: &GatewayConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_platform(config, runner, HostPlatform::current())
    }

    /// Registry with a custom command runner and host platform.
    pub fn with_platform(
        config: &GatewayConfig,
        runner: Arc<dyn CommandRunner>,
        platform: HostPlatform,
    ) -> Self {
        let state = || ConnectorState::new(config.request_log_capacity);
        let mut registry = Self::new();

        if config.hello_world.enabled {
            registry.register(Arc::new(HelloWorldConnector::new(
                config.hello_world.clone(),
                state(),
            )));
        }

        if config.shell.enabled {
            registry.register(Arc::new(ShellConnector::new(
                config.shell.clone(),
                Arc::clone(&runner),
                state(),
            )));
        }

        if config.applescript.enabled {
            registry.register(Arc::new(AppleScriptConnector::with_platform(
                config.applescript.clone(),
                Arc::clone(&runner),
                state(),
                platform,
            )));
            if config.applescript.safari {
                registry.register(Arc::new(SafariConnector::with_platform(
                    config.applescript.clone(),
                    Arc::clone(&runner),
                    state(),
                    platform,
                )));
            }
        }

        registry
    }

    /// Register a connector and index its tools, resources and prompts.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        let index = self.connectors.len();

        for tool in connector.tools() {
            if let Some(previous) = self.tools.insert(tool.name.clone(), index) {
                tracing::warn!(
                    tool = %tool.name,
                    previous = %self.connector_name(previous).unwrap_or(connector.name()),
                    connector = %connector.name(),
                    "tool name registered twice"
                );
            }
        }
        for resource in connector.resources() {
            if let Some(previous) = self.resources.insert(resource.uri.clone(), index) {
                tracing::warn!(
                    uri = %resource.uri,
                    previous = %self.connector_name(previous).unwrap_or(connector.name()),
                    connector = %connector.name(),
                    "resource registered twice"
                );
            }
        }
        for prompt in connector.prompts() {
            if let Some(previous) = self.prompts.insert(prompt.name.clone(), index) {
                tracing::warn!(
                    prompt = %prompt.name,
                    previous = %self.connector_name(previous).unwrap_or(connector.name()),
                    connector = %connector.name(),
                    "prompt registered twice"
                );
            }
        }

        tracing::debug!(connector = %connector.name(), "connector registered");
        self.connectors.push(connector);
    }

    fn connector_name(&self, index: usize) -> Option<&str> {
        self.connectors.get(index).map(|c| c.name())
    }

    /// Registered connectors, in registration order.
    pub fn connectors(&self) -> &[Arc<dyn Connector>] {
        &self.connectors
    }

    /// Look up a connector by name.
    pub fn connector(&self, name: &str) -> Option<&Arc<dyn Connector>> {
        self.connectors.iter().find(|c| c.name() == name)
    }

    /// Tool definitions, grouped by connector in registration order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.connectors
            .iter()
            .enumerate()
            .flat_map(|(index, connector)| {
                connector
                    .tools()
                    .into_iter()
                    .filter(move |tool| self.tools.get(&tool.name) == Some(&index))
            })
            .collect()
    }

    /// Resource definitions, grouped by connector in registration order.
    pub fn list_resources(&self) -> Vec<ResourceDefinition> {
        self.connectors
            .iter()
            .enumerate()
            .flat_map(|(index, connector)| {
                connector
                    .resources()
                    .into_iter()
                    .filter(move |resource| self.resources.get(&resource.uri) == Some(&index))
            })
            .collect()
    }

    /// Prompt definitions, grouped by connector in registration order.
    pub fn list_prompts(&self) -> Vec<PromptDefinition> {
        self.connectors
            .iter()
            .enumerate()
            .flat_map(|(index, connector)| {
                connector
                    .prompts()
                    .into_iter()
                    .filter(move |prompt| self.prompts.get(&prompt.name) == Some(&index))
            })
            .collect()
    }

    /// Execute a tool by name. Unknown names yield an error result.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> ToolCallResult {
        let Some(&index) = self.tools.get(name) else {
            tracing::warn!(tool = %name, "unknown tool");
            return Error::ToolNotFound(name.to_string()).into_tool_result();
        };

        let connector = &self.connectors[index];
        tracing::debug!(tool = %name, connector = %connector.name(), "dispatching tool call");
        let result = connector.execute_tool(name, arguments).await;
        if result.is_error {
            tracing::debug!(
                tool = %name,
                error = result.error_message.as_deref().unwrap_or_default(),
                "tool call failed"
            );
        }
        result
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        let &index = self
            .resources
            .get(uri)
            .ok_or_else(|| Error::ResourceNotFound(uri.to_string()))?;
        self.connectors[index].read_resource(uri).await
    }

    /// Render a prompt by name.
    pub fn get_prompt(&self, name: &str, arguments: serde_json::Value) -> Result<GetPromptResult> {
        let &index = self
            .prompts
            .get(name)
            .ok_or_else(|| Error::PromptNotFound(name.to_string()))?;
        self.connectors[index].get_prompt(name, arguments)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("connectors", &self.connectors.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .field("prompts", &self.prompts.len())
            .finish()
    }
}
