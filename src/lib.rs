//! # mcp-desktop-gateway
//!
//! Desktop automation tools for MCP clients: shell commands, AppleScript,
//! Safari control and a hello-world diagnostics connector.
//!
//! ## Pipeline
//!
//! Every command or script goes through the same steps:
//!
//! 1. the connector validates the tool arguments,
//! 2. a [`PatternGuard`] inspects the text against a deny-list,
//! 3. a [`CommandRunner`] executes it with a bounded wait,
//! 4. the outcome is normalized into a [`ToolCallResult`].
//!
//! Tool calls never fail at the Rust level. Unknown tools, bad arguments,
//! guard rejections, timeouts and non-zero exits all come back as results
//! with `isError` set.
//!
//! ## Connectors
//!
//! - `shell`: `execute_command`, `execute_commands`, `list_directory`, `get_system_info`
//! - `applescript`: `run_applescript`, `system_notification`, `get_running_apps`,
//!   `control_app`, `get_clipboard`, `set_clipboard`
//! - `safari`: `safari_*` browser tools
//! - `hello_world`: `hello_world`, `gateway_diagnostics`, `echo`
//!
//! The AppleScript family reports a fixed "only available on macOS" error on
//! other hosts. Connectors also carry fixed-text prompts, served through
//! [`ToolRegistry::get_prompt`].
//!
//! ## Security Model
//!
//! The guard is a substring match, not a sandbox. It catches obvious mistakes
//! such as `rm -rf /` and is trivially bypassed by anyone trying.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectors;
pub mod error;
pub mod exec;
pub mod protocol;
pub mod state;
pub mod tools;

pub use config::GatewayConfig;
pub use connectors::{Connector, HostPlatform};
pub use error::{Error, Result};
pub use exec::{CommandRunner, PatternGuard, ProcessRunner};
pub use protocol::{
    GetPromptResult, PromptDefinition, ResourceContents, ToolCallResult, ToolDefinition,
};
pub use state::ConnectorState;
pub use tools::ToolRegistry;
