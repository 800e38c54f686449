//! Gateway configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::exec::GuardPolicy;

/// Default timeout for a single command, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Hard ceiling for per-call timeout overrides, in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECS: u64 = 60;

/// Default output cap, in characters, applied to stdout and stderr separately.
pub const DEFAULT_MAX_OUTPUT_LENGTH: usize = 10_000;

/// Default number of entries kept in each connector's request log.
pub const DEFAULT_REQUEST_LOG_CAPACITY: usize = 100;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Entries kept per connector request log.
    pub request_log_capacity: usize,
    /// Shell connector.
    pub shell: ShellConfig,
    /// AppleScript connector family.
    pub applescript: AppleScriptConfig,
    /// Hello-world connector.
    pub hello_world: HelloWorldConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_log_capacity: DEFAULT_REQUEST_LOG_CAPACITY,
            shell: ShellConfig::default(),
            applescript: AppleScriptConfig::default(),
            hello_world: HelloWorldConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded gateway config");
        Ok(config)
    }

    /// Reject values the connectors cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.request_log_capacity == 0 {
            return Err(Error::Config("request_log_capacity must be > 0".into()));
        }
        check_limits(
            "shell",
            self.shell.timeout,
            self.shell.max_timeout,
            self.shell.max_output_length,
        )?;
        check_limits(
            "applescript",
            self.applescript.timeout,
            self.applescript.max_timeout,
            self.applescript.max_output_length,
        )?;
        if self.shell.shell.trim().is_empty() {
            return Err(Error::Config("shell.shell must not be empty".into()));
        }
        Ok(())
    }
}

fn check_limits(section: &str, timeout: u64, max_timeout: u64, max_output: usize) -> Result<()> {
    if timeout == 0 {
        return Err(Error::Config(format!("{}.timeout must be > 0", section)));
    }
    if max_timeout < timeout {
        return Err(Error::Config(format!(
            "{}.max_timeout ({}) is below {}.timeout ({})",
            section, max_timeout, section, timeout
        )));
    }
    if max_output == 0 {
        return Err(Error::Config(format!("{}.max_output_length must be > 0", section)));
    }
    Ok(())
}

/// Shell connector configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Register the connector.
    pub enabled: bool,
    /// Interpreter, invoked as `<shell> -c <command>`.
    pub shell: String,
    /// Default timeout in seconds.
    pub timeout: u64,
    /// Ceiling for per-call timeout overrides.
    pub max_timeout: u64,
    /// Default working directory (process cwd when unset).
    pub working_directory: Option<PathBuf>,
    /// Output cap in characters.
    pub max_output_length: usize,
    /// Program names allowed to run. Empty means no allow-list.
    pub allowed_commands: Vec<String>,
    /// What to do when the guard matches.
    pub guard_policy: GuardPolicy,
    /// Extra deny-list entries appended to the built-in ones.
    pub extra_patterns: Vec<String>,
    /// Extra environment for spawned commands.
    pub environment: HashMap<String, String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shell: String::from("/bin/sh"),
            timeout: DEFAULT_TIMEOUT_SECS,
            max_timeout: DEFAULT_MAX_TIMEOUT_SECS,
            working_directory: None,
            max_output_length: DEFAULT_MAX_OUTPUT_LENGTH,
            allowed_commands: Vec::new(),
            guard_policy: GuardPolicy::Block,
            extra_patterns: Vec::new(),
            environment: HashMap::new(),
        }
    }
}

impl ShellConfig {
    /// Default timeout as a duration.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Timeout ceiling as a duration.
    pub fn timeout_ceiling(&self) -> Duration {
        Duration::from_secs(self.max_timeout)
    }
}

/// AppleScript connector configuration, shared by the app-specific variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppleScriptConfig {
    /// Register the connector.
    pub enabled: bool,
    /// Default timeout in seconds.
    pub timeout: u64,
    /// Ceiling for per-call timeout overrides.
    pub max_timeout: u64,
    /// Output cap in characters.
    pub max_output_length: usize,
    /// What to do when the guard matches.
    pub guard_policy: GuardPolicy,
    /// Register the Safari connector alongside.
    pub safari: bool,
}

impl Default for AppleScriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: DEFAULT_TIMEOUT_SECS,
            max_timeout: DEFAULT_MAX_TIMEOUT_SECS,
            max_output_length: DEFAULT_MAX_OUTPUT_LENGTH,
            guard_policy: GuardPolicy::Warn,
            safari: true,
        }
    }
}

impl AppleScriptConfig {
    /// Default timeout as a duration.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Timeout ceiling as a duration.
    pub fn timeout_ceiling(&self) -> Duration {
        Duration::from_secs(self.max_timeout)
    }
}

/// Hello-world connector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HelloWorldConfig {
    /// Register the connector.
    pub enabled: bool,
}

impl Default for HelloWorldConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Effective timeout for one call: the override clamped to the ceiling.
///
/// Non-positive or non-finite overrides fall back to the default.
pub fn effective_timeout(requested: Option<f64>, default: Duration, ceiling: Duration) -> Duration {
    match requested {
        Some(secs) if secs.is_finite() && secs > 0.0 => {
            Duration::from_secs_f64(secs.min(ceiling.as_secs_f64()))
        }
        _ => default.min(ceiling),
    }
}
