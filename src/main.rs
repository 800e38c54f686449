//! desktop-gateway - run desktop automation connectors from the command line
//!
//! Lists and invokes the gateway's tools, resources and prompts. Results are printed
//! as JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_desktop_gateway::protocol::{
    ListPromptsResult, ListResourcesResult, ListToolsResult, ToolCallParams,
};
use mcp_desktop_gateway::{GatewayConfig, ToolRegistry};

/// Desktop automation gateway.
#[derive(Parser, Debug)]
#[command(name = "desktop-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every registered tool.
    Tools,
    /// List every registered resource.
    Resources,
    /// Call a tool.
    Call {
        /// Tool name.
        name: String,
        /// Tool arguments as a JSON object.
        #[arg(short, long, default_value = "{}")]
        arguments: String,
    },
    /// Read a resource.
    Read {
        /// Resource URI.
        uri: String,
    },
    /// List every registered prompt.
    Prompts,
    /// Render a prompt.
    Prompt {
        /// Prompt name.
        name: String,
        /// Prompt arguments as a JSON object.
        #[arg(short, long, default_value = "{}")]
        arguments: String,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries results
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GatewayConfig> {
    let config = match path {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_ref())?;
    let registry = ToolRegistry::from_config(&config);
    tracing::debug!(?registry, "registry ready");

    match args.command {
        Command::Tools => {
            print_json(&ListToolsResult {
                tools: registry.list_tools(),
            })?;
        }
        Command::Resources => {
            print_json(&ListResourcesResult {
                resources: registry.list_resources(),
            })?;
        }
        Command::Call { name, arguments } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&arguments).context("--arguments must be valid JSON")?;
            let params = ToolCallParams { name, arguments };

            let result = registry.execute(&params.name, params.arguments).await;
            print_json(&result)?;
            if result.is_error {
                if let Some(message) = &result.error_message {
                    tracing::error!(tool = %params.name, "{}", message);
                }
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Read { uri } => {
            let contents = registry
                .read_resource(&uri)
                .await
                .with_context(|| format!("failed to read {}", uri))?;
            print_json(&contents)?;
        }
        Command::Prompts => {
            print_json(&ListPromptsResult {
                prompts: registry.list_prompts(),
            })?;
        }
        Command::Prompt { name, arguments } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&arguments).context("--arguments must be valid JSON")?;
            let prompt = registry
                .get_prompt(&name, arguments)
                .with_context(|| format!("failed to render prompt {}", name))?;
            print_json(&prompt)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs);

    tracing::debug!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
