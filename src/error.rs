//! Error types for the gateway.

use thiserror::Error;

use crate::protocol::ToolCallResult;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Tool not found.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// A required argument was absent or empty.
    #[error("{0} is required")]
    MissingArgument(String),

    /// Invalid parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Prompt not found.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// The connector needs a different host OS.
    #[error("{0}")]
    PlatformUnsupported(String),

    /// The OS refused to create the child process.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short label carried in `ToolCallResult::error_message`.
    pub fn summary(&self) -> String {
        match self {
            Error::ToolNotFound(_) => self.to_string(),
            Error::MissingArgument(field) => format!("Missing required argument '{}'", field),
            Error::InvalidParams(_) => "Invalid parameters".into(),
            Error::ResourceNotFound(_) => "Resource not found".into(),
            Error::PromptNotFound(_) => "Prompt not found".into(),
            Error::PlatformUnsupported(_) => "Platform not supported".into(),
            // raw OS text, surfaced to the client as-is
            Error::Spawn { source, .. } => source.to_string(),
            Error::Config(_) | Error::Toml(_) => "Invalid configuration".into(),
            Error::Serialization(e) => e.to_string(),
            Error::Io(e) => e.to_string(),
            Error::Internal(msg) => msg.clone(),
        }
    }

    /// Convert into an error tool result.
    pub fn into_tool_result(self) -> ToolCallResult {
        let text = match &self {
            Error::ToolNotFound(_) | Error::PlatformUnsupported(_) => self.to_string(),
            _ => format!("Error: {}", self),
        };
        ToolCallResult::error(text, self.summary())
    }
}
