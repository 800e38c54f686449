//! MCP boundary types.
//!
//! These are the shapes a Model Context Protocol transport hands to the
//! gateway and expects back. Framing (JSON-RPC, stdio, SSE) lives outside
//! this crate; see <https://spec.modelcontextprotocol.io/> for the wire format.

use serde::{Deserialize, Serialize};

/// Tool definition for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// Input schema (JSON Schema).
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Tool call request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool call result.
///
/// Serializes as `{"content": [...], "isError": bool}`. `error_message` is a
/// short machine-facing summary kept for callers inside the process; the
/// human-facing wording is in `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Result content.
    pub content: Vec<ContentItem>,
    /// Whether the tool encountered an error.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    /// Short error summary.
    #[serde(skip)]
    pub error_message: Option<String>,
}

impl ToolCallResult {
    /// Successful result with a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
            error_message: None,
        }
    }

    /// Error result with a single text block.
    pub fn error(text: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: true,
            error_message: Some(message.into()),
        }
    }

    /// Insert a text block ahead of the existing content.
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.content.insert(0, ContentItem::text(notice));
        self
    }

    /// All text blocks joined with newlines.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|item| match item {
                ContentItem::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Content item in tool results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ContentItem {
    /// Text content.
    #[serde(rename = "text")]
    Text {
        /// Text value.
        text: String,
    },
}

impl ContentItem {
    /// Create a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }
}

/// List tools result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Available tools.
    pub tools: Vec<ToolDefinition>,
}

/// Resource definition for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// MIME type of the contents.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Contents returned by a resource read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContents {
    /// Resource URI.
    pub uri: String,
    /// MIME type.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Resource text.
    pub text: String,
}

impl ResourceContents {
    /// JSON resource contents, pretty-printed.
    pub fn json(uri: impl Into<String>, value: &serde_json::Value) -> crate::Result<Self> {
        Ok(Self {
            uri: uri.into(),
            mime_type: "application/json".into(),
            text: serde_json::to_string_pretty(value)?,
        })
    }

    /// Plain-text resource contents.
    pub fn plain(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: "text/plain".into(),
            text: text.into(),
        }
    }
}

/// List resources result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Available resources.
    pub resources: Vec<ResourceDefinition>,
}

/// Argument accepted by a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Whether the prompt refuses to render without it.
    #[serde(default)]
    pub required: bool,
}

/// Prompt definition for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Prompt name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Accepted arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

impl PromptDefinition {
    /// Prompt that takes no arguments.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arguments: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn argument(mut self, name: &str, description: &str, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: description.into(),
            required,
        });
        self
    }
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Message body.
    pub content: ContentItem,
}

/// Rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// Description of the prompt.
    pub description: String,
    /// Messages to hand to the model.
    pub messages: Vec<PromptMessage>,
}

impl GetPromptResult {
    /// A single user message.
    pub fn user_text(description: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            messages: vec![PromptMessage {
                role: "user".into(),
                content: ContentItem::text(text),
            }],
        }
    }

    /// All message texts joined with newlines.
    pub fn text_content(&self) -> String {
        self.messages
            .iter()
            .map(|message| match &message.content {
                ContentItem::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// List prompts result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Available prompts.
    pub prompts: Vec<PromptDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_serializes_to_mcp_shape() {
        let result = ToolCallResult::error("boom", "short");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "boom"}], "isError": true})
        );
    }

    #[test]
    fn prompt_serializes_to_mcp_shape() {
        let definition = PromptDefinition::new("p", "d");
        assert_eq!(
            serde_json::to_value(&definition).unwrap(),
            json!({"name": "p", "description": "d"})
        );

        let rendered = GetPromptResult::user_text("d", "body");
        assert_eq!(
            serde_json::to_value(&rendered).unwrap(),
            json!({
                "description": "d",
                "messages": [{"role": "user", "content": {"type": "text", "text": "body"}}]
            })
        );
    }

    #[test]
    fn notice_goes_first() {
        let result = ToolCallResult::text("body").with_notice("heads up");
        assert_eq!(result.content[0], ContentItem::text("heads up"));
        assert_eq!(result.text_content(), "heads up\nbody");
    }
}
