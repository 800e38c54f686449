//! Safari connector: browser automation built on the AppleScript host.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::AppleScriptConfig;
use crate::connectors::applescript::{parse_list, ScriptHost};
use crate::connectors::{
    escape_applescript, parse_args, require, Connector, HostPlatform, APPLESCRIPT_UNSUPPORTED,
};
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use crate::protocol::{ResourceContents, ResourceDefinition, ToolCallResult, ToolDefinition};
use crate::state::{ConnectorState, RequestKind};

const TABS_SCRIPT: &str = r#"
tell application "Safari"
    set tabList to {}
    repeat with w from 1 to (count of windows)
        repeat with t from 1 to (count of tabs of window w)
            set end of tabList to (URL of tab t of window w) & " | " & (name of tab t of window w)
        end repeat
    end repeat
    return tabList
end tell
"#;

const CURRENT_URL_SCRIPT: &str = r#"tell application "Safari" to return URL of front document"#;
const PAGE_TITLE_SCRIPT: &str = r#"tell application "Safari" to return name of front document"#;
const PAGE_SOURCE_SCRIPT: &str = r#"tell application "Safari"
    return do JavaScript "document.documentElement.outerHTML" in front document
end tell"#;

const RELOAD_SCRIPT: &str = r#"tell application "Safari" to tell front document to reload"#;
const BACK_SCRIPT: &str = r#"tell application "Safari" to tell front document to go back"#;
const FORWARD_SCRIPT: &str = r#"tell application "Safari" to tell front document to go forward"#;

const DEFAULT_SCREENSHOT_PATH: &str = "~/Desktop/safari_screenshot.png";
const MIN_ZOOM: f64 = 0.5;
const MAX_ZOOM: f64 = 3.0;

/// Tools exposed by [`SafariConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafariTool {
    /// Open a URL.
    OpenUrl,
    /// URL of the front document.
    GetCurrentUrl,
    /// Title of the front document.
    GetPageTitle,
    /// Every open tab.
    GetTabs,
    /// Close a tab.
    CloseTab,
    /// Bring a tab to the front.
    SwitchTab,
    /// Reload the front document.
    ReloadPage,
    /// History back.
    GoBack,
    /// History forward.
    GoForward,
    /// Search with a search engine.
    Search,
    /// Run JavaScript in the front document.
    ExecuteJavascript,
    /// HTML of the front document.
    GetPageSource,
    /// Capture the screen to a PNG file.
    TakeScreenshot,
    /// Page zoom of the front document.
    SetZoom,
    /// Bookmark the front document.
    AddBookmark,
}

impl SafariTool {
    /// Every tool, in listing order.
    pub const ALL: [SafariTool; 15] = [
        SafariTool::OpenUrl,
        SafariTool::GetCurrentUrl,
        SafariTool::GetPageTitle,
        SafariTool::GetTabs,
        SafariTool::CloseTab,
        SafariTool::SwitchTab,
        SafariTool::ReloadPage,
        SafariTool::GoBack,
        SafariTool::GoForward,
        SafariTool::Search,
        SafariTool::ExecuteJavascript,
        SafariTool::GetPageSource,
        SafariTool::TakeScreenshot,
        SafariTool::SetZoom,
        SafariTool::AddBookmark,
    ];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            SafariTool::OpenUrl => "safari_open_url",
            SafariTool::GetCurrentUrl => "safari_get_current_url",
            SafariTool::GetPageTitle => "safari_get_page_title",
            SafariTool::GetTabs => "safari_get_tabs",
            SafariTool::CloseTab => "safari_close_tab",
            SafariTool::SwitchTab => "safari_switch_tab",
            SafariTool::ReloadPage => "safari_reload_page",
            SafariTool::GoBack => "safari_go_back",
            SafariTool::GoForward => "safari_go_forward",
            SafariTool::Search => "safari_search",
            SafariTool::ExecuteJavascript => "safari_execute_javascript",
            SafariTool::GetPageSource => "safari_get_page_source",
            SafariTool::TakeScreenshot => "safari_take_screenshot",
            SafariTool::SetZoom => "safari_set_zoom",
            SafariTool::AddBookmark => "safari_add_bookmark",
        }
    }

    /// Look up by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn definition(self, host: &ScriptHost) -> ToolDefinition {
        let empty = json!({"type": "object", "properties": {}});
        let (description, input_schema) = match self {
            SafariTool::OpenUrl => (
                "Open a URL in Safari",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "URL to open"},
                        "new_tab": {"type": "boolean", "description": "Open in a new tab (default: true)"},
                        "new_window": {"type": "boolean", "description": "Open in a new window (default: false)"}
                    },
                    "required": ["url"]
                }),
            ),
            SafariTool::GetCurrentUrl => ("Get the URL of the current Safari tab", empty),
            SafariTool::GetPageTitle => ("Get the title of the current Safari page", empty),
            SafariTool::GetTabs => ("List all open Safari tabs", empty),
            SafariTool::CloseTab => (
                "Close a Safari tab (current tab when no index is given)",
                json!({
                    "type": "object",
                    "properties": {
                        "tab_index": {"type": "integer", "minimum": 1, "description": "Tab number to close (1-based)"}
                    }
                }),
            ),
            SafariTool::SwitchTab => (
                "Switch to a Safari tab",
                json!({
                    "type": "object",
                    "properties": {
                        "tab_index": {"type": "integer", "minimum": 1, "description": "Tab number to switch to (1-based)"}
                    },
                    "required": ["tab_index"]
                }),
            ),
            SafariTool::ReloadPage => ("Reload the current Safari page", empty),
            SafariTool::GoBack => ("Go back in Safari history", empty),
            SafariTool::GoForward => ("Go forward in Safari history", empty),
            SafariTool::Search => (
                "Search the web in Safari",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Search query"},
                        "search_engine": {
                            "type": "string",
                            "enum": ["google", "bing", "duckduckgo", "yahoo"],
                            "description": "Search engine (default: google)"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            SafariTool::ExecuteJavascript => (
                "Execute JavaScript in the current Safari page",
                json!({
                    "type": "object",
                    "properties": {
                        "javascript": {"type": "string", "description": "JavaScript code to execute"}
                    },
                    "required": ["javascript"]
                }),
            ),
            SafariTool::GetPageSource => ("Get the HTML source of the current page", empty),
            SafariTool::TakeScreenshot => (
                "Take a screenshot with Safari in front",
                json!({
                    "type": "object",
                    "properties": {
                        "output_path": {
                            "type": "string",
                            "description": format!("Where to save the PNG (default: {})", DEFAULT_SCREENSHOT_PATH)
                        }
                    }
                }),
            ),
            SafariTool::SetZoom => (
                "Set the zoom level of the current Safari page",
                json!({
                    "type": "object",
                    "properties": {
                        "zoom_level": {
                            "type": "number",
                            "minimum": MIN_ZOOM,
                            "maximum": MAX_ZOOM,
                            "description": "Zoom level (1.0 = 100%, 1.5 = 150%)"
                        }
                    },
                    "required": ["zoom_level"]
                }),
            ),
            SafariTool::AddBookmark => (
                "Bookmark the current Safari page",
                json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Bookmark name (default: page title)"}
                    }
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

#[derive(Debug, Deserialize)]
struct OpenUrlArgs {
    url: Option<String>,
    new_tab: Option<bool>,
    #[serde(default)]
    new_window: bool,
}

#[derive(Debug, Deserialize)]
struct TabArgs {
    tab_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: Option<String>,
    search_engine: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JavascriptArgs {
    javascript: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScreenshotArgs {
    output_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZoomArgs {
    zoom_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BookmarkArgs {
    title: Option<String>,
}

/// One open tab.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SafariTab {
    /// 1-based position across all windows.
    pub index: usize,
    /// Tab URL.
    pub url: String,
    /// Tab title.
    pub title: String,
}

fn parse_tabs(output: &str) -> Vec<SafariTab> {
    parse_list(output)
        .into_iter()
        .filter_map(|line| {
            let (url, title) = line.split_once(" | ")?;
            Some((url.trim().to_string(), title.trim().to_string()))
        })
        .enumerate()
        .map(|(i, (url, title))| SafariTab {
            index: i + 1,
            url,
            title,
        })
        .collect()
}

/// Build the results page URL for `query`.
pub fn search_url(engine: &str, query: &str) -> Result<Url> {
    let (base, param) = match engine.to_lowercase().as_str() {
        "google" => ("https://www.google.com/search", "q"),
        "bing" => ("https://www.bing.com/search", "q"),
        "duckduckgo" => ("https://duckduckgo.com/", "q"),
        "yahoo" => ("https://search.yahoo.com/search", "p"),
        other => return Err(Error::InvalidParams(format!("unknown search engine '{}'", other))),
    };
    Url::parse_with_params(base, &[(param, query)]).map_err(|e| Error::Internal(e.to_string()))
}

/// Zoom level as a whole percentage.
fn zoom_percent(level: Option<f64>) -> Result<u32> {
    let level = level.ok_or_else(|| Error::MissingArgument("zoom_level".into()))?;
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&level) {
        return Err(Error::InvalidParams(format!(
            "zoom_level must be between {} and {}",
            MIN_ZOOM, MAX_ZOOM
        )));
    }
    Ok((level * 100.0).round() as u32)
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}

fn tab_index(value: Option<u32>, field: &str) -> Result<Option<u32>> {
    match value {
        Some(0) => Err(Error::InvalidParams(format!("{} must be >= 1", field))),
        other => Ok(other),
    }
}

/// Safari automation.
pub struct SafariConnector {
    host: ScriptHost,
    state: ConnectorState,
}

impl SafariConnector {
    /// Connector name.
    pub const NAME: &'static str = "safari";

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

    /// Run a template; replace its output with `message` on success.
    async fn perform(&self, script: &str, message: impl Into<String>) -> ToolCallResult {
        let result = self.host.run_template(script).await;
        if result.is_error {
            result
        } else {
            ToolCallResult::text(message)
        }
    }

    async fn open_url(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: OpenUrlArgs = parse_args(arguments)?;
        let raw = require(args.url, "url")?;
        let url = Url::parse(&raw)
            .map_err(|e| Error::InvalidParams(format!("invalid url '{}': {}", raw, e)))?;
        let quoted = escape_applescript(url.as_str());

        let script = if args.new_window {
            format!(
                "tell application \"Safari\"\n    activate\n    make new document with properties {{URL:\"{}\"}}\nend tell",
                quoted
            )
        } else if args.new_tab.unwrap_or(true) {
            format!(
                "tell application \"Safari\"\n    activate\n    tell front window\n        make new tab with properties {{URL:\"{}\"}}\n        set current tab to last tab\n    end tell\nend tell",
                quoted
            )
        } else {
            format!(
                "tell application \"Safari\"\n    activate\n    set URL of front document to \"{}\"\nend tell",
                quoted
            )
        };

        Ok(self.perform(&script, format!("Opened {}", url)).await)
    }

    async fn current_tab(&self) -> std::result::Result<(String, String), ToolCallResult> {
        let url = self.host.capture(CURRENT_URL_SCRIPT).await?;
        let title = self.host.capture(PAGE_TITLE_SCRIPT).await?;
        Ok((url, title))
    }

    async fn tabs(&self) -> std::result::Result<Vec<SafariTab>, ToolCallResult> {
        let output = self.host.capture(TABS_SCRIPT).await?;
        Ok(parse_tabs(&output))
    }

    async fn get_tabs(&self) -> ToolCallResult {
        match self.tabs().await {
            Ok(tabs) if tabs.is_empty() => ToolCallResult::text("No open tabs"),
            Ok(tabs) => {
                let lines = tabs
                    .iter()
                    .map(|tab| format!("{}. {} ({})", tab.index, tab.title, tab.url))
                    .collect::<Vec<_>>()
                    .join("\n");
                ToolCallResult::text(format!("Open tabs ({}):\n{}", tabs.len(), lines))
            }
            Err(result) => result,
        }
    }

    async fn close_tab(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: TabArgs = parse_args(arguments)?;
        let (script, message) = match tab_index(args.tab_index, "tab_index")? {
            Some(index) => (
                format!(r#"tell application "Safari" to close tab {} of front window"#, index),
                format!("Closed tab {}", index),
            ),
            None => (
                r#"tell application "Safari" to close current tab of front window"#.to_string(),
                "Closed current tab".to_string(),
            ),
        };
        Ok(self.perform(&script, message).await)
    }

    async fn switch_tab(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: TabArgs = parse_args(arguments)?;
        let index = tab_index(args.tab_index, "tab_index")?
            .ok_or_else(|| Error::MissingArgument("tab_index".into()))?;
        let script = format!(
            r#"tell application "Safari" to set current tab of front window to tab {} of front window"#,
            index
        );
        Ok(self.perform(&script, format!("Switched to tab {}", index)).await)
    }

    async fn search(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: SearchArgs = parse_args(arguments)?;
        let query = require(args.query, "query")?;
        let engine = args.search_engine.unwrap_or_else(|| "google".into());
        let url = search_url(&engine, &query)?;

        let script = format!(
            "tell application \"Safari\"\n    activate\n    set URL of front document to \"{}\"\nend tell",
            escape_applescript(url.as_str())
        );
        Ok(self
            .perform(&script, format!("Searched {} for \"{}\": {}", engine, query, url))
            .await)
    }

    async fn page_source(&self) -> ToolCallResult {
        match self.host.capture(PAGE_SOURCE_SCRIPT).await {
            Ok(html) => ToolCallResult::text(format!("Page source:\n{}", html)),
            Err(result) => result,
        }
    }

    async fn take_screenshot(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: ScreenshotArgs = parse_args(arguments)?;
        let path = args
            .output_path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_SCREENSHOT_PATH.into());
        let path = expand_home(&path);

        let script = format!(
            "tell application \"Safari\" to activate\n\
             delay 1\n\
             do shell script \"screencapture -x \" & quoted form of \"{}\"",
            escape_applescript(&path)
        );
        Ok(self
            .perform(&script, format!("Screenshot saved to {}", path))
            .await)
    }

    async fn set_zoom(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: ZoomArgs = parse_args(arguments)?;
        let percent = zoom_percent(args.zoom_level)?;
        let script = format!(
            r#"tell application "Safari" to do JavaScript "document.body.style.zoom = '{}%'" in front document"#,
            percent
        );
        Ok(self.perform(&script, format!("Zoom set to {}%", percent)).await)
    }

    async fn add_bookmark(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: BookmarkArgs = parse_args(arguments)?;
        let title = args
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let (script, message) = match title {
            Some(title) => (
                format!(
                    r#"tell application "Safari" to add front document to bookmarks with name "{}""#,
                    escape_applescript(&title)
                ),
                format!("Bookmark added: {}", title),
            ),
            None => (
                r#"tell application "Safari" to add front document to bookmarks"#.to_string(),
                "Bookmark added".to_string(),
            ),
        };
        Ok(self.perform(&script, message).await)
    }

    async fn execute_javascript(&self, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let args: JavascriptArgs = parse_args(arguments)?;
        let javascript = require(args.javascript, "javascript")?;
        let script = format!(
            r#"tell application "Safari" to do JavaScript "{}" in front document"#,
            escape_applescript(&javascript)
        );
        Ok(self.host.run(&script, None).await)
    }
}

#[async_trait::async_trait]
impl Connector for SafariConnector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        SafariTool::ALL
            .into_iter()
            .map(|tool| tool.definition(&self.host))
            .collect()
    }

    fn resources(&self) -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition {
                uri: "safari://tabs".into(),
                name: "Safari Tabs".into(),
                description: "All open Safari tabs".into(),
                mime_type: "application/json".into(),
            },
            ResourceDefinition {
                uri: "safari://current".into(),
                name: "Current Safari Tab".into(),
                description: "URL and title of the front document".into(),
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

        let Some(tool) = SafariTool::from_name(name) else {
            return Error::ToolNotFound(name.to_string()).into_tool_result();
        };

        let result = match tool {
            SafariTool::OpenUrl => self.open_url(arguments).await,
            SafariTool::GetCurrentUrl => Ok(match self.host.capture(CURRENT_URL_SCRIPT).await {
                Ok(url) => ToolCallResult::text(format!("Current URL: {}", url)),
                Err(result) => result,
            }),
            SafariTool::GetPageTitle => Ok(match self.host.capture(PAGE_TITLE_SCRIPT).await {
                Ok(title) => ToolCallResult::text(format!("Page title: {}", title)),
                Err(result) => result,
            }),
            SafariTool::GetTabs => Ok(self.get_tabs().await),
            SafariTool::CloseTab => self.close_tab(arguments).await,
            SafariTool::SwitchTab => self.switch_tab(arguments).await,
            SafariTool::ReloadPage => Ok(self.perform(RELOAD_SCRIPT, "Page reloaded").await),
            SafariTool::GoBack => Ok(self.perform(BACK_SCRIPT, "Went back").await),
            SafariTool::GoForward => Ok(self.perform(FORWARD_SCRIPT, "Went forward").await),
            SafariTool::Search => self.search(arguments).await,
            SafariTool::ExecuteJavascript => self.execute_javascript(arguments).await,
            SafariTool::GetPageSource => Ok(self.page_source().await),
            SafariTool::TakeScreenshot => self.take_screenshot(arguments).await,
            SafariTool::SetZoom => self.set_zoom(arguments).await,
            SafariTool::AddBookmark => self.add_bookmark(arguments).await,
        };
        result.unwrap_or_else(Error::into_tool_result)
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        self.state.record(RequestKind::Resource, uri, &serde_json::Value::Null);

        if !self.host.supported() {
            return Err(Error::PlatformUnsupported(APPLESCRIPT_UNSUPPORTED.into()));
        }

        match uri {
            "safari://tabs" => {
                let tabs = self
                    .tabs()
                    .await
                    .map_err(|result| Error::Internal(result.text_content()))?;
                ResourceContents::json(uri, &json!({"tabs": tabs, "total_count": tabs.len()}))
            }
            "safari://current" => {
                let (url, title) = self
                    .current_tab()
                    .await
                    .map_err(|result| Error::Internal(result.text_content()))?;
                ResourceContents::json(uri, &json!({"url": url, "title": title}))
            }
            _ => Err(Error::ResourceNotFound(uri.to_string())),
        }
    }
}
