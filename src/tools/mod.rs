//! Agent-side tools
//!
//! Each tool wraps one call to a remote tool server and turns the
//! [`MCPToolResult`] envelope into plain text the agent can use.
//! Worker agents look tools up by name in a [`ToolBox`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::protocol::mcp::{
    GenerateTextParams, McpClient, MCPToolResult, SearchHit, UploadFileParams, TOOL_GENERATE_TEXT,
    TOOL_SEARCH_WEB, TOOL_UPLOAD_FILE,
};
use crate::types::{AppError, AppResult};

pub const RESEARCH_WEB: &str = "research_web";
pub const GENERATE_TEXT: &str = "generate_text";
pub const UPLOAD_FILE: &str = "upload_file";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Run the tool with JSON arguments and return its text output.
    async fn invoke(&self, args: Value) -> AppResult<String>;
}

/// Named set of tools available to one agent.
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn invoke(&self, name: &str, args: Value) -> AppResult<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("Tool '{}' is not available", name)))?;
        tool.invoke(args).await
    }
}

fn tool_error(tool: &str, result: &MCPToolResult) -> AppError {
    let message = result.error_message();
    error!(tool, code = ?result.error_code(), error = %message, "Tool server reported failure");
    AppError::Tool(message)
}

fn bad_args(tool: &str, e: serde_json::Error) -> AppError {
    AppError::InvalidRequest(format!("Invalid arguments for {}: {}", tool, e))
}

#[derive(Debug, Deserialize)]
struct ResearchArgs {
    query: String,
}

/// Web lookup through the web search tool server.
pub struct ResearchTool {
    client: McpClient,
    server_url: String,
    num_results: u32,
}

impl ResearchTool {
    pub fn new(client: McpClient, server_url: impl Into<String>, num_results: u32) -> Self {
        Self {
            client,
            server_url: server_url.into(),
            num_results,
        }
    }
}

/// Render search hits as the text block handed to the summarising model.
pub fn format_search_results(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("Search Results for '{}': No results found.", query);
    }

    let blocks: Vec<String> = hits
        .iter()
        .map(|hit| {
            format!(
                "Title: {}\nURL: {}\nSnippet: {}\n---",
                hit.title.as_deref().unwrap_or("N/A"),
                hit.url.as_deref().unwrap_or("N/A"),
                hit.snippet.as_deref().unwrap_or("N/A"),
            )
        })
        .collect();

    format!("Search Results for '{}':\n{}", query, blocks.join("\n"))
}

#[async_trait]
impl Tool for ResearchTool {
    fn name(&self) -> &'static str {
        RESEARCH_WEB
    }

    fn description(&self) -> &'static str {
        "Useful for searching the web to find information about a given query."
    }

    async fn invoke(&self, args: Value) -> AppResult<String> {
        let args: ResearchArgs = serde_json::from_value(args).map_err(|e| bad_args(RESEARCH_WEB, e))?;
        info!(query = %args.query, "Researching the web");

        let result = self
            .client
            .call_tool(
                &self.server_url,
                TOOL_SEARCH_WEB,
                json!({ "query": args.query, "num_results": self.num_results }),
                None,
            )
            .await;

        if !result.is_success() {
            return Err(tool_error(RESEARCH_WEB, &result));
        }

        let hits: Vec<SearchHit> = result
            .result
            .as_ref()
            .and_then(|r| r.get("search_results"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Ok(format_search_results(&args.query, &hits))
    }
}

/// Text generation through the creative LLM tool server.
pub struct GenerateTextTool {
    client: McpClient,
    server_url: String,
}

impl GenerateTextTool {
    pub fn new(client: McpClient, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl Tool for GenerateTextTool {
    fn name(&self) -> &'static str {
        GENERATE_TEXT
    }

    fn description(&self) -> &'static str {
        "Useful for generating creative text like articles, poems, or drafts from a prompt."
    }

    async fn invoke(&self, args: Value) -> AppResult<String> {
        let params: GenerateTextParams = serde_json::from_value(args).map_err(|e| bad_args(GENERATE_TEXT, e))?;
        info!(prompt_len = params.prompt.len(), max_tokens = params.max_tokens, "Requesting generated text");

        let parameters = serde_json::to_value(&params).map_err(|e| AppError::Internal(e.to_string()))?;
        let result = self
            .client
            .call_tool(&self.server_url, TOOL_GENERATE_TEXT, parameters, None)
            .await;

        match result.result_str("generated_text") {
            Some(text) if result.is_success() => Ok(text.to_string()),
            _ if result.is_success() => Err(AppError::Tool(
                "Generation result did not include generated_text".to_string(),
            )),
            _ => Err(tool_error(GENERATE_TEXT, &result)),
        }
    }
}

/// Upload of text content through the cloud storage tool server.
pub struct UploadFileTool {
    client: McpClient,
    server_url: String,
}

impl UploadFileTool {
    pub fn new(client: McpClient, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl Tool for UploadFileTool {
    fn name(&self) -> &'static str {
        UPLOAD_FILE
    }

    fn description(&self) -> &'static str {
        "Uploads text content to a cloud storage bucket and returns the public URL of the stored file."
    }

    async fn invoke(&self, args: Value) -> AppResult<String> {
        let params: UploadFileParams = serde_json::from_value(args).map_err(|e| bad_args(UPLOAD_FILE, e))?;
        info!(
            bucket = %params.bucket_name,
            blob = %params.destination_blob_name,
            bytes = params.source_file_content.len(),
            "Uploading file"
        );

        let parameters = serde_json::to_value(&params).map_err(|e| AppError::Internal(e.to_string()))?;
        let result = self
            .client
            .call_tool(&self.server_url, TOOL_UPLOAD_FILE, parameters, None)
            .await;

        match result.result_str("public_url") {
            Some(url) if result.is_success() => {
                info!(public_url = %url, "Upload succeeded");
                Ok(url.to_string())
            }
            _ if result.is_success() => Err(AppError::Tool("Upload result did not include public_url".to_string())),
            _ => Err(tool_error(UPLOAD_FILE, &result)),
        }
    }
}
