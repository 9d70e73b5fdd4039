//! MCP-style tool invocation protocol
//!
//! Agents POST an [`MCPToolCall`] to a tool server's `/mcp/tool` endpoint and
//! receive an [`MCPToolResult`]. Tool-level failures are reported inside the
//! result envelope, not through HTTP status codes.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{error, info};

pub mod error_codes {
    pub const MCP_CALL_FAILED: &str = "MCP_CALL_FAILED";
    pub const UNEXPECTED_ERROR: &str = "UNEXPECTED_ERROR";
    pub const TOOL_NOT_FOUND: &str = "TOOL_NOT_FOUND";
    pub const INVALID_PARAMETERS: &str = "INVALID_PARAMETERS";
    pub const MISSING_PARAMETER: &str = "MISSING_PARAMETER";
    pub const LLM_NOT_INITIALIZED: &str = "LLM_NOT_INITIALIZED";
    pub const LLM_GENERATION_ERROR: &str = "LLM_GENERATION_ERROR";
    pub const LLM_SEARCH_ERROR: &str = "LLM_SEARCH_ERROR";
    pub const STORAGE_NOT_INITIALIZED: &str = "STORAGE_NOT_INITIALIZED";
    pub const BUCKET_NOT_FOUND: &str = "BUCKET_NOT_FOUND";
    pub const BLOB_NOT_FOUND: &str = "BLOB_NOT_FOUND";
    pub const UPLOAD_FAILED: &str = "UPLOAD_FAILED";
    pub const DOWNLOAD_FAILED: &str = "DOWNLOAD_FAILED";
    pub const DELETE_FAILED: &str = "DELETE_FAILED";
}

pub const TOOL_GENERATE_TEXT: &str = "generate_text";
pub const TOOL_SEARCH_WEB: &str = "search_web";
pub const TOOL_UPLOAD_FILE: &str = "upload_file";
pub const TOOL_DOWNLOAD_FILE: &str = "download_file";
pub const TOOL_DELETE_FILE: &str = "delete_file";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default = "empty_object")]
    pub parameters: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl MCPToolCall {
    /// Decode the call parameters into a tool's parameter type.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.parameters.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPToolResult {
    pub status: ToolStatus,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<Map<String, Value>>,
}

impl MCPToolResult {
    pub fn success(result: Map<String, Value>) -> Self {
        Self {
            status: ToolStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    /// Build a success result from a `json!({...})` object literal.
    pub fn success_json(result: Value) -> Self {
        match result {
            Value::Object(map) => Self::success(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self::success(map)
            }
        }
    }

    pub fn failure(code: &str, message: impl Into<String>) -> Self {
        let mut error = Map::new();
        error.insert("code".to_string(), Value::String(code.to_string()));
        error.insert("message".to_string(), Value::String(message.into()));
        Self {
            status: ToolStatus::Failure,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref()?.get("code")?.as_str()
    }

    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string()
    }

    /// String field of a successful result.
    pub fn result_str(&self, key: &str) -> Option<&str> {
        self.result.as_ref()?.get(key)?.as_str()
    }
}

// Tool parameter types

fn default_max_tokens() -> u32 {
    5000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_num_results() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateTextParams {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchWebParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_num_results")]
    pub num_results: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileParams {
    pub bucket_name: String,
    pub destination_blob_name: String,
    pub source_file_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadFileParams {
    pub bucket_name: String,
    pub source_blob_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFileParams {
    pub bucket_name: String,
    pub blob_name: String,
}

/// One simulated search hit as returned by the web search server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Client side of the tool protocol. Never fails: every problem is folded
/// into a `failure` result so callers handle one shape.
#[derive(Clone)]
pub struct McpClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl McpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    pub async fn call_tool(
        &self,
        server_url: &str,
        tool_name: &str,
        parameters: Value,
        task_id: Option<&str>,
    ) -> MCPToolResult {
        let call = MCPToolCall {
            tool_name: tool_name.to_string(),
            task_id: task_id.map(str::to_string),
            parameters,
        };

        info!(tool = tool_name, url = server_url, "Calling MCP tool");

        let response = match self
            .http
            .post(server_url)
            .timeout(self.timeout)
            .json(&call)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(tool = tool_name, error = %e, "MCP tool call failed");
                return MCPToolResult::failure(error_codes::MCP_CALL_FAILED, e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(tool = tool_name, status = %status, "MCP server rejected tool call");
            return MCPToolResult::failure(
                error_codes::MCP_CALL_FAILED,
                format!("HTTP {} from {}: {}", status.as_u16(), server_url, body),
            );
        }

        match response.json::<MCPToolResult>().await {
            Ok(result) => {
                info!(tool = tool_name, status = ?result.status, "Received MCP tool result");
                result
            }
            Err(e) => {
                error!(tool = tool_name, error = %e, "Unreadable MCP tool result");
                MCPToolResult::failure(error_codes::UNEXPECTED_ERROR, e.to_string())
            }
        }
    }
}
