// Tool servers speaking the MCP-style protocol on POST /mcp/tool

pub mod cloud_storage;
pub mod creative_llm;
pub mod web_search;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::protocol::mcp::{error_codes, MCPToolCall, MCPToolResult};

pub use cloud_storage::CloudStorageState;
pub use creative_llm::CreativeLlmState;
pub use web_search::WebSearchState;

pub(super) fn tool_not_found_result(tool_name: &str) -> MCPToolResult {
    MCPToolResult::failure(error_codes::TOOL_NOT_FOUND, format!("Tool '{}' not found.", tool_name))
}

/// 404 whose `detail` is the failure envelope.
pub(crate) fn tool_not_found(server: &str, tool_name: &str) -> Response {
    warn!(server, tool = tool_name, "Call for unknown tool");
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": tool_not_found_result(tool_name) })),
    )
        .into_response()
}

/// Decode tool parameters or produce the `INVALID_PARAMETERS` failure.
pub(crate) fn decode_params<T: serde::de::DeserializeOwned>(call: &MCPToolCall) -> Result<T, MCPToolResult> {
    call.params().map_err(|e| {
        warn!(tool = %call.tool_name, error = %e, "Invalid tool parameters");
        MCPToolResult::failure(
            error_codes::INVALID_PARAMETERS,
            format!("Invalid parameters for {}: {}", call.tool_name, e),
        )
    })
}

pub(crate) fn reply(result: MCPToolResult) -> Response {
    Json(result).into_response()
}
