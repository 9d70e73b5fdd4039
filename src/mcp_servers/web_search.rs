//! Web search tool server
//!
//! `search_web` is simulated: the search model is asked to invent
//! plausible results as a JSON list of `{title, url, snippet}` objects.

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{decode_params, tool_not_found_result};
use crate::config::Config;
use crate::llm::{strip_code_fence, LLM};
use crate::protocol::mcp::{error_codes, MCPToolCall, MCPToolResult, SearchWebParams, TOOL_SEARCH_WEB};
use crate::types::{AppError, AppResult};

const SEARCH_TEMPERATURE: f32 = 0.1;
const SEARCH_MAX_TOKENS: u32 = 2048;

#[derive(Clone)]
pub struct WebSearchState {
    llm: LLM,
    model: String,
}

impl WebSearchState {
    pub fn new(llm: LLM, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Fails when no API key is configured; this server cannot run without one.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let llm = LLM::from_config(&config.llm)?.ok_or_else(|| {
            AppError::Config(format!(
                "No API key set for LLM provider '{}'; the web search server needs one",
                config.llm.provider
            ))
        })?;
        info!(provider = llm.provider_name(), model = %config.llm.search_model, "Search LLM initialized");
        Ok(Self::new(llm, config.llm.search_model.clone()))
    }

    async fn search_web(&self, call: &MCPToolCall) -> MCPToolResult {
        // A wrongly typed `query` is INVALID_PARAMETERS; absent or blank is MISSING_PARAMETER.
        let params: SearchWebParams = match decode_params(call) {
            Ok(params) => params,
            Err(failure) => return failure,
        };

        let Some(query) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            warn!("Search request without a query");
            return MCPToolResult::failure(error_codes::MISSING_PARAMETER, "Search query is missing.");
        };

        info!(query, num_results = params.num_results, "Simulating web search");
        match self.simulate(query, params.num_results).await {
            Ok(results) => {
                info!(query, results = results.len(), "Simulated search succeeded");
                MCPToolResult::success_json(json!({ "search_results": results }))
            }
            Err(message) => {
                error!(query, error = %message, "Simulated search failed");
                MCPToolResult::failure(
                    error_codes::LLM_SEARCH_ERROR,
                    format!("Simulated search failed: {}", message),
                )
            }
        }
    }

    async fn simulate(&self, query: &str, num_results: u32) -> Result<Vec<Value>, String> {
        let reply = self
            .llm
            .complete(
                &self.model,
                None,
                &search_prompt(query, num_results),
                SEARCH_MAX_TOKENS,
                SEARCH_TEMPERATURE,
            )
            .await
            .map_err(|e| e.detail())?;
        parse_results(&reply)
    }
}

pub fn search_prompt(query: &str, num_results: u32) -> String {
    format!(
        "You are a simulated web search engine. When given a search query, provide a list of relevant, but fake, search results.\n\
         Provide exactly {num_results} results. Each result should be a JSON object with the following keys: \"title\", \"url\", \"snippet\".\n\
         Ensure the URL is a valid-looking URL (e.g., starts with http:// or https://).\n\
         Respond only with the JSON list, nothing else.\n\n\
         Search Query: {query}\n\n\
         JSON Results:"
    )
}

/// Accept only a JSON list of objects, optionally inside a ```json fence.
pub fn parse_results(reply: &str) -> Result<Vec<Value>, String> {
    let parsed: Value = serde_json::from_str(strip_code_fence(reply)).map_err(|e| e.to_string())?;
    match parsed {
        Value::Array(items) if items.iter().all(Value::is_object) => Ok(items),
        _ => Err("LLM did not return a valid JSON list of objects.".to_string()),
    }
}

pub fn router(state: WebSearchState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/mcp/tool", post(call_tool))
        .with_state(state)
}

async fn read_root(State(state): State<WebSearchState>) -> Json<Value> {
    Json(json!({
        "message": format!(
            "Web Search MCP Server is running with {} simulated search",
            state.llm.provider_name()
        )
    }))
}

/// Unknown tools are reported in-band with HTTP 200.
async fn call_tool(State(state): State<WebSearchState>, Json(call): Json<MCPToolCall>) -> Json<MCPToolResult> {
    info!(tool = %call.tool_name, task_id = ?call.task_id, "MCP tool call received");
    let result = match call.tool_name.as_str() {
        TOOL_SEARCH_WEB => state.search_web(&call).await,
        other => {
            warn!(tool = other, "Call for unknown tool");
            tool_not_found_result(other)
        }
    };
    Json(result)
}
