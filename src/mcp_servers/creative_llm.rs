//! Creative LLM tool server
//!
//! Exposes `generate_text`. Runs without an API key but then fails every
//! call with `LLM_NOT_INITIALIZED`.

use axum::{extract::State, response::Response, routing::{get, post}, Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{decode_params, reply, tool_not_found};
use crate::config::Config;
use crate::llm::LLM;
use crate::protocol::mcp::{error_codes, GenerateTextParams, MCPToolCall, MCPToolResult, TOOL_GENERATE_TEXT};
use crate::types::AppResult;

#[derive(Clone)]
pub struct CreativeLlmState {
    llm: Option<LLM>,
    default_model: String,
}

impl CreativeLlmState {
    pub fn new(llm: Option<LLM>, default_model: impl Into<String>) -> Self {
        Self {
            llm,
            default_model: default_model.into(),
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        let llm = LLM::from_config(&config.llm)?;
        match &llm {
            Some(llm) => info!(provider = llm.provider_name(), model = %config.llm.creative_model, "Creative LLM initialized"),
            None => error!(provider = %config.llm.provider, "No API key for the configured LLM provider"),
        }
        Ok(Self::new(llm, config.llm.creative_model.clone()))
    }

    async fn generate_text(&self, call: &MCPToolCall) -> MCPToolResult {
        let Some(llm) = &self.llm else {
            error!("Text generation requested but the LLM is not initialized");
            return MCPToolResult::failure(
                error_codes::LLM_NOT_INITIALIZED,
                "Creative LLM server's LLM failed to initialize. Check the provider API key.",
            );
        };

        let params: GenerateTextParams = match decode_params(call) {
            Ok(params) => params,
            Err(failure) => return failure,
        };

        let model = params.model.as_deref().unwrap_or(&self.default_model);
        info!(
            model,
            prompt_len = params.prompt.len(),
            max_tokens = params.max_tokens,
            "Generating text"
        );

        match llm
            .complete(model, None, &params.prompt, params.max_tokens, params.temperature)
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                info!(text_len = text.len(), "Text generated");
                MCPToolResult::success_json(json!({ "generated_text": text }))
            }
            Ok(_) => {
                warn!("LLM returned an empty completion");
                MCPToolResult::failure(
                    error_codes::LLM_GENERATION_ERROR,
                    "Text generation failed: the model returned no text.",
                )
            }
            Err(e) => {
                error!(error = %e, "Text generation failed");
                MCPToolResult::failure(
                    error_codes::LLM_GENERATION_ERROR,
                    format!("Text generation failed: {}", e.detail()),
                )
            }
        }
    }
}

pub fn router(state: CreativeLlmState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/mcp/tool", post(call_tool))
        .with_state(state)
}

async fn read_root(State(state): State<CreativeLlmState>) -> Json<Value> {
    let status = match &state.llm {
        Some(llm) => format!("LLM initialized ({}, {}).", llm.provider_name(), state.default_model),
        None => "LLM failed to initialize.".to_string(),
    };
    Json(json!({ "message": format!("Creative LLM MCP Server is running. {}", status) }))
}

async fn call_tool(State(state): State<CreativeLlmState>, Json(call): Json<MCPToolCall>) -> Response {
    info!(tool = %call.tool_name, task_id = ?call.task_id, "MCP tool call received");
    match call.tool_name.as_str() {
        TOOL_GENERATE_TEXT => reply(state.generate_text(&call).await),
        other => tool_not_found("creative_llm", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{scripted_llm, ScriptedAdapter};
    use crate::types::AppError;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn call(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp/tool")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_generate_text_uses_defaults() {
        let adapter = ScriptedAdapter::replying("Once upon a time");
        let app = router(CreativeLlmState::new(Some(scripted_llm(adapter.clone())), "creative-model"));

        let (status, body) = call(app, json!({"tool_name": "generate_text", "parameters": {"prompt": "a story"}})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "result": {"generated_text": "Once upon a time"}, "error": null}));

        let request = adapter.last_request().unwrap();
        assert_eq!(request.model, "creative-model");
        assert_eq!(request.max_tokens, Some(5000));
        assert_eq!(request.temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_generate_text_failures() {
        let app = router(CreativeLlmState::new(None, "creative-model"));
        let (_, body) = call(app, json!({"tool_name": "generate_text", "parameters": {"prompt": "x"}})).await;
        assert_eq!(body["error"]["code"], "LLM_NOT_INITIALIZED");

        let adapter = ScriptedAdapter::new(vec![Err(AppError::LLMApi("rate limited".to_string())), Ok("  ".to_string())]);
        let app = router(CreativeLlmState::new(Some(scripted_llm(adapter)), "creative-model"));

        let (_, body) = call(app.clone(), json!({"tool_name": "generate_text", "parameters": {}})).await;
        assert_eq!(body["error"]["code"], "INVALID_PARAMETERS");

        let (_, body) = call(app.clone(), json!({"tool_name": "generate_text", "parameters": {"prompt": "x"}})).await;
        assert_eq!(body["error"]["code"], "LLM_GENERATION_ERROR");
        assert_eq!(body["error"]["message"], "Text generation failed: rate limited");

        let (_, body) = call(app, json!({"tool_name": "generate_text", "parameters": {"prompt": "x"}})).await;
        assert_eq!(body["error"]["code"], "LLM_GENERATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_404() {
        let app = router(CreativeLlmState::new(None, "creative-model"));
        let (status, body) = call(app, json!({"tool_name": "paint"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"]["status"], "failure");
        assert_eq!(body["detail"]["error"]["code"], "TOOL_NOT_FOUND");
        assert_eq!(body["detail"]["error"]["message"], "Tool 'paint' not found.");
    }
}
