//! Article Draft Agent
//!
//! Writes a long-form Markdown draft with the `generate_text` tool and
//! stores it with `upload_file`. The public URL of the stored draft is the
//! task result.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::worker::{JobOutcome, Rejection, WorkerAgent};
use crate::config::Config;
use crate::protocol::a2a::{error_codes, AssignTaskPayload, ARTICLE_DRAFT_AGENT, TASK_TYPE_ARTICLE_DRAFT};
use crate::protocol::mcp::McpClient;
use crate::tools::{GenerateTextTool, ToolBox, UploadFileTool, GENERATE_TEXT, UPLOAD_FILE};
use crate::types::AppResult;

pub const DEFAULT_STYLE: &str = "standard informative";

const ARTICLE_MAX_TOKENS: u32 = 5000;
const ARTICLE_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleJob {
    pub topic: String,
    pub style: String,
    pub bucket_name: String,
    pub file_name: String,
}

pub struct ArticleDraftAgent {
    tools: ToolBox,
    bucket_name: Option<String>,
}

impl ArticleDraftAgent {
    pub fn new(tools: ToolBox, bucket_name: Option<String>) -> Self {
        Self { tools, bucket_name }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = McpClient::new(Duration::from_secs(config.agents.mcp_timeout_secs));
        let tools = ToolBox::new()
            .with(Arc::new(GenerateTextTool::new(
                client.clone(),
                config.endpoints.creative_llm_mcp_url.clone(),
            )))
            .with(Arc::new(UploadFileTool::new(
                client,
                config.endpoints.cloud_storage_mcp_url.clone(),
            )));
        if config.agents.bucket_name.is_none() {
            warn!("CLOUD_STORAGE_BUCKET_NAME is not set; article tasks will be rejected");
        }
        Self::new(tools, config.agents.bucket_name.clone())
    }

    /// Generate then upload; returns the upload tool's output.
    async fn run(&self, job: &ArticleJob) -> AppResult<String> {
        let article = self
            .tools
            .invoke(
                GENERATE_TEXT,
                json!({
                    "prompt": article_prompt(&job.topic, &job.style),
                    "max_tokens": ARTICLE_MAX_TOKENS,
                    "temperature": ARTICLE_TEMPERATURE,
                }),
            )
            .await?;
        info!(topic = %job.topic, article_len = article.len(), "Article draft generated");

        self.tools
            .invoke(
                UPLOAD_FILE,
                json!({
                    "bucket_name": job.bucket_name,
                    "destination_blob_name": job.file_name,
                    "source_file_content": article,
                }),
            )
            .await
    }
}

pub fn article_prompt(topic: &str, style: &str) -> String {
    format!(
        "You are a helpful article draft writing assistant.\n\
         Write a comprehensive article draft on the following topic: \"{topic}\"\n\
         Write it in a {style} style.\n\
         Aim for a length of at least 2500 words, but do not exceed 5000 words.\n\
         Write in detail and include technical information where relevant.\n\
         Format the article as Markdown and respond with the complete article text only."
    )
}

/// `<topic lowercased, spaces and slashes as underscores>-<8 hex chars>.md`
pub fn draft_file_name(topic: &str) -> String {
    let stem = topic.replace([' ', '/'], "_").to_lowercase();
    let suffix = Uuid::new_v4().to_string();
    format!("{}-{}.md", stem, &suffix[..8])
}

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());

/// First URL in the text, cut at a `[]` marker if one trails it.
pub fn extract_url(text: &str) -> Option<String> {
    let found = URL_PATTERN.find(text)?.as_str();
    let url = found.split("[]").next().unwrap_or(found);
    Some(url.to_string())
}

/// Turn the pipeline's final text into the reported outcome.
pub fn interpret_output(output: &str) -> JobOutcome {
    let final_text = output.trim().to_string();

    let mut result = Map::new();
    result.insert("raw_output".to_string(), Value::String(output.to_string()));
    result.insert("final_text_response".to_string(), Value::String(final_text.clone()));

    if let Some(url) = extract_url(&final_text) {
        result.insert("saved_url".to_string(), Value::String(url));
        return JobOutcome::Completed(result);
    }

    let (code, message) = if final_text.is_empty() {
        (
            error_codes::EMPTY_AGENT_OUTPUT,
            "Article pipeline finished, but the output was empty.",
        )
    } else {
        (
            error_codes::URL_NOT_FOUND_IN_OUTPUT,
            "Article pipeline finished, text generated, but no URL found in the output.",
        )
    };
    JobOutcome::Failed {
        code,
        message: message.to_string(),
        result: Some(result),
    }
}

#[async_trait]
impl WorkerAgent for ArticleDraftAgent {
    type Job = ArticleJob;

    fn agent_id(&self) -> &'static str {
        ARTICLE_DRAFT_AGENT
    }

    fn display_name(&self) -> &'static str {
        "Article Draft Agent"
    }

    fn task_type(&self) -> &'static str {
        TASK_TYPE_ARTICLE_DRAFT
    }

    fn prepare(&self, payload: &AssignTaskPayload) -> Result<ArticleJob, Rejection> {
        let topic = payload
            .string_param("topic")
            .ok_or_else(|| Rejection::new(error_codes::MISSING_PARAMETER, "Article topic is missing."))?;

        let bucket_name = self.bucket_name.clone().ok_or_else(|| {
            Rejection::server_fault(
                error_codes::CONFIG_ERROR,
                "Cloud Storage bucket name is not configured.",
            )
        })?;

        Ok(ArticleJob {
            file_name: draft_file_name(&topic),
            style: payload
                .string_param("style")
                .unwrap_or_else(|| DEFAULT_STYLE.to_string()),
            topic,
            bucket_name,
        })
    }

    async fn execute(&self, task_id: &str, job: ArticleJob) -> JobOutcome {
        info!(
            task_id,
            topic = %job.topic,
            style = %job.style,
            bucket = %job.bucket_name,
            file = %job.file_name,
            "Article draft started"
        );
        match self.run(&job).await {
            Ok(output) => interpret_output(&output),
            Err(e) => JobOutcome::failed(
                error_codes::AGENT_RUNTIME_ERROR,
                format!("Unexpected error during article pipeline runtime: {}", e.detail()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn payload(parameters: Value) -> AssignTaskPayload {
        AssignTaskPayload {
            task_type: TASK_TYPE_ARTICLE_DRAFT.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }

    fn agent(creative_url: &str, storage_url: &str, bucket: Option<&str>) -> ArticleDraftAgent {
        let client = McpClient::new(Duration::from_secs(5));
        let tools = ToolBox::new()
            .with(Arc::new(GenerateTextTool::new(client.clone(), creative_url)))
            .with(Arc::new(UploadFileTool::new(client, storage_url)));
        ArticleDraftAgent::new(tools, bucket.map(str::to_string))
    }

    #[test]
    fn test_draft_file_name() {
        let name = draft_file_name("Rust Async/Await Basics");
        assert!(name.starts_with("rust_async_await_basics-"));
        assert!(name.ends_with(".md"));
        assert_eq!(name.len(), "rust_async_await_basics-".len() + 8 + 3);
    }

    #[test]
    fn test_extract_url() {
        assert_eq!(
            extract_url("Saved at https://storage.googleapis.com/drafts/a.md done").as_deref(),
            Some("https://storage.googleapis.com/drafts/a.md")
        );
        assert_eq!(
            extract_url("https://x.io/a.md[]extra").as_deref(),
            Some("https://x.io/a.md")
        );
        assert_eq!(extract_url("no link here"), None);
    }

    #[test]
    fn test_interpret_output() {
        match interpret_output("https://x.io/drafts/a.md\n") {
            JobOutcome::Completed(result) => {
                assert_eq!(result["saved_url"], "https://x.io/drafts/a.md");
                assert_eq!(result["final_text_response"], "https://x.io/drafts/a.md");
                assert_eq!(result["raw_output"], "https://x.io/drafts/a.md\n");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert!(matches!(
            interpret_output("uploaded somewhere"),
            JobOutcome::Failed { code: "URL_NOT_FOUND_IN_OUTPUT", result: Some(_), .. }
        ));
        assert!(matches!(
            interpret_output("   "),
            JobOutcome::Failed { code: "EMPTY_AGENT_OUTPUT", .. }
        ));
    }

    #[test]
    fn test_prepare_rejections() {
        let configured = agent("http://127.0.0.1:9", "http://127.0.0.1:9", Some("drafts"));
        let rejection = configured.prepare(&payload(json!({"style": "terse"}))).unwrap_err();
        assert_eq!(rejection.code, error_codes::MISSING_PARAMETER);
        assert!(!rejection.server_fault);

        let job = configured.prepare(&payload(json!({"topic": "Ferris"}))).unwrap();
        assert_eq!(job.style, DEFAULT_STYLE);
        assert_eq!(job.bucket_name, "drafts");

        let unconfigured = agent("http://127.0.0.1:9", "http://127.0.0.1:9", None);
        let rejection = unconfigured.prepare(&payload(json!({"topic": "Ferris"}))).unwrap_err();
        assert_eq!(rejection.code, error_codes::CONFIG_ERROR);
        assert_eq!(rejection.message, "Cloud Storage bucket name is not configured.");
        assert!(rejection.server_fault);
    }

    #[tokio::test]
    async fn test_execute_generates_and_uploads() {
        let mut creative = mockito::Server::new_async().await;
        let generate = creative
            .mock("POST", "/mcp/tool")
            .match_body(Matcher::PartialJson(json!({
                "tool_name": "generate_text",
                "parameters": {"max_tokens": 5000}
            })))
            .with_status(200)
            .with_body(r##"{"status":"success","result":{"generated_text":"# Ferris\n\nA crab."}}"##)
            .create_async()
            .await;

        let mut storage = mockito::Server::new_async().await;
        let upload = storage
            .mock("POST", "/mcp/tool")
            .match_body(Matcher::PartialJson(json!({
                "tool_name": "upload_file",
                "parameters": {"bucket_name": "drafts", "source_file_content": "# Ferris\n\nA crab."}
            })))
            .with_status(200)
            .with_body(
                r#"{"status":"success","result":{"bucket":"drafts","blob":"ferris.md","public_url":"https://storage.googleapis.com/drafts/ferris.md"}}"#,
            )
            .create_async()
            .await;

        let agent = agent(
            &format!("{}/mcp/tool", creative.url()),
            &format!("{}/mcp/tool", storage.url()),
            Some("drafts"),
        );
        let job = agent.prepare(&payload(json!({"topic": "Ferris", "style": "playful"}))).unwrap();
        let outcome = agent.execute("t-1", job).await;

        generate.assert_async().await;
        upload.assert_async().await;
        match outcome {
            JobOutcome::Completed(result) => {
                assert_eq!(result["saved_url"], "https://storage.googleapis.com/drafts/ferris.md")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_reports_generation_failure() {
        let mut creative = mockito::Server::new_async().await;
        let _generate = creative
            .mock("POST", "/mcp/tool")
            .with_status(200)
            .with_body(r#"{"status":"failure","error":{"code":"LLM_NOT_INITIALIZED","message":"LLM is not initialized."}}"#)
            .create_async()
            .await;

        let agent = agent(&format!("{}/mcp/tool", creative.url()), "http://127.0.0.1:9/mcp/tool", Some("drafts"));
        let job = agent.prepare(&payload(json!({"topic": "Ferris"}))).unwrap();

        assert_eq!(
            agent.execute("t-2", job).await,
            JobOutcome::failed(
                error_codes::AGENT_RUNTIME_ERROR,
                "Unexpected error during article pipeline runtime: LLM is not initialized."
            )
        );
    }

    #[test]
    fn test_article_prompt_mentions_topic_and_style() {
        let prompt = article_prompt("Ferris", "playful");
        assert!(prompt.contains("\"Ferris\""));
        assert!(prompt.contains("playful style"));
        assert!(prompt.contains("2500 words"));
    }
}
