//! Researcher Agent
//!
//! Looks a topic up through the `research_web` tool and asks the agent
//! model to summarise what came back.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::worker::{JobOutcome, Rejection, WorkerAgent};
use crate::config::Config;
use crate::llm::LLM;
use crate::protocol::a2a::{error_codes, AssignTaskPayload, RESEARCHER_AGENT, TASK_TYPE_RESEARCH};
use crate::protocol::mcp::McpClient;
use crate::tools::{ResearchTool, ToolBox, RESEARCH_WEB};
use crate::types::{AppError, AppResult};

const SYSTEM_PROMPT: &str = "You are a helpful research assistant. You receive research tasks and use the \
available tools to find information. Respond concisely and summarize the findings based *only* on the \
information provided by the tools.";

const SUMMARY_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchJob {
    pub topic: String,
    pub language: String,
    pub max_words: u32,
}

pub struct ResearcherAgent {
    tools: ToolBox,
    llm: Option<LLM>,
    model: String,
    default_language: String,
    default_max_words: u32,
}

impl ResearcherAgent {
    pub fn new(tools: ToolBox, llm: Option<LLM>, config: &Config) -> Self {
        Self {
            tools,
            llm,
            model: config.llm.agent_model.clone(),
            default_language: config.agents.research_language.clone(),
            default_max_words: config.agents.research_max_words,
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = McpClient::new(Duration::from_secs(config.agents.mcp_timeout_secs));
        let tools = ToolBox::new().with(Arc::new(ResearchTool::new(
            client,
            config.endpoints.web_search_mcp_url.clone(),
            config.agents.search_num_results,
        )));
        let llm = LLM::from_config(&config.llm)?;
        if llm.is_none() {
            tracing::warn!("No API key for the configured LLM provider; research tasks will fail");
        }
        Ok(Self::new(tools, llm, config))
    }

    async fn run(&self, job: &ResearchJob) -> AppResult<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| AppError::Config("LLM client is not initialized.".to_string()))?;

        let findings = self.tools.invoke(RESEARCH_WEB, json!({ "query": job.topic })).await?;
        info!(topic = %job.topic, findings_len = findings.len(), "Search findings collected");

        let prompt = format!(
            "Please find information about: {topic}. Summarize the key findings based *only* on the \
             information returned by the tools. Write the summary in {language} using at most {max_words} words.\n\n\
             Tool output ({tool}):\n{findings}",
            topic = job.topic,
            language = job.language,
            max_words = job.max_words,
            tool = RESEARCH_WEB,
            findings = findings,
        );

        let reply = llm
            .complete(&self.model, Some(SYSTEM_PROMPT), &prompt, SUMMARY_MAX_TOKENS, 0.0)
            .await?;
        Ok(clean_summary(&reply))
    }
}

/// Drop a `<result>...</result>` wrapper and surrounding whitespace.
pub fn clean_summary(raw: &str) -> String {
    let mut summary = raw.trim();
    if let Some(rest) = summary.strip_prefix("<result>") {
        summary = rest;
    }
    if let Some(head) = summary.trim_end().strip_suffix("</result>") {
        summary = head;
    }
    summary.trim().to_string()
}

#[async_trait]
impl WorkerAgent for ResearcherAgent {
    type Job = ResearchJob;

    fn agent_id(&self) -> &'static str {
        RESEARCHER_AGENT
    }

    fn display_name(&self) -> &'static str {
        "Researcher Agent"
    }

    fn task_type(&self) -> &'static str {
        TASK_TYPE_RESEARCH
    }

    fn prepare(&self, payload: &AssignTaskPayload) -> Result<ResearchJob, Rejection> {
        let topic = payload
            .string_param("topic")
            .ok_or_else(|| Rejection::new(error_codes::AGENT_ERROR, "Research topic is missing."))?;

        Ok(ResearchJob {
            topic,
            language: payload
                .string_param("language")
                .unwrap_or_else(|| self.default_language.clone()),
            max_words: payload
                .parameters
                .get("max_words")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(self.default_max_words),
        })
    }

    async fn execute(&self, task_id: &str, job: ResearchJob) -> JobOutcome {
        info!(task_id, topic = %job.topic, language = %job.language, "Research started");
        match self.run(&job).await {
            Ok(summary) => {
                let mut result = Map::new();
                result.insert("summary".to_string(), Value::String(summary));
                JobOutcome::Completed(result)
            }
            Err(e) => JobOutcome::failed(
                error_codes::AGENT_ERROR,
                format!("Agent execution failed: {}", e.detail()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{scripted_llm, ScriptedAdapter};
    use serde_json::json;

    fn payload(parameters: Value) -> AssignTaskPayload {
        AssignTaskPayload {
            task_type: TASK_TYPE_RESEARCH.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }

    fn agent_with(search_url: &str, llm: Option<LLM>) -> ResearcherAgent {
        let mut config = Config::for_tests();
        config.endpoints.web_search_mcp_url = search_url.to_string();
        let client = McpClient::new(Duration::from_secs(5));
        let tools = ToolBox::new().with(Arc::new(ResearchTool::new(client, search_url, 3)));
        ResearcherAgent::new(tools, llm, &config)
    }

    #[test]
    fn test_clean_summary() {
        assert_eq!(clean_summary("<result>\nRust is fast.\n</result>"), "Rust is fast.");
        assert_eq!(clean_summary("  plain text  "), "plain text");
        assert_eq!(clean_summary("see <result> inline"), "see <result> inline");
    }

    #[test]
    fn test_prepare_defaults_and_missing_topic() {
        let agent = agent_with("http://127.0.0.1:9/mcp/tool", None);

        let job = agent.prepare(&payload(json!({"topic": "ownership"}))).unwrap();
        assert_eq!(job.language, "English");
        assert_eq!(job.max_words, 500);

        let job = agent
            .prepare(&payload(json!({"topic": "ownership", "language": "Turkish", "max_words": 120})))
            .unwrap();
        assert_eq!(job.language, "Turkish");
        assert_eq!(job.max_words, 120);

        let rejection = agent.prepare(&payload(json!({"topic": ""}))).unwrap_err();
        assert_eq!(rejection, Rejection::new(error_codes::AGENT_ERROR, "Research topic is missing."));
    }

    #[tokio::test]
    async fn test_execute_summarises_search_results() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/mcp/tool")
            .with_status(200)
            .with_body(
                r#"{"status":"success","result":{"search_results":[{"title":"Borrowing","url":"https://doc.rust-lang.org","snippet":"references"}]}}"#,
            )
            .create_async()
            .await;

        let adapter = ScriptedAdapter::replying("<result>Borrowing lets you use references.</result>");
        let agent = agent_with(&format!("{}/mcp/tool", server.url()), Some(scripted_llm(adapter.clone())));
        let job = agent.prepare(&payload(json!({"topic": "borrowing"}))).unwrap();

        let outcome = agent.execute("t-1", job).await;
        let mut expected = Map::new();
        expected.insert(
            "summary".to_string(),
            Value::String("Borrowing lets you use references.".to_string()),
        );
        assert_eq!(outcome, JobOutcome::Completed(expected));

        let request = adapter.last_request().unwrap();
        assert_eq!(request.model, "agent-model");
        assert_eq!(request.system_instruction.as_deref(), Some(SYSTEM_PROMPT));
        assert!(request.messages[0].content.contains("Title: Borrowing"));
        assert!(request.messages[0].content.contains("in English"));
    }

    #[tokio::test]
    async fn test_execute_reports_tool_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/mcp/tool")
            .with_status(200)
            .with_body(r#"{"status":"failure","error":{"code":"LLM_SEARCH_ERROR","message":"bad json"}}"#)
            .create_async()
            .await;

        let agent = agent_with(
            &format!("{}/mcp/tool", server.url()),
            Some(scripted_llm(ScriptedAdapter::replying("unused"))),
        );
        let job = agent.prepare(&payload(json!({"topic": "lifetimes"}))).unwrap();

        assert_eq!(
            agent.execute("t-2", job).await,
            JobOutcome::failed(error_codes::AGENT_ERROR, "Agent execution failed: bad json")
        );
    }

    #[tokio::test]
    async fn test_execute_without_llm() {
        let agent = agent_with("http://127.0.0.1:9/mcp/tool", None);
        let job = agent.prepare(&payload(json!({"topic": "traits"}))).unwrap();
        assert!(matches!(
            agent.execute("t-3", job).await,
            JobOutcome::Failed { code: "AGENT_ERROR", .. }
        ));
    }
}
