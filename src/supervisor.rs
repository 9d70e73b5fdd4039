//! Supervisor
//!
//! Screens user input before a task is triggered: rejects empty, gibberish,
//! code-like or harmful topics and translates topic and style to English.
//! The model must answer with a single JSON object.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{strip_code_fence, LLM};

const MAX_TOKENS: u32 = 4095;
const TEMPERATURE: f32 = 0.1;

const SYSTEM_PROMPT: &str = r#"You are a Supervisor AI assistant. Your task is to validate and preprocess user inputs for downstream tasks (article writing or research).
Follow these steps precisely:
1.  Receive user input containing 'task_type', 'topic', and optionally 'style'.
2.  Remove any punctuation marks.
3.  Check the 'topic':
    a. If it's empty, nonsensical gibberish (like 'asfdfgasg'), or looks like source code instead of a topic, reject it.
    b. Check for harmful content (violence, hate speech, illegal activities, etc.). If found, reject it.
4.  Identify the language of the 'topic' and 'style' (if provided).
5.  If the language of 'topic' or 'style' is not English, translate it accurately to English.
6.  After validation and translation (if necessary), structure your response ONLY as a JSON object.
7.  The JSON object MUST have one of the following structures:
    - On success: {"status": "approved", "processed_input": {"topic": "<english_topic>", "style": "<english_style_or_original_if_none>"}}
    - On rejection: {"status": "rejected", "error_message": "<clear_reason_for_rejection>"}
Do not include any text outside the JSON object in your response.
Ensure the 'style' field is included in 'processed_input' even if the original input 'style' was null or empty (use the original value in that case). If translation occurs, provide the translated style."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Article,
    Research,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Article => "article",
            TaskKind::Research => "research",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Approved { topic: String, style: Option<String> },
    Rejected { error_message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("No API key set for the supervisor's LLM provider.")]
    NotInitialized,

    #[error("Supervisor API error: {0}")]
    Api(String),

    #[error("Supervisor LLM response was not valid JSON.")]
    InvalidJson,

    #[error("Supervisor LLM response validation error: {0}")]
    Validation(String),

    #[error("Supervisor approved but processed topic is empty.")]
    EmptyTopic,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    status: Option<String>,
    processed_input: Option<RawInput>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    style: Option<Value>,
}

pub struct Supervisor {
    llm: LLM,
    model: String,
}

impl Supervisor {
    pub fn new(llm: LLM, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, SupervisorError> {
        let llm = LLM::from_config(&config.llm)
            .map_err(|e| SupervisorError::Api(e.detail()))?
            .ok_or(SupervisorError::NotInitialized)?;
        Ok(Self::new(llm, config.llm.supervisor_model.clone()))
    }

    pub async fn review(
        &self,
        kind: TaskKind,
        topic: &str,
        style: Option<&str>,
    ) -> Result<Review, SupervisorError> {
        let prompt = format!(
            "Validate and preprocess the following input:\nTask Type: {}\nTopic: {}\nStyle: {}",
            kind.as_str(),
            topic,
            style.unwrap_or("Not provided"),
        );

        let reply = self
            .llm
            .complete(&self.model, Some(SYSTEM_PROMPT), &prompt, MAX_TOKENS, TEMPERATURE)
            .await
            .map_err(|e| SupervisorError::Api(e.detail()))?;

        let review = parse_review(&reply)?;
        match &review {
            Review::Approved { topic, .. } => info!(kind = kind.as_str(), topic = %topic, "Input approved"),
            Review::Rejected { error_message } => {
                warn!(kind = kind.as_str(), reason = %error_message, "Input rejected")
            }
        }
        Ok(review)
    }
}

/// Parse the supervisor's JSON verdict.
pub fn parse_review(reply: &str) -> Result<Review, SupervisorError> {
    let raw: RawReview =
        serde_json::from_str(strip_code_fence(reply)).map_err(|_| SupervisorError::InvalidJson)?;

    let status = raw
        .status
        .ok_or_else(|| SupervisorError::Validation("missing 'status'".to_string()))?;

    match status.as_str() {
        "approved" => {
            let input = raw
                .processed_input
                .ok_or_else(|| SupervisorError::Validation("missing 'processed_input'".to_string()))?;
            let topic = input
                .topic
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .ok_or(SupervisorError::EmptyTopic)?;
            let style = match input.style {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            };
            Ok(Review::Approved { topic, style })
        }
        "rejected" => {
            let error_message = raw
                .error_message
                .ok_or_else(|| SupervisorError::Validation("missing 'error_message'".to_string()))?;
            Ok(Review::Rejected { error_message })
        }
        other => Err(SupervisorError::Validation(format!("unexpected status '{}'", other))),
    }
}
