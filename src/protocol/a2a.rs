//! Agent-to-Agent (A2A) protocol
//!
//! Envelopes exchanged between the task manager and the worker agents.
//! Every A2A POST is answered synchronously with an [`A2AAck`]; the actual
//! outcome of a task travels back later as a `task_result` message.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::types::{AppError, AppResult};

pub const TASK_MANAGER_AGENT: &str = "task_manager_agent";
pub const RESEARCHER_AGENT: &str = "researcher_agent";
pub const ARTICLE_DRAFT_AGENT: &str = "article_draft_agent";

pub const TASK_TYPE_RESEARCH: &str = "research";
pub const TASK_TYPE_ARTICLE_DRAFT: &str = "write_article_draft";

/// Error codes carried in `failed` task results.
pub mod error_codes {
    pub const AGENT_ERROR: &str = "AGENT_ERROR";
    pub const MISSING_PARAMETER: &str = "MISSING_PARAMETER";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const UNKNOWN_TASK_TYPE: &str = "UNKNOWN_TASK_TYPE";
    pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
    pub const AGENT_RUNTIME_ERROR: &str = "AGENT_RUNTIME_ERROR";
    pub const URL_NOT_FOUND_IN_OUTPUT: &str = "URL_NOT_FOUND_IN_OUTPUT";
    pub const EMPTY_AGENT_OUTPUT: &str = "EMPTY_AGENT_OUTPUT";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    AssignTask,
    TaskStatusUpdate,
    TaskResult,
    Error,
    RequiresClarification,
    Other(String),
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "assign_task" => MessageType::AssignTask,
            "task_status_update" => MessageType::TaskStatusUpdate,
            "task_result" => MessageType::TaskResult,
            "error" => MessageType::Error,
            "requires_clarification" => MessageType::RequiresClarification,
            _ => MessageType::Other(s),
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        t.as_str().to_string()
    }
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::AssignTask => "assign_task",
            MessageType::TaskStatusUpdate => "task_status_update",
            MessageType::TaskResult => "task_result",
            MessageType::Error => "error",
            MessageType::RequiresClarification => "requires_clarification",
            MessageType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    RequiresClarification,
    Unknown,
    Other(String),
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => TaskStatus::Pending,
            "processing" => TaskStatus::Processing,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "requires_clarification" => TaskStatus::RequiresClarification,
            "unknown" => TaskStatus::Unknown,
            _ => TaskStatus::Other(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(s: TaskStatus) -> Self {
        s.as_str().to_string()
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::RequiresClarification => "requires_clarification",
            TaskStatus::Unknown => "unknown",
            TaskStatus::Other(s) => s,
        }
    }

    /// Whether a poller should stop waiting on this status. `queued` and
    /// `running` are treated like `processing`.
    pub fn is_terminal(&self) -> bool {
        match self {
            TaskStatus::Pending | TaskStatus::Processing => false,
            TaskStatus::Other(s) => !matches!(s.as_str(), "queued" | "running"),
            _ => true,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTaskPayload {
    pub task_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl AssignTaskPayload {
    /// String parameter, treating blanks as absent.
    pub fn string_param(&self, key: &str) -> Option<String> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusUpdatePayload {
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultPayload {
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<Map<String, Value>>,
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AMessage {
    pub task_id: String,
    pub message_id: String,
    pub sender_agent_id: String,
    pub receiver_agent_id: String,
    pub message_type: MessageType,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default)]
    pub context: Map<String, Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl A2AMessage {
    fn new(
        task_id: &str,
        sender: &str,
        receiver: &str,
        message_type: MessageType,
        payload: Value,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            message_id: Uuid::new_v4().to_string(),
            sender_agent_id: sender.to_string(),
            receiver_agent_id: receiver.to_string(),
            message_type,
            timestamp: Utc::now(),
            payload,
            context: Map::new(),
        }
    }

    pub fn assign_task(task_id: &str, sender: &str, receiver: &str, payload: &AssignTaskPayload) -> Self {
        Self::new(
            task_id,
            sender,
            receiver,
            MessageType::AssignTask,
            serde_json::to_value(payload).unwrap_or_else(|_| empty_object()),
        )
    }

    pub fn task_result(task_id: &str, sender: &str, receiver: &str, payload: &TaskResultPayload) -> Self {
        Self::new(
            task_id,
            sender,
            receiver,
            MessageType::TaskResult,
            serde_json::to_value(payload).unwrap_or_else(|_| empty_object()),
        )
    }

    /// Decode the payload into the shape expected for this message type.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| AppError::Protocol(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Ack,
    AckError,
    Error,
    Processing,
}

/// Synchronous reply to an A2A POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AAck {
    pub status: AckStatus,
    pub message_id: String,
    pub detail: String,
}

impl A2AAck {
    pub fn new(status: AckStatus, message_id: &str, detail: impl Into<String>) -> Self {
        Self {
            status,
            message_id: message_id.to_string(),
            detail: detail.into(),
        }
    }

    pub fn ack(message_id: &str, detail: impl Into<String>) -> Self {
        Self::new(AckStatus::Ack, message_id, detail)
    }

    pub fn error(message_id: &str, detail: impl Into<String>) -> Self {
        Self::new(AckStatus::Error, message_id, detail)
    }
}

/// Why a send did not go through.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Transport(String),

    #[error("receiver answered with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Thin HTTP sender for A2A envelopes.
#[derive(Clone)]
pub struct A2AClient {
    http: reqwest::Client,
}

impl Default for A2AClient {
    fn default() -> Self {
        Self::new()
    }
}

impl A2AClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub async fn send(&self, url: &str, message: &A2AMessage, timeout: Duration) -> Result<(), SendError> {
        debug!(
            task_id = %message.task_id,
            message_type = %message.message_type,
            receiver = %message.receiver_agent_id,
            url,
            "Sending A2A message"
        );

        let response = self
            .http
            .post(url)
            .timeout(timeout)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout(e.to_string())
                } else {
                    SendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Sends `task_result` messages from one agent back to the task manager.
#[derive(Clone)]
pub struct ResultReporter {
    client: A2AClient,
    result_url: String,
    sender_agent_id: String,
    timeout: Duration,
}

impl ResultReporter {
    pub fn new(result_url: impl Into<String>, sender_agent_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: A2AClient::new(),
            result_url: result_url.into(),
            sender_agent_id: sender_agent_id.into(),
            timeout,
        }
    }

    pub async fn report(&self, task_id: &str, payload: TaskResultPayload) -> Result<(), SendError> {
        let message = A2AMessage::task_result(task_id, &self.sender_agent_id, TASK_MANAGER_AGENT, &payload);
        let outcome = self.client.send(&self.result_url, &message, self.timeout).await;
        match &outcome {
            Ok(()) => info!(task_id, status = %payload.status, "Task result delivered to task manager"),
            Err(e) => error!(task_id, status = %payload.status, error = %e, "Failed to deliver task result"),
        }
        outcome
    }

    pub async fn completed(&self, task_id: &str, result: Map<String, Value>) -> Result<(), SendError> {
        self.report(
            task_id,
            TaskResultPayload {
                status: TaskStatus::Completed,
                result: Some(result),
                error: None,
                question: None,
            },
        )
        .await
    }

    pub async fn failed(
        &self,
        task_id: &str,
        code: &str,
        message: &str,
        result: Option<Map<String, Value>>,
    ) -> Result<(), SendError> {
        let mut error = Map::new();
        error.insert("code".to_string(), Value::String(code.to_string()));
        error.insert("message".to_string(), Value::String(message.to_string()));
        self.report(
            task_id,
            TaskResultPayload {
                status: TaskStatus::Failed,
                result,
                error: Some(error),
                question: None,
            },
        )
        .await
    }

    pub async fn needs_clarification(&self, task_id: &str, question: &str) -> Result<(), SendError> {
        self.report(
            task_id,
            TaskResultPayload {
                status: TaskStatus::RequiresClarification,
                result: None,
                error: None,
                question: Some(question.to_string()),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_message_type_keeps_unknown_strings() {
        let parsed: MessageType = serde_json::from_value(json!("broadcast")).unwrap();
        assert_eq!(parsed, MessageType::Other("broadcast".to_string()));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json!("broadcast"));

        let parsed: MessageType = serde_json::from_value(json!("task_result")).unwrap();
        assert_eq!(parsed, MessageType::TaskResult);
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(!TaskStatus::from("queued".to_string()).is_terminal());
        assert!(TaskStatus::from("paused".to_string()).is_terminal());
    }

    #[test]
    fn test_message_defaults_when_fields_missing() {
        let message: A2AMessage = serde_json::from_value(json!({
            "task_id": "t-1",
            "message_id": "m-1",
            "sender_agent_id": "a",
            "receiver_agent_id": "b",
            "message_type": "assign_task"
        }))
        .unwrap();

        assert_eq!(message.payload, json!({}));
        assert!(message.context.is_empty());
        assert!(message.decode_payload::<AssignTaskPayload>().is_err());
    }

    #[test]
    fn test_assign_task_payload_decodes() {
        let payload = AssignTaskPayload {
            task_type: TASK_TYPE_RESEARCH.to_string(),
            parameters: json!({"topic": "  rust  ", "max_words": 500})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let message = A2AMessage::assign_task("t-1", TASK_MANAGER_AGENT, RESEARCHER_AGENT, &payload);

        assert_eq!(message.message_type, MessageType::AssignTask);
        let decoded: AssignTaskPayload = message.decode_payload().unwrap();
        assert_eq!(decoded.task_type, "research");
        assert_eq!(decoded.string_param("topic").as_deref(), Some("rust"));
        assert_eq!(decoded.string_param("max_words"), None);
    }

    #[tokio::test]
    async fn test_reporter_posts_failed_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/a2a/result")
            .match_body(Matcher::PartialJson(json!({
                "task_id": "t-9",
                "sender_agent_id": "researcher_agent",
                "receiver_agent_id": "task_manager_agent",
                "message_type": "task_result",
                "payload": {
                    "status": "failed",
                    "error": {"code": "AGENT_ERROR", "message": "boom"}
                }
            })))
            .with_status(200)
            .with_body(r#"{"status":"ack","message_id":"x","detail":"ok"}"#)
            .create_async()
            .await;

        let reporter = ResultReporter::new(
            format!("{}/a2a/result", server.url()),
            RESEARCHER_AGENT,
            Duration::from_secs(5),
        );
        tokio_test::assert_ok!(reporter.failed("t-9", "AGENT_ERROR", "boom", None).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_reports_rejection_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/a2a/message")
            .with_status(500)
            .with_body("nope")
            .create_async()
            .await;

        let message = A2AMessage::assign_task(
            "t-1",
            TASK_MANAGER_AGENT,
            RESEARCHER_AGENT,
            &AssignTaskPayload {
                task_type: TASK_TYPE_RESEARCH.to_string(),
                parameters: Map::new(),
            },
        );
        let err = A2AClient::new()
            .send(&format!("{}/a2a/message", server.url()), &message, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, SendError::Rejected { status: 500, .. }));
    }
}
