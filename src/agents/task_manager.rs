//! Task Manager Agent
//!
//! Front door of the system. Trigger endpoints create a task id, mark it
//! `processing` and hand the work to a worker agent over A2A. Workers call
//! back on `/a2a/result`; callers poll `/tasks/{task_id}/status`.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::protocol::a2a::{
    A2AAck, A2AClient, A2AMessage, AckStatus, AssignTaskPayload, MessageType, SendError, TaskResultPayload,
    TaskStatus, ARTICLE_DRAFT_AGENT, RESEARCHER_AGENT, TASK_MANAGER_AGENT, TASK_TYPE_ARTICLE_DRAFT,
    TASK_TYPE_RESEARCH,
};
use crate::types::{AppError, AppResult};

/// Tracked state of one task. Every field is always serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub status: TaskStatus,
    pub result: Option<Map<String, Value>>,
    pub error: Option<Map<String, Value>>,
    /// Agent question text, or `{"text": ...}` when the agent sent none.
    pub question: Option<Value>,
}

impl TaskRecord {
    pub fn processing() -> Self {
        Self {
            status: TaskStatus::Processing,
            result: None,
            error: None,
            question: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: None,
            error: Some(message_map(message)),
            question: None,
        }
    }

    fn unknown() -> Self {
        Self {
            status: TaskStatus::Unknown,
            ..Self::processing()
        }
    }

    /// Fold a worker's result payload into this record.
    fn apply(&mut self, payload: TaskResultPayload) {
        self.status = payload.status.clone();
        match payload.status {
            TaskStatus::Completed => {
                self.result = Some(payload.result.unwrap_or_default());
                self.error = None;
                self.question = None;
            }
            TaskStatus::Failed => {
                self.result = None;
                self.error = Some(
                    payload
                        .error
                        .unwrap_or_else(|| message_map("Unknown error from agent.")),
                );
                self.question = None;
            }
            TaskStatus::RequiresClarification => {
                self.result = None;
                self.error = None;
                self.question = Some(match payload.question {
                    Some(question) => Value::String(question),
                    None => json!({"text": "Clarification needed, no question provided."}),
                });
            }
            other => {
                self.status = TaskStatus::Unknown;
                self.error = Some(message_map(format!("Received unknown status: {}", other)));
            }
        }
    }
}

fn message_map(message: impl Into<String>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("message".to_string(), Value::String(message.into()));
    map
}

/// In-memory task table shared by all request handlers.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task_id: &str, record: TaskRecord) {
        let mut guard = self.tasks.write().await;
        guard.insert(task_id.to_string(), record);
    }

    pub async fn get(&self, task_id: &str) -> Option<TaskRecord> {
        let guard = self.tasks.read().await;
        guard.get(task_id).cloned()
    }

    /// Apply a result payload, creating the record for unseen task ids.
    pub async fn apply_result(&self, task_id: &str, payload: TaskResultPayload) -> TaskRecord {
        let mut guard = self.tasks.write().await;
        let record = guard.entry(task_id.to_string()).or_insert_with(TaskRecord::unknown);
        record.apply(payload);
        record.clone()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Clone)]
pub struct TaskManagerState {
    pub registry: TaskRegistry,
    client: A2AClient,
    researcher_url: String,
    article_draft_url: String,
    dispatch_timeout: Duration,
    research_language: String,
    research_max_words: u32,
}

impl TaskManagerState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            registry: TaskRegistry::new(),
            client: A2AClient::new(),
            researcher_url: config.endpoints.researcher_agent_url.clone(),
            article_draft_url: config.endpoints.article_draft_agent_url.clone(),
            dispatch_timeout: Duration::from_secs(config.agents.dispatch_timeout_secs),
            research_language: config.agents.research_language.clone(),
            research_max_words: config.agents.research_max_words,
        }
    }

    /// Send an assignment. A timeout counts as delivered; any other failure
    /// marks the task failed and surfaces as 503.
    async fn dispatch(
        &self,
        task_id: &str,
        receiver: &str,
        agent_label: &str,
        url: &str,
        payload: AssignTaskPayload,
    ) -> AppResult<()> {
        let message = A2AMessage::assign_task(task_id, TASK_MANAGER_AGENT, receiver, &payload);
        info!(task_id, receiver, task_type = %payload.task_type, "Sending task assignment");

        match self.client.send(url, &message, self.dispatch_timeout).await {
            Ok(()) => {
                info!(task_id, receiver, "Assignment accepted by agent");
                Ok(())
            }
            Err(SendError::Timeout(e)) => {
                warn!(task_id, receiver, error = %e, "Agent did not answer in time, assuming assignment delivered");
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to communicate with {}: {}", agent_label, e);
                error!(task_id, receiver, error = %e, "Task assignment failed");
                self.registry.insert(task_id, TaskRecord::failed(message.clone())).await;
                Err(AppError::Unavailable(message))
            }
        }
    }
}

pub fn router(state: TaskManagerState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/trigger_research_task", post(trigger_research_task))
        .route("/trigger_article_task", post(trigger_article_task))
        .route("/a2a/result", post(receive_result))
        .route("/tasks/{task_id}/status", get(get_task_status))
        .with_state(state)
}

async fn read_root() -> Json<Value> {
    Json(json!({"message": "Task Manager Agent is running."}))
}

#[derive(Debug, Deserialize)]
pub struct ResearchQuery {
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArticleQuery {
    pub topic: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: TaskStatus,
    pub task_id: String,
    pub message: String,
}

fn required_topic(topic: Option<String>) -> AppResult<String> {
    topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Query parameter 'topic' must not be empty.".to_string()))
}

async fn trigger_research_task(
    State(state): State<TaskManagerState>,
    Query(query): Query<ResearchQuery>,
) -> AppResult<Json<TriggerResponse>> {
    let topic = required_topic(query.topic)?;
    let task_id = Uuid::new_v4().to_string();
    info!(task_id = %task_id, topic = %topic, "Research task requested");
    state.registry.insert(&task_id, TaskRecord::processing()).await;

    let mut parameters = Map::new();
    parameters.insert("topic".to_string(), Value::String(topic));
    parameters.insert("language".to_string(), Value::String(state.research_language.clone()));
    parameters.insert("max_words".to_string(), json!(state.research_max_words));

    state
        .dispatch(
            &task_id,
            RESEARCHER_AGENT,
            "Researcher Agent",
            &state.researcher_url,
            AssignTaskPayload {
                task_type: TASK_TYPE_RESEARCH.to_string(),
                parameters,
            },
        )
        .await?;

    Ok(Json(TriggerResponse {
        status: TaskStatus::Processing,
        task_id,
        message: "Research task assignment sent.".to_string(),
    }))
}

async fn trigger_article_task(
    State(state): State<TaskManagerState>,
    Query(query): Query<ArticleQuery>,
) -> AppResult<Json<TriggerResponse>> {
    let topic = required_topic(query.topic)?;
    let task_id = Uuid::new_v4().to_string();
    info!(task_id = %task_id, topic = %topic, style = ?query.style, "Article draft task requested");
    state.registry.insert(&task_id, TaskRecord::processing()).await;

    let mut parameters = Map::new();
    parameters.insert("topic".to_string(), Value::String(topic));
    if let Some(style) = query.style {
        parameters.insert("style".to_string(), Value::String(style));
    }

    state
        .dispatch(
            &task_id,
            ARTICLE_DRAFT_AGENT,
            "Article Draft Agent",
            &state.article_draft_url,
            AssignTaskPayload {
                task_type: TASK_TYPE_ARTICLE_DRAFT.to_string(),
                parameters,
            },
        )
        .await?;

    Ok(Json(TriggerResponse {
        status: TaskStatus::Processing,
        task_id,
        message: "Article draft task assignment sent.".to_string(),
    }))
}

async fn receive_result(
    State(state): State<TaskManagerState>,
    Json(message): Json<A2AMessage>,
) -> Json<A2AAck> {
    let task_id = message.task_id.clone();
    info!(
        task_id = %task_id,
        sender = %message.sender_agent_id,
        message_type = %message.message_type,
        "A2A result received"
    );

    if task_id.is_empty() {
        warn!(message_id = %message.message_id, "Result message missing task_id");
        return Json(A2AAck::new(
            AckStatus::AckError,
            &message.message_id,
            "Result received but task_id missing.",
        ));
    }

    if message.message_type != MessageType::TaskResult {
        warn!(task_id = %task_id, message_type = %message.message_type, "Unexpected message type on result endpoint");
        return Json(A2AAck::error(
            &message.message_id,
            format!("Unexpected message type on result endpoint: {}", message.message_type),
        ));
    }

    let payload: TaskResultPayload = match message.decode_payload() {
        Ok(payload) => payload,
        Err(e) => {
            let detail = e.detail();
            error!(task_id = %task_id, error = %detail, "Could not process task_result payload");
            state
                .registry
                .insert(
                    &task_id,
                    TaskRecord::failed(format!("Internal server error processing result payload: {}", detail)),
                )
                .await;
            return Json(A2AAck::error(
                &message.message_id,
                format!("Internal error processing result payload: {}", detail),
            ));
        }
    };

    let record = state.registry.apply_result(&task_id, payload).await;
    match record.status {
        TaskStatus::Failed | TaskStatus::Unknown => {
            warn!(task_id = %task_id, status = %record.status, error = ?record.error, "Task status updated")
        }
        _ => info!(task_id = %task_id, status = %record.status, "Task status updated"),
    }

    Json(A2AAck::ack(&message.message_id, "Result received and processed."))
}

async fn get_task_status(
    State(state): State<TaskManagerState>,
    Path(task_id): Path<String>,
) -> AppResult<Json<TaskRecord>> {
    match state.registry.get(&task_id).await {
        Some(record) => Ok(Json(record)),
        None => {
            warn!(task_id = %task_id, "Status requested for unknown task");
            Err(AppError::NotFound("Task ID not found or not yet initialized.".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use mockito::Matcher;
    use tower::ServiceExt;

    fn state_with_urls(researcher_url: &str, article_url: &str) -> TaskManagerState {
        let mut config = Config::for_tests();
        config.endpoints.researcher_agent_url = researcher_url.to_string();
        config.endpoints.article_draft_agent_url = article_url.to_string();
        TaskManagerState::from_config(&config)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn result_message(task_id: &str, payload: Value) -> Value {
        json!({
            "task_id": task_id,
            "message_id": "m-1",
            "sender_agent_id": "researcher_agent",
            "receiver_agent_id": "task_manager_agent",
            "message_type": "task_result",
            "payload": payload
        })
    }

    #[tokio::test]
    async fn test_trigger_research_dispatches_assignment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/a2a/message")
            .match_body(Matcher::PartialJson(json!({
                "sender_agent_id": "task_manager_agent",
                "receiver_agent_id": "researcher_agent",
                "message_type": "assign_task",
                "payload": {
                    "task_type": "research",
                    "parameters": {"topic": "Rust async", "language": "English", "max_words": 500}
                }
            })))
            .with_status(200)
            .with_body(r#"{"status":"processing","message_id":"x","detail":"started"}"#)
            .create_async()
            .await;

        let state = state_with_urls(&format!("{}/a2a/message", server.url()), "http://127.0.0.1:9");
        let registry = state.registry.clone();
        let (status, body) = send(router(state), post("/trigger_research_task?topic=Rust%20async")).await;

        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processing");
        assert_eq!(body["message"], "Research task assignment sent.");

        let task_id = body["task_id"].as_str().unwrap();
        assert_eq!(registry.get(task_id).await, Some(TaskRecord::processing()));
    }

    #[tokio::test]
    async fn test_trigger_research_assumes_delivery_on_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let mut config = Config::for_tests();
        config.endpoints.researcher_agent_url = format!("http://{}/a2a/message", addr);
        config.agents.dispatch_timeout_secs = 1;
        let state = TaskManagerState::from_config(&config);
        let registry = state.registry.clone();

        let (status, body) = send(router(state), post("/trigger_research_task?topic=slow")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processing");
        let task_id = body["task_id"].as_str().unwrap();
        assert_eq!(registry.get(task_id).await, Some(TaskRecord::processing()));
    }

    #[tokio::test]
    async fn test_trigger_article_marks_failed_when_agent_down() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/a2a/message")
            .match_body(Matcher::PartialJson(json!({
                "payload": {"task_type": "write_article_draft", "parameters": {"topic": "Ferris", "style": "playful"}}
            })))
            .with_status(500)
            .with_body("agent crashed")
            .create_async()
            .await;

        let state = state_with_urls("http://127.0.0.1:9", &format!("{}/a2a/message", server.url()));
        let registry = state.registry.clone();
        let (status, body) = send(
            router(state),
            post("/trigger_article_task?topic=Ferris&style=playful"),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.starts_with("Failed to communicate with Article Draft Agent:"));

        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_trigger_rejects_blank_topic() {
        let state = state_with_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        let registry = state.registry.clone();
        let (status, _) = send(router(state), post("/trigger_research_task?topic=%20%20")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_result_lifecycle() {
        let state = state_with_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        state.registry.insert("t-1", TaskRecord::processing()).await;
        let app = router(state);

        let (status, body) = send(app.clone(), get("/tasks/t-1/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "processing", "result": null, "error": null, "question": null})
        );

        let (_, ack) = send(
            app.clone(),
            post_json(
                "/a2a/result",
                result_message("t-1", json!({"status": "completed", "result": {"summary": "done"}})),
            ),
        )
        .await;
        assert_eq!(ack["status"], "ack");
        assert_eq!(ack["detail"], "Result received and processed.");

        let (_, body) = send(app, get("/tasks/t-1/status")).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"], json!({"summary": "done"}));
    }

    #[tokio::test]
    async fn test_result_defaults_and_unknown_status() {
        let state = state_with_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        let registry = state.registry.clone();
        let app = router(state);

        send(app.clone(), post_json("/a2a/result", result_message("t-2", json!({"status": "failed"})))).await;
        assert_eq!(
            registry.get("t-2").await.unwrap().error,
            Some(message_map("Unknown error from agent."))
        );

        send(
            app.clone(),
            post_json("/a2a/result", result_message("t-3", json!({"status": "requires_clarification"}))),
        )
        .await;
        assert_eq!(
            registry.get("t-3").await.unwrap().question,
            Some(json!({"text": "Clarification needed, no question provided."}))
        );

        send(app, post_json("/a2a/result", result_message("t-4", json!({"status": "paused"})))).await;
        let record = registry.get("t-4").await.unwrap();
        assert_eq!(record.status, TaskStatus::Unknown);
        assert_eq!(record.error, Some(message_map("Received unknown status: paused")));
    }

    #[tokio::test]
    async fn test_result_rejections() {
        let state = state_with_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        let registry = state.registry.clone();
        let app = router(state);

        let (_, ack) = send(app.clone(), post_json("/a2a/result", result_message("", json!({"status": "completed"})))).await;
        assert_eq!(ack["status"], "ack_error");

        let mut wrong_type = result_message("t-5", json!({"status": "completed"}));
        wrong_type["message_type"] = json!("assign_task");
        let (_, ack) = send(app.clone(), post_json("/a2a/result", wrong_type)).await;
        assert_eq!(ack["status"], "error");
        assert_eq!(ack["detail"], "Unexpected message type on result endpoint: assign_task");
        assert!(registry.get("t-5").await.is_none());

        let (_, ack) = send(app, post_json("/a2a/result", result_message("t-6", json!({"result": {}})))).await;
        assert_eq!(ack["status"], "error");
        let record = registry.get("t-6").await.unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        let message = record.error.unwrap()["message"].as_str().unwrap().to_string();
        assert!(message.starts_with("Internal server error processing result payload:"));
    }

    #[tokio::test]
    async fn test_unknown_task_status_is_404() {
        let state = state_with_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        let (status, body) = send(router(state), get("/tasks/missing/status")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Task ID not found or not yet initialized."}));
    }
}
