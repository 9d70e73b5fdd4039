//! Generic worker agent endpoint
//!
//! Every worker speaks the same A2A dialect on `POST /a2a/message`; only
//! parameter validation and the job itself differ. A [`WorkerAgent`]
//! supplies those two pieces and [`router`] does the rest.
//!
//! Accepted assignments are answered with `processing` right away and run
//! on a background task that reports the outcome to the task manager.

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::protocol::a2a::{
    error_codes, A2AAck, A2AMessage, AckStatus, AssignTaskPayload, MessageType, ResultReporter,
    TaskStatusUpdatePayload,
};

/// Why an assignment was refused before any work started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: &'static str,
    pub message: String,
    /// Agent misconfiguration rather than a bad request; answered with HTTP 500.
    pub server_fault: bool,
}

impl Rejection {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            server_fault: false,
        }
    }

    pub fn server_fault(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            server_fault: true,
            ..Self::new(code, message)
        }
    }
}

/// Final result of a background job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(Map<String, Value>),
    Failed {
        code: &'static str,
        message: String,
        result: Option<Map<String, Value>>,
    },
    NeedsClarification(String),
}

impl JobOutcome {
    pub fn failed(code: &'static str, message: impl Into<String>) -> Self {
        JobOutcome::Failed {
            code,
            message: message.into(),
            result: None,
        }
    }
}

#[async_trait]
pub trait WorkerAgent: Send + Sync + 'static {
    type Job: Send + 'static;

    fn agent_id(&self) -> &'static str;

    /// Human-readable name used in liveness and log messages.
    fn display_name(&self) -> &'static str;

    fn task_type(&self) -> &'static str;

    /// Validate assignment parameters into a runnable job.
    fn prepare(&self, payload: &AssignTaskPayload) -> Result<Self::Job, Rejection>;

    async fn execute(&self, task_id: &str, job: Self::Job) -> JobOutcome;
}

pub struct WorkerState<A> {
    agent: Arc<A>,
    reporter: ResultReporter,
}

impl<A> Clone for WorkerState<A> {
    fn clone(&self) -> Self {
        Self {
            agent: self.agent.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

impl<A: WorkerAgent> WorkerState<A> {
    pub fn new(agent: A, reporter: ResultReporter) -> Self {
        Self {
            agent: Arc::new(agent),
            reporter,
        }
    }

    pub fn from_config(agent: A, config: &Config) -> Self {
        let reporter = ResultReporter::new(
            config.endpoints.task_manager_result_url.clone(),
            agent.agent_id(),
            Duration::from_secs(config.agents.result_timeout_secs),
        );
        Self::new(agent, reporter)
    }
}

pub fn router<A: WorkerAgent>(state: WorkerState<A>) -> Router {
    Router::new()
        .route("/", get(read_root::<A>))
        .route("/a2a/message", post(receive_message::<A>))
        .with_state(state)
}

async fn read_root<A: WorkerAgent>(State(state): State<WorkerState<A>>) -> Json<Value> {
    Json(json!({"message": format!("{} is running.", state.agent.display_name())}))
}

/// Send an outcome to the task manager. Delivery failures are only logged.
pub async fn report_outcome(reporter: &ResultReporter, task_id: &str, outcome: JobOutcome) {
    let delivery = match outcome {
        JobOutcome::Completed(result) => reporter.completed(task_id, result).await,
        JobOutcome::Failed { code, message, result } => reporter.failed(task_id, code, &message, result).await,
        JobOutcome::NeedsClarification(question) => reporter.needs_clarification(task_id, &question).await,
    };
    if let Err(e) = delivery {
        warn!(task_id, error = %e, "Task outcome could not be reported");
    }
}

async fn receive_message<A: WorkerAgent>(
    State(state): State<WorkerState<A>>,
    Json(message): Json<A2AMessage>,
) -> Response {
    let agent_id = state.agent.agent_id();
    info!(
        agent = agent_id,
        task_id = %message.task_id,
        message_type = %message.message_type,
        sender = %message.sender_agent_id,
        "A2A message received"
    );

    match &message.message_type {
        MessageType::AssignTask => handle_assignment(state, message).await,
        MessageType::TaskStatusUpdate => match message.decode_payload::<TaskStatusUpdatePayload>() {
            Ok(_) => ack(A2AAck::ack(&message.message_id, "Status update received.")),
            Err(_) => ack(A2AAck::error(
                &message.message_id,
                "Invalid payload for task_status_update message.",
            )),
        },
        MessageType::TaskResult => ack(A2AAck::ack(
            &message.message_id,
            "Task result received (but not processed).",
        )),
        MessageType::Error => ack(A2AAck::ack(
            &message.message_id,
            "Error message received (but not processed).",
        )),
        other => ack(A2AAck::error(
            &message.message_id,
            format!("Unknown message type: {}", other),
        )),
    }
}

fn ack(body: A2AAck) -> Response {
    Json(body).into_response()
}

async fn handle_assignment<A: WorkerAgent>(state: WorkerState<A>, message: A2AMessage) -> Response {
    let task_id = message.task_id.clone();
    let agent = state.agent.clone();

    let payload: AssignTaskPayload = match message.decode_payload() {
        Ok(payload) => payload,
        Err(e) => {
            let detail = format!("Payload validation/type check failed: {}", e.detail());
            warn!(task_id = %task_id, error = %detail, "Rejected assignment payload");
            report_outcome(
                &state.reporter,
                &task_id,
                JobOutcome::failed(error_codes::INVALID_PAYLOAD, detail.clone()),
            )
            .await;
            return ack(A2AAck::error(&message.message_id, detail));
        }
    };

    if payload.task_type != agent.task_type() {
        warn!(task_id = %task_id, task_type = %payload.task_type, "Unknown task type");
        report_outcome(
            &state.reporter,
            &task_id,
            JobOutcome::failed(
                error_codes::UNKNOWN_TASK_TYPE,
                format!(
                    "Unknown task type received by {}: {}",
                    agent.display_name(),
                    payload.task_type
                ),
            ),
        )
        .await;
        return ack(A2AAck::error(
            &message.message_id,
            format!("Unknown task type: {}", payload.task_type),
        ));
    }

    let job = match agent.prepare(&payload) {
        Ok(job) => job,
        Err(rejection) => {
            warn!(task_id = %task_id, code = rejection.code, reason = %rejection.message, "Assignment rejected");
            report_outcome(
                &state.reporter,
                &task_id,
                JobOutcome::failed(rejection.code, rejection.message.clone()),
            )
            .await;
            if rejection.server_fault {
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": rejection.message}))).into_response();
            }
            return ack(A2AAck::error(&message.message_id, rejection.message));
        }
    };

    let reporter = state.reporter.clone();
    let job_task_id = task_id.clone();
    tokio::spawn(async move {
        info!(task_id = %job_task_id, agent = agent.agent_id(), "Job started");
        let outcome = agent.execute(&job_task_id, job).await;
        match &outcome {
            JobOutcome::Completed(_) => info!(task_id = %job_task_id, "Job completed"),
            JobOutcome::Failed { code, message, .. } => {
                error!(task_id = %job_task_id, code, error = %message, "Job failed")
            }
            JobOutcome::NeedsClarification(_) => info!(task_id = %job_task_id, "Job needs clarification"),
        }
        report_outcome(&reporter, &job_task_id, outcome).await;
    });

    ack(A2AAck::new(
        AckStatus::Processing,
        &message.message_id,
        format!("{} task received, processing started.", agent_label(state.agent.task_type())),
    ))
}

fn agent_label(task_type: &str) -> String {
    let mut label = task_type.replace('_', " ");
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    label
}
