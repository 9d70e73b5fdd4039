//! Task Manager client
//!
//! HTTP client for the task manager's public endpoints plus the submit
//! flow used by the CLI: supervisor review, trigger, poll, report.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::agents::task_manager::{TaskRecord, TriggerResponse};
use crate::protocol::a2a::TaskStatus;
use crate::supervisor::{Review, Supervisor, TaskKind};
use crate::types::{AppError, AppResult};

const TRIGGER_TIMEOUT: Duration = Duration::from_secs(15);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
const CONTENT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct TaskManagerClient {
    http: reqwest::Client,
    base_url: String,
}

impl TaskManagerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn trigger(&self, path: &str, query: &[(&str, &str)]) -> AppResult<TriggerResponse> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .query(query)
            .timeout(TRIGGER_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Unavailable(format!("Could not communicate with Task Manager: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Unavailable(format!(
                "Task Manager answered HTTP {}: {}",
                status.as_u16(),
                detail_of(&body)
            )));
        }

        response
            .json::<TriggerResponse>()
            .await
            .map_err(|e| AppError::Protocol(format!("Could not read task_id from Task Manager: {}", e)))
    }

    pub async fn trigger_research(&self, topic: &str) -> AppResult<TriggerResponse> {
        self.trigger("/trigger_research_task", &[("topic", topic)]).await
    }

    pub async fn trigger_article(&self, topic: &str, style: Option<&str>) -> AppResult<TriggerResponse> {
        let mut query = vec![("topic", topic)];
        if let Some(style) = style {
            query.push(("style", style));
        }
        self.trigger("/trigger_article_task", &query).await
    }

    /// Current record, or `None` while the task manager does not know the id.
    pub async fn status(&self, task_id: &str) -> AppResult<Option<TaskRecord>> {
        let url = format!("{}/tasks/{}/status", self.base_url, task_id);
        let response = self
            .http
            .get(&url)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Unavailable(format!("Status request timed out: {}", e))
                } else {
                    AppError::Internal(format!("Status request failed: {}", e))
                }
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Status request answered HTTP {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<TaskRecord>()
            .await
            .map(Some)
            .map_err(|e| AppError::Protocol(e.to_string()))
    }

    /// Poll until the task leaves `processing` or `max_wait` runs out.
    /// Unknown ids and timeouts are retried.
    pub async fn wait_for(&self, task_id: &str, interval: Duration, max_wait: Duration) -> AppResult<TaskRecord> {
        let started = Instant::now();
        loop {
            match self.status(task_id).await {
                Ok(Some(record)) if record.status.is_terminal() => {
                    info!(task_id, status = %record.status, "Task finished");
                    return Ok(record);
                }
                Ok(Some(record)) => debug!(task_id, status = %record.status, "Task still running"),
                Ok(None) => debug!(task_id, "Task Manager has not recognized the task yet"),
                Err(AppError::Unavailable(e)) => warn!(task_id, error = %e, "Status check timed out, retrying"),
                Err(e) => return Err(e),
            }

            if started.elapsed() + interval > max_wait {
                return Err(AppError::Unavailable(format!(
                    "Gave up waiting for task {} after {}s",
                    task_id,
                    max_wait.as_secs()
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Fetch a stored draft from its public URL.
    pub async fn fetch_content(&self, url: &str) -> AppResult<String> {
        let response = self
            .http
            .get(url)
            .timeout(CONTENT_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::NotFound(format!(
                "Content at '{}' answered HTTP {}",
                url,
                response.status().as_u16()
            )));
        }
        response.text().await.map_err(|e| AppError::Internal(e.to_string()))
    }
}

fn detail_of(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Research { topic: String },
    Article { topic: String, style: Option<String> },
}

impl Submission {
    pub fn kind(&self) -> TaskKind {
        match self {
            Submission::Research { .. } => TaskKind::Research,
            Submission::Article { .. } => TaskKind::Article,
        }
    }

    fn parts(&self) -> (&str, Option<&str>) {
        match self {
            Submission::Research { topic } => (topic, None),
            Submission::Article { topic, style } => (topic, style.as_deref()),
        }
    }
}

/// Terminal state of a submission, ready to show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Rejected(String),
    ArticleSaved { url: String },
    ArticleMissingUrl,
    ResearchSummary(String),
    ResearchMissingSummary,
    Failed(String),
    NeedsClarification(String),
    UnknownStatus(String),
}

impl Report {
    /// Rejected input or a failed task; the CLI exits non-zero on these.
    pub fn is_failure(&self) -> bool {
        matches!(self, Report::Rejected(_) | Report::Failed(_))
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Report::Rejected(reason) => write!(f, "Input rejected: {}", reason),
            Report::ArticleSaved { url } => write!(f, "Article task completed. Saved at {}", url),
            Report::ArticleMissingUrl => write!(f, "Article task completed but result URL not found."),
            Report::ResearchSummary(summary) => write!(f, "Research task completed.\n\n{}", summary),
            Report::ResearchMissingSummary => write!(f, "Research task completed but summary not found."),
            Report::Failed(message) => write!(f, "Task failed! Details: {}", message),
            Report::NeedsClarification(question) => {
                write!(f, "Task needs additional information: {}", question)
            }
            Report::UnknownStatus(status) => write!(f, "Task ended in unexpected state '{}'.", status),
        }
    }
}

/// Turn a finished task record into a report.
pub fn report_for(kind: TaskKind, record: &TaskRecord) -> Report {
    let result_str = |key: &str| {
        record
            .result
            .as_ref()
            .and_then(|r| r.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match &record.status {
        TaskStatus::Completed => match kind {
            TaskKind::Article => match result_str("saved_url") {
                Some(url) => Report::ArticleSaved { url },
                None => Report::ArticleMissingUrl,
            },
            TaskKind::Research => match result_str("summary") {
                Some(summary) => Report::ResearchSummary(summary),
                None => Report::ResearchMissingSummary,
            },
        },
        TaskStatus::Failed => Report::Failed(
            record
                .error
                .as_ref()
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown error.")
                .to_string(),
        ),
        TaskStatus::RequiresClarification => Report::NeedsClarification(match &record.question {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("Clarification needed...")
                .to_string(),
            None => "Clarification needed...".to_string(),
        }),
        other => Report::UnknownStatus(other.to_string()),
    }
}

/// Review, trigger and wait for one submission.
pub async fn run_submission(
    client: &TaskManagerClient,
    supervisor: &Supervisor,
    submission: &Submission,
    interval: Duration,
    max_wait: Duration,
) -> anyhow::Result<(Option<String>, Report)> {
    let (topic, style) = submission.parts();
    let kind = submission.kind();

    let (topic, style) = match supervisor.review(kind, topic, style).await? {
        Review::Approved { topic, style } => (topic, style),
        Review::Rejected { error_message } => return Ok((None, Report::Rejected(error_message))),
    };

    let trigger = match kind {
        TaskKind::Research => client.trigger_research(&topic).await?,
        TaskKind::Article => client.trigger_article(&topic, style.as_deref()).await?,
    };
    info!(task_id = %trigger.task_id, kind = kind.as_str(), topic = %topic, "Task started, waiting for result");

    let record = client.wait_for(&trigger.task_id, interval, max_wait).await?;
    Ok((Some(trigger.task_id), report_for(kind, &record)))
}
