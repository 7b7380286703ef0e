//! Task, submission, and lifecycle state types.
//!
//! A task is identified by an opaque caller-supplied string. Its lifecycle is
//! `Processing → Completed | Failed`, with exactly one terminal transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque caller-supplied task identifier.
pub type TaskId = String;

/// Wire shape of a submission body.
///
/// Every field is optional here so that presence checks produce a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub round: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub checks: Vec<String>,
    /// Data-URI-like blobs, either bare strings or `{name, url}` objects.
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default)]
    pub evaluation_url: Option<String>,
}

/// A validated submission, ready to run through the pipeline.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    pub task_id: TaskId,
    pub email: Option<String>,
    pub round: Option<i64>,
    pub nonce: Option<String>,
    pub brief: String,
    pub checks: Vec<String>,
    pub attachments: Vec<Value>,
    pub evaluation_url: String,
}

/// Reasons a submission body is rejected before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid evaluation_url: {0}")]
    InvalidEvaluationUrl(String),
    #[error("Malformed request body: {0}")]
    Malformed(String),
}

impl TaskSubmission {
    /// Parse and validate a raw JSON body.
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let request: TaskRequest = serde_json::from_value(body)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::try_from(request)
    }
}

impl TryFrom<TaskRequest> for TaskSubmission {
    type Error = ValidationError;

    fn try_from(req: TaskRequest) -> Result<Self, Self::Error> {
        let task_id = non_empty(req.task).ok_or(ValidationError::MissingField("task"))?;
        let brief = non_empty(req.brief).ok_or(ValidationError::MissingField("brief"))?;
        let evaluation_url = non_empty(req.evaluation_url)
            .ok_or(ValidationError::MissingField("evaluation_url"))?;

        let parsed = url::Url::parse(&evaluation_url)
            .map_err(|e| ValidationError::InvalidEvaluationUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidEvaluationUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            task_id,
            email: req.email,
            round: req.round,
            nonce: req.nonce,
            brief,
            checks: req.checks,
            attachments: req.attachments,
            evaluation_url,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Addressable result of publishing a generated application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Repository (content location) URL.
    pub repo_url: String,
    /// Head commit of the repository after publishing.
    pub commit_sha: String,
    /// Public static-site URL.
    pub pages_url: String,
}

/// Lifecycle state of a task as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskState {
    /// Never submitted.
    Unknown,
    Processing,
    Completed(PublishResult),
    Failed { error: String },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed(_) | TaskState::Failed { .. })
    }
}

/// A registry entry: state plus bookkeeping timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task: TaskId,
    #[serde(flatten)]
    pub state: TaskState,
    pub accepted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Body POSTed to the caller's evaluation URL once a task is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationPayload {
    pub email: Option<String>,
    pub task: TaskId,
    pub round: Option<i64>,
    pub nonce: Option<String>,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl EvaluationPayload {
    pub fn new(submission: &TaskSubmission, result: &PublishResult) -> Self {
        Self {
            email: submission.email.clone(),
            task: submission.task_id.clone(),
            round: submission.round,
            nonce: submission.nonce.clone(),
            repo_url: result.repo_url.clone(),
            commit_sha: result.commit_sha.clone(),
            pages_url: result.pages_url.clone(),
        }
    }
}
