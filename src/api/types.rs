//! Request/response bodies for the HTTP API.

use serde::Serialize;

use crate::task::{SubmitOutcome, TaskCounts};

/// Body returned by `POST /api/deploy` for every non-error outcome.
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    /// `success`, `processing`, or `failed`.
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_url: Option<String>,
}

impl From<SubmitOutcome> for DeployResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Accepted { task_id } => Self {
                status: "success",
                message: "Task accepted; deployment is in progress".to_string(),
                task: Some(task_id),
                repo_url: None,
                pages_url: None,
            },
            SubmitOutcome::Processing { task_id } => Self {
                status: "processing",
                message: "Task is already being processed".to_string(),
                task: Some(task_id),
                repo_url: None,
                pages_url: None,
            },
            SubmitOutcome::Completed { task_id, result } => Self {
                status: "success",
                message: "App deployed successfully".to_string(),
                task: Some(task_id),
                repo_url: Some(result.repo_url),
                pages_url: Some(result.pages_url),
            },
            SubmitOutcome::Failed { task_id, error } => Self {
                status: "failed",
                message: error,
                task: Some(task_id),
                repo_url: None,
                pages_url: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<&'static str>,
    pub tasks: TaskCounts,
}
