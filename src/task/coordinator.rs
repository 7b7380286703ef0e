//! Task coordinator: admission, deduplication, and the background pipeline.
//!
//! ```text
//!  submit ──► secret ok? ──► valid? ──► registry.put_processing
//!                                         │ new            │ known
//!                                         ▼                ▼
//!                               spawn pipeline      answer from registry
//!                                         │
//!        generate ──► publish ──► deliver callback ──► set_completed
//!            └──────────┴──► set_failed
//! ```
//!
//! The accepting call returns as soon as the pipeline is spawned. Pipeline
//! outcomes are observable only through the registry.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use super::registry::TaskRegistry;
use super::task::{
    EvaluationPayload, PublishResult, TaskId, TaskState, TaskSubmission, ValidationError,
};
use crate::config::DeliveryConfig;
use crate::delivery::DeliveryClient;
use crate::generator::CodeGenerator;
use crate::publish::Publisher;

/// Synchronous rejections. None of these change registry state.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid secret")]
    Unauthorized,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Service is shutting down")]
    ShuttingDown,
}

/// How a submission was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// New task; the pipeline has been scheduled.
    Accepted { task_id: TaskId },
    /// A pipeline for this id is already running.
    Processing { task_id: TaskId },
    Completed { task_id: TaskId, result: PublishResult },
    Failed { task_id: TaskId, error: String },
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a_bytes.iter().zip(b_bytes) {
        diff |= x ^ y;
    }
    diff == 0
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Everything a spawned pipeline needs, cheap to clone into each task.
#[derive(Clone)]
struct Pipeline {
    registry: Arc<TaskRegistry>,
    generator: Arc<dyn CodeGenerator>,
    publisher: Arc<dyn Publisher>,
    delivery: Arc<DeliveryClient>,
    delivery_config: DeliveryConfig,
}

/// Why a pipeline stopped before completing.
#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error("Code generation failed: {0}")]
    Generation(#[from] crate::generator::GenerationError),
    #[error("Publishing failed: {0}")]
    Publish(#[from] crate::publish::PublishError),
}

impl Pipeline {
    async fn run(self, submission: TaskSubmission) {
        let task_id = submission.task_id.clone();
        // A panicking adapter must still leave the task in a terminal state.
        let outcome = AssertUnwindSafe(self.execute(&submission))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(result)) => {
                tracing::info!(pages_url = %result.pages_url, "Task completed");
                self.registry.set_completed(&task_id, result).await;
            }
            Ok(Err(e)) => {
                tracing::error!("Task failed: {}", e);
                self.registry.set_failed(&task_id, e.to_string()).await;
            }
            Err(payload) => {
                let message = format!("pipeline panicked: {}", panic_message(&*payload));
                tracing::error!("Task failed: {}", message);
                self.registry.set_failed(&task_id, message).await;
            }
        }
    }

    async fn execute(&self, submission: &TaskSubmission) -> Result<PublishResult, PipelineError> {
        tracing::info!("Generating application source");
        let source = self
            .generator
            .generate(&submission.brief, &submission.checks, &submission.attachments)
            .await?;

        tracing::info!("Publishing generated application");
        let result = self
            .publisher
            .publish(&submission.task_id, &source, &submission.brief)
            .await?;

        let payload = EvaluationPayload::new(submission, &result);
        let delivered = self
            .delivery
            .deliver(
                &submission.evaluation_url,
                &payload,
                self.delivery_config.max_attempts,
                self.delivery_config.base_delay,
            )
            .await;
        if !delivered {
            tracing::warn!(
                url = %submission.evaluation_url,
                "Evaluation callback was not acknowledged; task result is unaffected"
            );
        }

        Ok(result)
    }
}

pub struct TaskCoordinator {
    secret: String,
    pipeline: Pipeline,
    tracker: TaskTracker,
}

impl TaskCoordinator {
    pub fn new(
        secret: impl Into<String>,
        registry: Arc<TaskRegistry>,
        generator: Arc<dyn CodeGenerator>,
        publisher: Arc<dyn Publisher>,
        delivery: Arc<DeliveryClient>,
        delivery_config: DeliveryConfig,
    ) -> Self {
        Self {
            secret: secret.into(),
            pipeline: Pipeline {
                registry,
                generator,
                publisher,
                delivery,
                delivery_config,
            },
            tracker: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.pipeline.registry
    }

    pub fn verify_secret(&self, provided: Option<&str>) -> bool {
        match provided {
            Some(secret) => constant_time_eq(secret, &self.secret),
            None => false,
        }
    }

    /// Admit a raw submission body.
    ///
    /// The secret is checked before anything else, so a bad secret is
    /// reported even when the rest of the body is malformed.
    pub async fn submit(&self, body: Value) -> Result<SubmitOutcome, SubmitError> {
        let secret = body.get("secret").and_then(Value::as_str);
        if !self.verify_secret(secret) {
            tracing::warn!("Rejected submission with invalid secret");
            return Err(SubmitError::Unauthorized);
        }

        let submission = TaskSubmission::from_json(body)?;
        let task_id = submission.task_id.clone();
        tracing::info!(task_id = %task_id, round = ?submission.round, "Received task");

        if !self.pipeline.registry.put_processing(&task_id).await {
            return Ok(self.existing(task_id).await);
        }

        if self.tracker.is_closed() {
            self.pipeline
                .registry
                .set_failed(&task_id, "Service shut down before the task started")
                .await;
            return Err(SubmitError::ShuttingDown);
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", task_id = %task_id, run_id = %run_id);
        let pipeline = self.pipeline.clone();
        self.tracker
            .spawn(async move { pipeline.run(submission).await }.instrument(span));

        Ok(SubmitOutcome::Accepted { task_id })
    }

    /// Answer a duplicate submission from the registry.
    async fn existing(&self, task_id: TaskId) -> SubmitOutcome {
        match self.pipeline.registry.get(&task_id).await {
            TaskState::Completed(result) => {
                tracing::info!(
                    task_id = %task_id,
                    "Task already completed, returning stored result"
                );
                SubmitOutcome::Completed { task_id, result }
            }
            TaskState::Failed { error } => {
                tracing::info!(task_id = %task_id, "Task already failed, returning stored error");
                SubmitOutcome::Failed { task_id, error }
            }
            TaskState::Processing | TaskState::Unknown => {
                tracing::info!(task_id = %task_id, "Task already processing");
                SubmitOutcome::Processing { task_id }
            }
        }
    }

    /// Stop accepting new pipelines and wait for running ones to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            tracing::info!("Waiting for {} running pipelines", self.tracker.len());
        }
        self.tracker.wait().await;
    }
}
