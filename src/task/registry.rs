//! In-memory task registry.
//!
//! The registry is the single source of truth for deduplication. It is owned
//! by the coordinator and shared by reference; nothing here is persisted.
//! Lock guards are never held across an `.await`, so pipelines for different
//! task ids only contend for the few instructions of a map lookup.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;

use super::task::{PublishResult, TaskId, TaskRecord, TaskState};

/// Per-state totals, used by the service metadata endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a task, `Unknown` if it was never submitted.
    pub async fn get(&self, task_id: &str) -> TaskState {
        self.entries
            .read()
            .await
            .get(task_id)
            .map(|record| record.state.clone())
            .unwrap_or(TaskState::Unknown)
    }

    /// Full record including timestamps.
    pub async fn snapshot(&self, task_id: &str) -> Option<TaskRecord> {
        self.entries.read().await.get(task_id).cloned()
    }

    /// Atomically claim a task id.
    ///
    /// Returns `true` and records `Processing` if the id was absent, `false`
    /// (leaving the entry untouched) if it was already known in any state.
    pub async fn put_processing(&self, task_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(task_id) {
            return false;
        }
        entries.insert(
            task_id.to_string(),
            TaskRecord {
                task: task_id.to_string(),
                state: TaskState::Processing,
                accepted_at: Utc::now(),
                finished_at: None,
            },
        );
        true
    }

    pub async fn set_completed(&self, task_id: &str, result: PublishResult) {
        self.finish(task_id, TaskState::Completed(result)).await;
    }

    pub async fn set_failed(&self, task_id: &str, error: impl Into<String>) {
        self.finish(
            task_id,
            TaskState::Failed {
                error: error.into(),
            },
        )
        .await;
    }

    /// Terminal states are final; late writers are ignored.
    async fn finish(&self, task_id: &str, state: TaskState) {
        let mut entries = self.entries.write().await;
        match entries.get_mut(task_id) {
            Some(record) if record.state == TaskState::Processing => {
                record.state = state;
                record.finished_at = Some(Utc::now());
            }
            Some(record) => {
                tracing::warn!(
                    task_id = %task_id,
                    current = ?record.state,
                    "Ignoring terminal transition for task that is already finished"
                );
            }
            None => {
                tracing::warn!(task_id = %task_id, "Ignoring terminal transition for unknown task");
            }
        }
    }

    pub async fn counts(&self) -> TaskCounts {
        let entries = self.entries.read().await;
        let mut counts = TaskCounts::default();
        for record in entries.values() {
            match record.state {
                TaskState::Processing => counts.processing += 1,
                TaskState::Completed(_) => counts.completed += 1,
                TaskState::Failed { .. } => counts.failed += 1,
                TaskState::Unknown => {}
            }
        }
        counts
    }
}
