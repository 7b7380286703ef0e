//! Task module - task types, the in-memory registry, and the coordinator.
//!
//! - `task`: submissions, lifecycle states, publish results, callback payloads
//! - `registry`: atomic check-and-set store keyed by task id
//! - `coordinator`: secret check, deduplication, and the background pipeline

pub mod coordinator;
pub mod registry;
pub mod task;

pub use coordinator::{SubmitError, SubmitOutcome, TaskCoordinator};
pub use registry::{TaskCounts, TaskRegistry};
pub use task::{
    EvaluationPayload, PublishResult, TaskId, TaskRecord, TaskRequest, TaskState, TaskSubmission,
    ValidationError,
};
