//! Domain errors for the Maestro runtime.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::phase::Phase;

/// Domain-level errors that can occur in the Maestro system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(Uuid),

    #[error("Note not found: {0}")]
    NoteNotFound(Uuid),

    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: Option<Phase>, to: Phase },

    #[error("Invalid status transition from {from} to {to} for task {task}")]
    InvalidStatusTransition {
        task: String,
        from: String,
        to: String,
    },

    #[error("Task dependency cycle detected involving: {0}")]
    DependencyCycle(String),

    #[error("Planner produced an empty task list for query: {0}")]
    EmptyPlan(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Phase output failed validation after retry: {0}")]
    PhaseOutputRejected(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
