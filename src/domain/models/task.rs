//! Task domain model.
//!
//! Tasks are discrete units of work produced by the planner. They are
//! immutable once planned; the mutable runtime record lives alongside them
//! as [`TaskState`] on the blackboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is defined but dependencies not met
    Pending,
    /// Task is ready to be picked up (dependencies met)
    Ready,
    /// Task is currently being executed
    Running,
    /// Task completed successfully
    Completed,
    /// Task failed during execution
    Failed,
    /// Task is blocked by a failed dependency
    Blocked,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Blocked)
    }

    /// Valid transitions from this status. `Failed` is reachable from the
    /// non-terminal states so cancellation can sweep work that never ran.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Ready, Self::Running, Self::Blocked, Self::Failed],
            Self::Ready => &[Self::Running, Self::Blocked, Self::Failed],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed => &[],
            Self::Failed => &[],
            Self::Blocked => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A planned unit of work. Immutable once the planner emits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique id within the DAG (planner-assigned slug).
    pub id: String,
    pub title: String,
    pub description: String,
    /// Ids of tasks that must complete before this one can start.
    pub dependencies: Vec<String>,
    /// Opaque relative weight. The planner generates 1-10; consolidation
    /// may produce larger values.
    pub effort: u32,
    pub category: String,
    /// Names of artifacts this task is expected to produce.
    pub expected_outputs: Vec<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            dependencies: vec![],
            effort: 1,
            category: "general".to_string(),
            expected_outputs: vec![],
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_effort(mut self, effort: u32) -> Self {
        self.effort = effort;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<String>) -> Self {
        self.expected_outputs = outputs;
        self
    }
}

/// One entry in a task's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TaskStatus,
    pub agent: String,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// A blocking issue raised against a running task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingIssue {
    pub description: String,
    pub raised_by: String,
    pub raised_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_by: Option<String>,
}

/// Mutable runtime record for a task, owned by the blackboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task: Task,
    pub status: TaskStatus,
    pub assigned_agent: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Ids of artifacts committed by this task.
    pub artifacts: Vec<Uuid>,
    /// Completion percentage, 0-100.
    pub progress: u8,
    pub history: Vec<StatusChange>,
    pub blocking_issues: Vec<BlockingIssue>,
}

impl TaskState {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            status: TaskStatus::Pending,
            assigned_agent: None,
            started_at: None,
            finished_at: None,
            error: None,
            artifacts: vec![],
            progress: 0,
            history: vec![],
            blocking_issues: vec![],
        }
    }

    /// Count of unresolved blocking issues.
    pub fn open_issues(&self) -> usize {
        self.blocking_issues.iter().filter(|i| !i.resolved).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Blocked.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Ready.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_transition_rules() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Ready));
        assert!(TaskStatus::Ready.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Blocked));

        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Ready));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Ready,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Blocked,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("unknown"), None);
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("api-design", "Design the API")
            .with_description("Define endpoints")
            .with_dependencies(vec!["architecture-design".to_string()])
            .with_effort(4)
            .with_category("backend")
            .with_outputs(vec!["api-spec".to_string()]);

        assert_eq!(task.id, "api-design");
        assert_eq!(task.effort, 4);
        assert_eq!(task.dependencies, vec!["architecture-design"]);
    }

    #[test]
    fn test_open_issues() {
        let mut state = TaskState::new(Task::new("t", "T"));
        state.blocking_issues.push(BlockingIssue {
            description: "missing schema".to_string(),
            raised_by: "backend-dev".to_string(),
            raised_at: Utc::now(),
            resolved: false,
            resolved_by: None,
        });
        assert_eq!(state.open_issues(), 1);
        state.blocking_issues[0].resolved = true;
        assert_eq!(state.open_issues(), 0);
    }
}
