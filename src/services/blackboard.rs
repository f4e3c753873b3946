//! Shared-state blackboard service.
//!
//! The blackboard is the single point of truth for runtime state: task
//! statuses, artifacts, and inter-agent notes. Every mutation goes through
//! its API, is serialized under one write lock, and emits exactly one event
//! per changed record. Events are delivered by non-blocking send to
//! per-subscriber buffered channels; a full channel drops the subscriber
//! with a logged warning rather than blocking the write path.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Artifact, ArtifactDelta, ArtifactKind, BlockingIssue, Note, StatusChange, TaskDag, TaskState,
    TaskStatus,
};

/// Buffered events per subscriber before the subscriber is dropped.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// Kind of blackboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlackboardEventKind {
    TaskStatusChanged,
    ArtifactCreated,
    ArtifactUpdated,
    NoteCreated,
    NoteUpdated,
}

/// An event emitted by a state-changing blackboard operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardEvent {
    pub kind: BlackboardEventKind,
    pub at: DateTime<Utc>,
    /// The agent that performed the mutation.
    pub agent: String,
    pub data: serde_json::Value,
}

/// Handle returned by [`Blackboard::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<BlackboardEvent>,
}

/// Serializable queryable state. This is what `snapshot`/`restore`
/// round-trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BlackboardState {
    tasks: BTreeMap<String, TaskState>,
    dependencies: HashMap<String, Vec<String>>,
    dependents: HashMap<String, Vec<String>>,
    artifacts: BTreeMap<Uuid, Artifact>,
    notes: BTreeMap<Uuid, Note>,
}

/// Opaque snapshot blob. The host decides where (and whether) to persist it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardSnapshot {
    state: BlackboardState,
    event_seq: u64,
    pub taken_at: DateTime<Utc>,
}

/// Filters for [`Blackboard::search`]. Populated filters intersect; each
/// filter applies only to the record kinds it makes sense for.
#[derive(Debug, Clone, Default)]
pub struct BlackboardQuery {
    /// Artifacts: match kind.
    pub artifact_kind: Option<ArtifactKind>,
    /// Artifacts and notes: match a tag (artifacts) or category name (notes).
    pub tag: Option<String>,
    /// Artifacts: creating task id. Notes: authoring agent.
    pub author: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Regex matched against names, titles, and inline content.
    pub pattern: Option<String>,
    /// Tasks: assigned agent.
    pub assigned_agent: Option<String>,
    /// Tasks: inclusive progress range.
    pub min_progress: Option<u8>,
    pub max_progress: Option<u8>,
    /// Tasks: whether open blocking issues exist.
    pub has_blocking_issues: Option<bool>,
    /// Notes: read by the given agent.
    pub read_by: Option<String>,
}

/// Search output, one bucket per record kind.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub tasks: Vec<TaskState>,
    pub artifacts: Vec<Artifact>,
    pub notes: Vec<Note>,
}

/// The shared-state blackboard.
pub struct Blackboard {
    state: RwLock<BlackboardState>,
    subscribers: StdMutex<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    event_seq: AtomicU64,
}

impl Blackboard {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BlackboardState::default()),
            subscribers: StdMutex::new(vec![]),
            next_subscriber_id: AtomicU64::new(1),
            event_seq: AtomicU64::new(0),
        }
    }

    // ========================================================================
    // Event bus
    // ========================================================================

    /// Register a listener. Events are delivered through a buffered channel;
    /// if the buffer fills up the subscriber is dropped with a warning.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<BlackboardEvent>) {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber { id, tx });
        (SubscriberId(id), rx)
    }

    /// Remove a listener.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|s| s.id != id.0);
    }

    /// Deliver one event to every subscriber. Never blocks the write path:
    /// a full or closed channel removes the subscriber.
    fn emit(&self, kind: BlackboardEventKind, agent: &str, data: serde_json::Value) {
        self.event_seq.fetch_add(1, Ordering::SeqCst);
        let event = BlackboardEvent {
            kind,
            at: Utc::now(),
            agent: agent.to_string(),
            data,
        };

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|subscriber| match subscriber.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    subscriber = subscriber.id,
                    "Blackboard subscriber buffer full; dropping subscriber"
                );
                false
            }
        });
    }

    /// Events emitted so far (monotonic counter).
    pub fn event_count(&self) -> u64 {
        self.event_seq.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Task status
    // ========================================================================

    /// Seed task records from a planned DAG. Tasks with no dependencies are
    /// promoted straight to `ready`. Seeding is not a mutation of existing
    /// records and emits no events.
    pub async fn load_dag(&self, dag: &TaskDag) {
        let mut state = self.state.write().await;
        state.tasks.clear();
        for (id, task) in &dag.tasks {
            let mut record = TaskState::new(task.clone());
            if task.dependencies.is_empty() {
                record.status = TaskStatus::Ready;
            }
            state.tasks.insert(id.clone(), record);
        }
        state.dependencies = dag.dependencies.clone();
        state.dependents = dag.dependents.clone();
    }

    /// Transition a task, appending history and emitting one event per
    /// changed record. A transition to `failed` marks every not-yet-terminal
    /// transitive dependent `blocked` within the same locked section.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        agent: &str,
        note: Option<&str>,
    ) -> DomainResult<()> {
        let mut state = self.state.write().await;
        Self::apply_status(&mut state, task_id, status, agent, note)?;
        self.emit(
            BlackboardEventKind::TaskStatusChanged,
            agent,
            serde_json::json!({ "task_id": task_id, "status": status }),
        );

        if status == TaskStatus::Failed {
            let blocked = Self::cascade_blocked(&mut state, task_id, agent);
            for blocked_id in blocked {
                self.emit(
                    BlackboardEventKind::TaskStatusChanged,
                    agent,
                    serde_json::json!({
                        "task_id": blocked_id,
                        "status": TaskStatus::Blocked,
                        "caused_by": task_id,
                    }),
                );
            }
        }
        Ok(())
    }

    fn apply_status(
        state: &mut BlackboardState,
        task_id: &str,
        status: TaskStatus,
        agent: &str,
        note: Option<&str>,
    ) -> DomainResult<()> {
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()))?;

        if !record.status.can_transition_to(status) {
            return Err(DomainError::InvalidStatusTransition {
                task: task_id.to_string(),
                from: record.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        record.status = status;
        match status {
            TaskStatus::Running => {
                record.started_at.get_or_insert(now);
                if record.assigned_agent.is_none() {
                    record.assigned_agent = Some(agent.to_string());
                }
            }
            TaskStatus::Completed => {
                record.progress = 100;
                record.finished_at = Some(now);
            }
            TaskStatus::Failed => {
                record.finished_at = Some(now);
                record.error = note.map(str::to_string).or(record.error.take());
            }
            _ => {}
        }
        record.history.push(StatusChange {
            status,
            agent: agent.to_string(),
            note: note.map(str::to_string),
            at: now,
        });
        Ok(())
    }

    /// Mark every not-yet-terminal transitive dependent of `task_id` as
    /// blocked. Returns the ids actually transitioned.
    fn cascade_blocked(state: &mut BlackboardState, task_id: &str, agent: &str) -> Vec<String> {
        let mut queue: Vec<String> = state
            .dependents
            .get(task_id)
            .cloned()
            .unwrap_or_default();
        let mut blocked = vec![];

        while let Some(id) = queue.pop() {
            let Some(record) = state.tasks.get_mut(&id) else {
                continue;
            };
            if record.status.is_terminal() || record.status == TaskStatus::Running {
                // Running units finish on their own; terminal states stay put.
                continue;
            }
            record.status = TaskStatus::Blocked;
            record.history.push(StatusChange {
                status: TaskStatus::Blocked,
                agent: agent.to_string(),
                note: Some(format!("blocked by failed dependency '{}'", task_id)),
                at: Utc::now(),
            });
            if let Some(next) = state.dependents.get(&id) {
                queue.extend(next.iter().cloned());
            }
            blocked.push(id);
        }
        blocked.sort();
        blocked.dedup();
        blocked
    }

    /// Assign an agent to a task.
    pub async fn assign(&self, task_id: &str, agent: &str) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()))?;
        record.assigned_agent = Some(agent.to_string());
        self.emit(
            BlackboardEventKind::TaskStatusChanged,
            agent,
            serde_json::json!({ "task_id": task_id, "assigned": agent }),
        );
        Ok(())
    }

    /// Update progress, applying the auto-promotion rules:
    /// `pending -> running` at progress >= 1, `running -> completed` at 100.
    pub async fn update_progress(&self, task_id: &str, pct: u8, agent: &str) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()))?;

        let pct = pct.min(100);
        record.progress = pct;

        if pct >= 1 && record.status == TaskStatus::Pending {
            Self::apply_status(&mut state, task_id, TaskStatus::Running, agent, None)?;
        } else if pct == 100 && record.status == TaskStatus::Running {
            Self::apply_status(&mut state, task_id, TaskStatus::Completed, agent, None)?;
        }

        let status = state
            .tasks
            .get(task_id)
            .map(|r| r.status)
            .unwrap_or_default();
        self.emit(
            BlackboardEventKind::TaskStatusChanged,
            agent,
            serde_json::json!({ "task_id": task_id, "status": status, "progress": pct }),
        );
        Ok(())
    }

    /// Raise a blocking issue against a task.
    pub async fn add_blocking_issue(
        &self,
        task_id: &str,
        description: &str,
        agent: &str,
    ) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()))?;
        record.blocking_issues.push(BlockingIssue {
            description: description.to_string(),
            raised_by: agent.to_string(),
            raised_at: Utc::now(),
            resolved: false,
            resolved_by: None,
        });
        self.emit(
            BlackboardEventKind::TaskStatusChanged,
            agent,
            serde_json::json!({ "task_id": task_id, "blocking_issue": description }),
        );
        Ok(())
    }

    /// Resolve a blocking issue by index.
    pub async fn resolve_blocking_issue(
        &self,
        task_id: &str,
        index: usize,
        agent: &str,
    ) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()))?;
        let issue = record.blocking_issues.get_mut(index).ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "task '{}' has no blocking issue at index {}",
                task_id, index
            ))
        })?;
        issue.resolved = true;
        issue.resolved_by = Some(agent.to_string());
        self.emit(
            BlackboardEventKind::TaskStatusChanged,
            agent,
            serde_json::json!({ "task_id": task_id, "resolved_issue": index }),
        );
        Ok(())
    }

    /// Promote pending tasks whose dependencies are all completed to
    /// `ready`. Returns the promoted ids (sorted).
    pub async fn promote_ready(&self) -> Vec<String> {
        let mut state = self.state.write().await;
        let candidates: Vec<String> = state
            .tasks
            .iter()
            .filter(|(_, record)| record.status == TaskStatus::Pending)
            .filter(|(id, _)| {
                state
                    .dependencies
                    .get(*id)
                    .map(|deps| {
                        deps.iter().all(|dep| {
                            state
                                .tasks
                                .get(dep)
                                .is_some_and(|d| d.status == TaskStatus::Completed)
                        })
                    })
                    .unwrap_or(true)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &candidates {
            if Self::apply_status(&mut state, id, TaskStatus::Ready, "scheduler", None).is_ok() {
                self.emit(
                    BlackboardEventKind::TaskStatusChanged,
                    "scheduler",
                    serde_json::json!({ "task_id": id, "status": TaskStatus::Ready }),
                );
            }
        }
        candidates
    }

    /// Record an artifact id against the task that produced it.
    pub async fn attach_artifact(&self, task_id: &str, artifact_id: Uuid) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()))?;
        if !record.artifacts.contains(&artifact_id) {
            record.artifacts.push(artifact_id);
        }
        Ok(())
    }

    pub async fn task(&self, task_id: &str) -> Option<TaskState> {
        self.state.read().await.tasks.get(task_id).cloned()
    }

    pub async fn tasks(&self) -> Vec<TaskState> {
        self.state.read().await.tasks.values().cloned().collect()
    }

    /// Ids currently in the given status.
    pub async fn tasks_in_status(&self, status: TaskStatus) -> Vec<String> {
        self.state
            .read()
            .await
            .tasks
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(id, _)| id.clone())
            .collect()
    }

    // ========================================================================
    // Artifacts
    // ========================================================================

    /// Store a new artifact, validating the path-or-content invariant.
    pub async fn create_artifact(&self, artifact: Artifact) -> DomainResult<Uuid> {
        artifact.validate()?;
        let id = artifact.id;
        let created_by = artifact.created_by.clone();
        let name = artifact.name.clone();
        {
            let mut state = self.state.write().await;
            if let Some(record) = state.tasks.get_mut(&created_by) {
                if !record.artifacts.contains(&id) {
                    record.artifacts.push(id);
                }
            }
            state.artifacts.insert(id, artifact);
        }
        self.emit(
            BlackboardEventKind::ArtifactCreated,
            &created_by,
            serde_json::json!({ "artifact_id": id, "name": name }),
        );
        Ok(id)
    }

    /// Apply a delta to an artifact. Returns `false` when the id is unknown.
    /// Conflicting writes to the same id are last-writer-wins; every write
    /// emits its own `artifact-updated` event.
    pub async fn update_artifact(&self, id: Uuid, delta: ArtifactDelta, agent: &str) -> bool {
        let updated = {
            let mut state = self.state.write().await;
            match state.artifacts.get_mut(&id) {
                Some(artifact) => {
                    delta.apply(artifact);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.emit(
                BlackboardEventKind::ArtifactUpdated,
                agent,
                serde_json::json!({ "artifact_id": id }),
            );
        }
        updated
    }

    pub async fn artifact(&self, id: Uuid) -> Option<Artifact> {
        self.state.read().await.artifacts.get(&id).cloned()
    }

    /// Artifacts created by the given task.
    pub async fn artifacts_for_task(&self, task_id: &str) -> Vec<Artifact> {
        self.state
            .read()
            .await
            .artifacts
            .values()
            .filter(|a| a.created_by == task_id)
            .cloned()
            .collect()
    }

    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.state.read().await.artifacts.values().cloned().collect()
    }

    // ========================================================================
    // Notes
    // ========================================================================

    pub async fn create_note(&self, note: Note) -> Uuid {
        let id = note.id;
        let author = note.author.clone();
        let title = note.title.clone();
        self.state.write().await.notes.insert(id, note);
        self.emit(
            BlackboardEventKind::NoteCreated,
            &author,
            serde_json::json!({ "note_id": id, "title": title }),
        );
        id
    }

    pub async fn mark_note_read(&self, id: Uuid, agent: &str) -> DomainResult<()> {
        {
            let mut state = self.state.write().await;
            let note = state
                .notes
                .get_mut(&id)
                .ok_or(DomainError::NoteNotFound(id))?;
            note.mark_read(agent);
        }
        self.emit(
            BlackboardEventKind::NoteUpdated,
            agent,
            serde_json::json!({ "note_id": id, "read_by": agent }),
        );
        Ok(())
    }

    pub async fn acknowledge_note(
        &self,
        id: Uuid,
        agent: &str,
        response: Option<String>,
    ) -> DomainResult<()> {
        {
            let mut state = self.state.write().await;
            let note = state
                .notes
                .get_mut(&id)
                .ok_or(DomainError::NoteNotFound(id))?;
            note.acknowledge(agent, response);
        }
        self.emit(
            BlackboardEventKind::NoteUpdated,
            agent,
            serde_json::json!({ "note_id": id, "acked_by": agent }),
        );
        Ok(())
    }

    /// Notes addressed to the given agent (broadcasts included), newest
    /// first. `unread_only` filters out notes the agent has already read.
    pub async fn notes_for_agent(&self, agent: &str, unread_only: bool) -> Vec<Note> {
        let state = self.state.read().await;
        let mut notes: Vec<Note> = state
            .notes
            .values()
            .filter(|n| n.addressed_to(agent))
            .filter(|n| !unread_only || !n.is_read_by(agent))
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes
    }

    pub async fn note(&self, id: Uuid) -> Option<Note> {
        self.state.read().await.notes.get(&id).cloned()
    }

    pub async fn notes(&self) -> Vec<Note> {
        self.state.read().await.notes.values().cloned().collect()
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Search across all record kinds. Populated filters intersect.
    pub async fn search(&self, query: &BlackboardQuery) -> DomainResult<SearchResults> {
        let pattern = query
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| DomainError::ValidationFailed(format!("bad search pattern: {}", e)))?;

        let state = self.state.read().await;
        let mut results = SearchResults::default();

        for record in state.tasks.values() {
            if let Some(agent) = &query.assigned_agent {
                if record.assigned_agent.as_deref() != Some(agent.as_str()) {
                    continue;
                }
            }
            if let Some(min) = query.min_progress {
                if record.progress < min {
                    continue;
                }
            }
            if let Some(max) = query.max_progress {
                if record.progress > max {
                    continue;
                }
            }
            if let Some(wanted) = query.has_blocking_issues {
                if (record.open_issues() > 0) != wanted {
                    continue;
                }
            }
            if let Some(re) = &pattern {
                if !re.is_match(&record.task.title) && !re.is_match(&record.task.description) {
                    continue;
                }
            }
            results.tasks.push(record.clone());
        }

        for artifact in state.artifacts.values() {
            if let Some(kind) = query.artifact_kind {
                if artifact.kind != kind {
                    continue;
                }
            }
            if let Some(tag) = &query.tag {
                if !artifact.tags.contains(tag) {
                    continue;
                }
            }
            if let Some(author) = &query.author {
                if &artifact.created_by != author {
                    continue;
                }
            }
            if let Some(after) = query.created_after {
                if artifact.created_at < after {
                    continue;
                }
            }
            if let Some(before) = query.created_before {
                if artifact.created_at > before {
                    continue;
                }
            }
            if let Some(re) = &pattern {
                let content_match = artifact
                    .content
                    .as_deref()
                    .is_some_and(|c| re.is_match(c));
                if !re.is_match(&artifact.name) && !content_match {
                    continue;
                }
            }
            results.artifacts.push(artifact.clone());
        }

        for note in state.notes.values() {
            if let Some(author) = &query.author {
                if &note.author != author {
                    continue;
                }
            }
            if let Some(reader) = &query.read_by {
                if !note.is_read_by(reader) {
                    continue;
                }
            }
            if let Some(after) = query.created_after {
                if note.created_at < after {
                    continue;
                }
            }
            if let Some(before) = query.created_before {
                if note.created_at > before {
                    continue;
                }
            }
            if let Some(re) = &pattern {
                if !re.is_match(&note.title) && !re.is_match(&note.body) {
                    continue;
                }
            }
            results.notes.push(note.clone());
        }

        Ok(results)
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// Capture the queryable state as an opaque blob.
    pub async fn snapshot(&self) -> BlackboardSnapshot {
        BlackboardSnapshot {
            state: self.state.read().await.clone(),
            event_seq: self.event_seq.load(Ordering::SeqCst),
            taken_at: Utc::now(),
        }
    }

    /// Replace the current state with a snapshot. Live subscribers stay
    /// registered; previously delivered events are not replayed.
    pub async fn restore(&self, snapshot: BlackboardSnapshot) {
        *self.state.write().await = snapshot.state;
        self.event_seq.store(snapshot.event_seq, Ordering::SeqCst);
    }

    /// Drop all records.
    pub async fn clear(&self) {
        *self.state.write().await = BlackboardState::default();
    }
}

impl Default for Blackboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Strategy, Task};

    async fn board_with_chain() -> Blackboard {
        // a -> b -> c
        let dag = TaskDag::from_tasks(
            vec![
                Task::new("a", "A"),
                Task::new("b", "B").with_dependencies(vec!["a".to_string()]),
                Task::new("c", "C").with_dependencies(vec!["b".to_string()]),
            ],
            "query",
            Strategy::Generic,
        )
        .unwrap();
        let board = Blackboard::new();
        board.load_dag(&dag).await;
        board
    }

    #[tokio::test]
    async fn test_load_dag_promotes_roots() {
        let board = board_with_chain().await;
        assert_eq!(board.task("a").await.unwrap().status, TaskStatus::Ready);
        assert_eq!(board.task("b").await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_completion_sets_progress_and_times() {
        let board = board_with_chain().await;
        board
            .update_status("a", TaskStatus::Running, "agent", None)
            .await
            .unwrap();
        board
            .update_status("a", TaskStatus::Completed, "agent", None)
            .await
            .unwrap();

        let record = board.task("a").await.unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.progress, 100);
        assert!(record.finished_at.unwrap() >= record.started_at.unwrap());
        assert_eq!(record.history.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_transition_rejected_without_mutation() {
        let board = board_with_chain().await;
        let result = board
            .update_status("a", TaskStatus::Completed, "agent", None)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
        assert_eq!(board.task("a").await.unwrap().status, TaskStatus::Ready);
    }

    #[tokio::test]
    async fn test_failure_cascades_to_transitive_dependents() {
        let board = board_with_chain().await;
        board
            .update_status("a", TaskStatus::Running, "agent", None)
            .await
            .unwrap();
        board
            .update_status("a", TaskStatus::Failed, "agent", Some("boom"))
            .await
            .unwrap();

        assert_eq!(board.task("a").await.unwrap().status, TaskStatus::Failed);
        assert_eq!(board.task("a").await.unwrap().error.as_deref(), Some("boom"));
        assert_eq!(board.task("b").await.unwrap().status, TaskStatus::Blocked);
        assert_eq!(board.task("c").await.unwrap().status, TaskStatus::Blocked);
    }

    #[tokio::test]
    async fn test_promote_ready_after_dependency_completes() {
        let board = board_with_chain().await;
        board
            .update_status("a", TaskStatus::Running, "agent", None)
            .await
            .unwrap();
        board
            .update_status("a", TaskStatus::Completed, "agent", None)
            .await
            .unwrap();

        let promoted = board.promote_ready().await;
        assert_eq!(promoted, vec!["b"]);
        assert_eq!(board.task("b").await.unwrap().status, TaskStatus::Ready);
        assert_eq!(board.task("c").await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_progress_auto_rules() {
        let board = board_with_chain().await;
        // pending -> running at progress >= 1
        board.update_progress("b", 10, "agent").await.unwrap();
        assert_eq!(board.task("b").await.unwrap().status, TaskStatus::Running);

        // running -> completed at 100
        board.update_progress("b", 100, "agent").await.unwrap();
        let record = board.task("b").await.unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.progress, 100);
    }

    #[tokio::test]
    async fn test_every_write_emits_exactly_one_event_per_record() {
        let board = board_with_chain().await;
        let (_id, mut rx) = board.subscribe();

        board
            .update_status("a", TaskStatus::Running, "agent", None)
            .await
            .unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, BlackboardEventKind::TaskStatusChanged);
        assert!(rx.try_recv().is_err(), "exactly one event expected");

        // Failing `a` changes a, b, and c: three events.
        board
            .update_status("a", TaskStatus::Failed, "agent", None)
            .await
            .unwrap();
        let mut seen = 0;
        while rx.try_recv().is_ok() {
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_gets_nothing() {
        let board = board_with_chain().await;
        let (id, mut rx) = board.subscribe();
        board.unsubscribe(id);
        board
            .update_status("a", TaskStatus::Running, "agent", None)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_artifact_lifecycle() {
        let board = board_with_chain().await;
        let artifact = Artifact::new("schema", ArtifactKind::Schema, "a").with_content("CREATE");
        let id = board.create_artifact(artifact).await.unwrap();

        // Creation links the artifact to its task.
        assert_eq!(board.task("a").await.unwrap().artifacts, vec![id]);
        assert_eq!(board.artifacts_for_task("a").await.len(), 1);

        let updated = board
            .update_artifact(
                id,
                ArtifactDelta {
                    content: Some("CREATE TABLE".to_string()),
                    ..Default::default()
                },
                "b",
            )
            .await;
        assert!(updated);
        assert_eq!(
            board.artifact(id).await.unwrap().content.as_deref(),
            Some("CREATE TABLE")
        );

        assert!(!board.update_artifact(Uuid::new_v4(), ArtifactDelta::default(), "b").await);
    }

    #[tokio::test]
    async fn test_artifact_invariant_enforced() {
        let board = board_with_chain().await;
        let bare = Artifact::new("empty", ArtifactKind::Other, "a");
        assert!(board.create_artifact(bare).await.is_err());
    }

    #[tokio::test]
    async fn test_notes_for_agent_and_unread_filter() {
        let board = board_with_chain().await;
        let broadcast = Note::new("architect", "heads up", "schema changed");
        let targeted = Note::new("architect", "for backend", "check the index")
            .targeted_at(vec!["backend-dev".to_string()]);
        board.create_note(broadcast).await;
        let targeted_id = board.create_note(targeted).await;

        assert_eq!(board.notes_for_agent("backend-dev", false).await.len(), 2);
        assert_eq!(board.notes_for_agent("frontend-dev", false).await.len(), 1);

        board.mark_note_read(targeted_id, "backend-dev").await.unwrap();
        assert_eq!(board.notes_for_agent("backend-dev", true).await.len(), 1);
    }

    #[tokio::test]
    async fn test_search_intersection() {
        let board = board_with_chain().await;
        board
            .create_artifact(
                Artifact::new("api-spec", ArtifactKind::Document, "a")
                    .with_content("openapi")
                    .with_tags(vec!["api".to_string()]),
            )
            .await
            .unwrap();
        board
            .create_artifact(
                Artifact::new("report", ArtifactKind::Report, "a").with_content("findings"),
            )
            .await
            .unwrap();

        let query = BlackboardQuery {
            artifact_kind: Some(ArtifactKind::Document),
            tag: Some("api".to_string()),
            pattern: Some("^api".to_string()),
            ..Default::default()
        };
        let results = board.search(&query).await.unwrap();
        assert_eq!(results.artifacts.len(), 1);
        assert_eq!(results.artifacts[0].name, "api-spec");
    }

    #[tokio::test]
    async fn test_search_rejects_bad_regex() {
        let board = board_with_chain().await;
        let query = BlackboardQuery {
            pattern: Some("([unclosed".to_string()),
            ..Default::default()
        };
        assert!(board.search(&query).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let board = board_with_chain().await;
        board
            .update_status("a", TaskStatus::Running, "agent", None)
            .await
            .unwrap();
        board
            .create_artifact(Artifact::new("x", ArtifactKind::Data, "a").with_content("1"))
            .await
            .unwrap();
        board.create_note(Note::new("a", "t", "b")).await;

        let snapshot = board.snapshot().await;
        board.clear().await;
        assert!(board.tasks().await.is_empty());

        board.restore(snapshot).await;
        assert_eq!(board.tasks().await.len(), 3);
        assert_eq!(board.artifacts().await.len(), 1);
        assert_eq!(board.notes().await.len(), 1);
        assert_eq!(board.task("a").await.unwrap().status, TaskStatus::Running);
    }
}
