//! Scheduler & parallel executor service.
//!
//! Walks a task DAG through the blackboard, dispatching ready tasks to
//! agents with bounded concurrency. Larger-effort tasks are admitted first
//! (ties broken by id). Transient provider errors retry with jittered
//! exponential backoff and a guardrail message per attempt; exhausted
//! retries fall back through the content router's secondary model chain.
//! Tool calls reported by a unit, and the unit's own completion, feed the
//! guardrail manager's post-call rules; the buffered messages are injected
//! into the next dispatched unit's prompt. Cancellation stops admission,
//! signals in-flight units, waits a bounded grace window, then aborts
//! whatever is left.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentDescriptor, Artifact, ArtifactKind, GenerationRequest, Note, NoteCategory, NotePriority,
    Task, TaskDag, TaskStatus,
};
use crate::infrastructure::providers::RetryPolicy;
use crate::services::agent_registry::AgentRegistry;
use crate::services::agent_router::AgentRouter;
use crate::services::blackboard::Blackboard;
use crate::services::content_router::ContentRouter;
use crate::services::guardrails::{GuardrailManager, ToolOutcome};

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrency cap. Unset means min(task count, CPU count x 2).
    pub max_concurrency: Option<usize>,
    /// Per-task timeout. `None` = unbounded.
    pub per_task_timeout: Option<Duration>,
    /// Overall deadline for one `execute` call. `None` = unbounded.
    pub session_deadline: Option<Duration>,
    pub max_retries: u32,
    pub backoff: RetryPolicy,
    /// Grace window between cancellation and forced abort.
    pub grace_period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            per_task_timeout: Some(Duration::from_secs(600)),
            session_deadline: Some(Duration::from_secs(1800)),
            max_retries: 3,
            backoff: RetryPolicy::default(),
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Result summary of one scheduler run.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub blocked: Vec<String>,
    /// Artifacts committed during the run.
    pub artifacts: Vec<Uuid>,
    pub duration_ms: u64,
    pub critical_path: Vec<String>,
    /// Whether the run ended through the cancellation signal or deadline.
    pub cancelled: bool,
}

impl ScheduleReport {
    pub fn all_completed(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty() && !self.cancelled
    }
}

/// Outcome of one execution unit.
#[derive(Debug)]
struct UnitOutcome {
    task_id: String,
    agent: String,
    artifacts: Vec<Uuid>,
    error: Option<String>,
}

/// The DAG scheduler.
pub struct Scheduler {
    registry: Arc<AgentRegistry>,
    blackboard: Arc<Blackboard>,
    content_router: Arc<ContentRouter>,
    guardrails: Arc<GuardrailManager>,
    agent_router: AgentRouter,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        registry: Arc<AgentRegistry>,
        blackboard: Arc<Blackboard>,
        content_router: Arc<ContentRouter>,
        guardrails: Arc<GuardrailManager>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            blackboard,
            content_router,
            guardrails,
            agent_router: AgentRouter::new(),
            config,
        }
    }

    /// Execute a DAG to completion (or cancellation). The blackboard is
    /// seeded from the DAG; progress, artifacts, and failures all land
    /// there as the run advances.
    pub async fn execute(
        &self,
        dag: &TaskDag,
        cancel: CancellationToken,
    ) -> DomainResult<ScheduleReport> {
        let started = std::time::Instant::now();
        self.blackboard.load_dag(dag).await;

        let total = dag.tasks.len();
        let cap = self.config.max_concurrency.unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4);
            total.min(cpus * 2).max(1)
        });
        let deadline = self.config.session_deadline.map(|d| Instant::now() + d);

        tracing::info!(
            tasks = total,
            concurrency = cap,
            query = %dag.original_query,
            "Scheduler starting"
        );

        let unit_cancel = cancel.child_token();
        let mut join_set: JoinSet<UnitOutcome> = JoinSet::new();
        let mut in_flight: HashSet<String> = HashSet::new();
        // Maps spawned unit ids to task ids so panicked units can still be
        // attributed and failed.
        let mut unit_ids: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut cancelled = false;

        let deadline_fut = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline_fut);

        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.blackboard.promote_ready().await;

            // Admit ready tasks: larger effort first, ties by id.
            let mut ready: Vec<(String, u32)> = self
                .blackboard
                .tasks()
                .await
                .into_iter()
                .filter(|s| s.status == TaskStatus::Ready && !in_flight.contains(&s.task.id))
                .map(|s| (s.task.id.clone(), s.task.effort))
                .collect();
            ready.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            for (task_id, _) in ready {
                if in_flight.len() >= cap {
                    break;
                }
                let Some(task) = dag.tasks.get(&task_id).cloned() else {
                    continue;
                };
                let selection = self.agent_router.resolve(
                    &task,
                    &dag.original_query,
                    &self.registry.list(),
                    &self.registry.default_agent(),
                );
                tracing::debug!(
                    task = %task_id,
                    agent = %selection.agent.name,
                    reason = %selection.reason,
                    "Dispatching task"
                );

                self.blackboard.assign(&task_id, &selection.agent.name).await?;
                self.blackboard
                    .update_status(&task_id, TaskStatus::Running, &selection.agent.name, None)
                    .await?;

                in_flight.insert(task_id.clone());
                let unit_id =
                    self.spawn_unit(&mut join_set, task, selection.agent, unit_cancel.child_token());
                unit_ids.insert(unit_id, task_id);
            }

            // Terminal check: nothing running and nothing left to admit.
            if join_set.is_empty() {
                let states = self.blackboard.tasks().await;
                if states.iter().all(|s| s.status.is_terminal()) {
                    break;
                }
                let ready_or_pending = states
                    .iter()
                    .any(|s| matches!(s.status, TaskStatus::Ready | TaskStatus::Pending));
                if !ready_or_pending {
                    break;
                }
                // Pending tasks remain but none became ready and nothing is
                // running: their dependency subtrees are dead. Mark them
                // blocked so the run terminates with a total partition.
                let stuck: Vec<String> = states
                    .iter()
                    .filter(|s| !s.status.is_terminal())
                    .map(|s| s.task.id.clone())
                    .collect();
                let promoted = self.blackboard.promote_ready().await;
                if promoted.is_empty() {
                    for id in stuck {
                        let _ = self
                            .blackboard
                            .update_status(&id, TaskStatus::Blocked, "scheduler", Some("unreachable"))
                            .await;
                    }
                    break;
                }
                continue;
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                () = &mut deadline_fut => {
                    tracing::warn!("Session deadline exceeded; cancelling remaining work");
                    cancelled = true;
                    break;
                }
                joined = join_set.join_next_with_id() => {
                    if let Some(joined) = joined {
                        self.apply_outcome(joined, &mut unit_ids, &mut in_flight).await;
                    }
                }
            }
        }

        if cancelled {
            self.shut_down(join_set, &mut unit_ids, &mut in_flight, unit_cancel)
                .await;
        }

        let report = self.build_report(dag, started, cancelled).await?;
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            duration_ms = report.duration_ms,
            cancelled = report.cancelled,
            "Scheduler finished"
        );
        Ok(report)
    }

    fn spawn_unit(
        &self,
        join_set: &mut JoinSet<UnitOutcome>,
        task: Task,
        agent: AgentDescriptor,
        cancel: CancellationToken,
    ) -> tokio::task::Id {
        let blackboard = Arc::clone(&self.blackboard);
        let content_router = Arc::clone(&self.content_router);
        let guardrails = Arc::clone(&self.guardrails);
        let max_retries = self.config.max_retries;
        let backoff = self.config.backoff.clone();
        let per_task_timeout = self.config.per_task_timeout;

        let handle = join_set.spawn(async move {
            let task_id = task.id.clone();
            let agent_name = agent.name.clone();
            let unit = run_unit(
                task,
                agent,
                blackboard,
                content_router,
                guardrails,
                max_retries,
                backoff,
                cancel,
            );

            let result = match per_task_timeout {
                Some(limit) => tokio::time::timeout(limit, unit)
                    .await
                    .unwrap_or_else(|_| Err("timeout".to_string())),
                None => unit.await,
            };

            match result {
                Ok(artifacts) => UnitOutcome {
                    task_id,
                    agent: agent_name,
                    artifacts,
                    error: None,
                },
                Err(error) => UnitOutcome {
                    task_id,
                    agent: agent_name,
                    artifacts: vec![],
                    error: Some(error),
                },
            }
        });
        handle.id()
    }

    /// Apply one joined unit outcome to the blackboard.
    async fn apply_outcome(
        &self,
        joined: Result<(tokio::task::Id, UnitOutcome), tokio::task::JoinError>,
        unit_ids: &mut HashMap<tokio::task::Id, String>,
        in_flight: &mut HashSet<String>,
    ) {
        match joined {
            Ok((unit_id, outcome)) => {
                unit_ids.remove(&unit_id);
                in_flight.remove(&outcome.task_id);
                match outcome.error {
                    None => {
                        let _ = self
                            .blackboard
                            .update_status(
                                &outcome.task_id,
                                TaskStatus::Completed,
                                &outcome.agent,
                                None,
                            )
                            .await;
                    }
                    Some(reason) => {
                        self.record_failure(&outcome.task_id, &outcome.agent, &reason).await;
                    }
                }
            }
            Err(join_error) => {
                let unit_id = join_error.id();
                if let Some(task_id) = unit_ids.remove(&unit_id) {
                    in_flight.remove(&task_id);
                    let reason = if join_error.is_cancelled() {
                        "cancelled".to_string()
                    } else {
                        format!("execution unit crashed: {}", join_error)
                    };
                    self.record_failure(&task_id, "scheduler", &reason).await;
                } else {
                    tracing::error!(error = %join_error, "Execution unit crashed");
                }
            }
        }
    }

    /// Mark a task failed (cascading blocks) and leave an error note for
    /// the final summary.
    async fn record_failure(&self, task_id: &str, agent: &str, reason: &str) {
        tracing::warn!(task = %task_id, agent = %agent, reason = %reason, "Task failed");
        let _ = self
            .blackboard
            .update_status(task_id, TaskStatus::Failed, agent, Some(reason))
            .await;
        self.blackboard
            .create_note(
                Note::new(
                    "scheduler",
                    format!("Task '{}' failed", task_id),
                    reason.to_string(),
                )
                .with_category(NoteCategory::Error)
                .with_priority(NotePriority::High),
            )
            .await;
    }

    /// Cancellation path: stop admitting, signal units, wait the grace
    /// window, then abort what is left and mark it failed.
    async fn shut_down(
        &self,
        mut join_set: JoinSet<UnitOutcome>,
        unit_ids: &mut HashMap<tokio::task::Id, String>,
        in_flight: &mut HashSet<String>,
        unit_cancel: CancellationToken,
    ) {
        unit_cancel.cancel();

        let grace = tokio::time::sleep(self.config.grace_period);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                () = &mut grace => break,
                joined = join_set.join_next_with_id() => match joined {
                    Some(joined) => self.apply_outcome(joined, unit_ids, in_flight).await,
                    None => break,
                },
            }
        }

        join_set.abort_all();
        while let Some(joined) = join_set.join_next_with_id().await {
            self.apply_outcome(joined, unit_ids, in_flight).await;
        }

        // Units aborted before returning an outcome, plus work never
        // started, are all failed(cancelled).
        for task_id in in_flight.drain() {
            self.record_failure(&task_id, "scheduler", "cancelled").await;
        }
        for state in self.blackboard.tasks().await {
            if !state.status.is_terminal() {
                self.record_failure(&state.task.id, "scheduler", "cancelled").await;
            }
        }
    }

    async fn build_report(
        &self,
        dag: &TaskDag,
        started: std::time::Instant,
        cancelled: bool,
    ) -> DomainResult<ScheduleReport> {
        let mut report = ScheduleReport {
            duration_ms: started.elapsed().as_millis() as u64,
            critical_path: dag.critical_path()?,
            cancelled,
            ..Default::default()
        };
        for state in self.blackboard.tasks().await {
            match state.status {
                TaskStatus::Completed => report.completed.push(state.task.id.clone()),
                TaskStatus::Failed => report.failed.push(state.task.id.clone()),
                TaskStatus::Blocked => report.blocked.push(state.task.id.clone()),
                other => {
                    return Err(DomainError::ExecutionFailed(format!(
                        "task '{}' ended in non-terminal status '{}'",
                        state.task.id, other
                    )))
                }
            }
            report.artifacts.extend(state.artifacts.iter().copied());
        }
        report.completed.sort();
        report.failed.sort();
        report.blocked.sort();
        Ok(report)
    }
}

/// One task's execution: compose the prompt, call the model with retries
/// and fallback, parse the reply, and commit artifacts and notes.
#[allow(clippy::too_many_arguments)]
async fn run_unit(
    task: Task,
    agent: AgentDescriptor,
    blackboard: Arc<Blackboard>,
    content_router: Arc<ContentRouter>,
    guardrails: Arc<GuardrailManager>,
    max_retries: u32,
    backoff_policy: RetryPolicy,
    cancel: CancellationToken,
) -> Result<Vec<Uuid>, String> {
    let request = compose_request(&task, &agent, &blackboard, &guardrails).await;

    let mut backoff_source = backoff_policy.backoff_source();
    let mut attempt = 0u32;

    let response = loop {
        if cancel.is_cancelled() {
            return Err("cancelled".to_string());
        }

        let result = tokio::select! {
            () = cancel.cancelled() => return Err("cancelled".to_string()),
            result = content_router.generate(&request) => result,
        };

        match result {
            Ok(response) => break response,
            Err(error) if error.is_transient() && attempt < max_retries => {
                attempt += 1;
                guardrails.retry_guardrail(attempt, max_retries);
                let wait = backoff_source
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_millis(backoff_policy.cap_ms));
                tracing::warn!(
                    task = %task.id,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %error,
                    "Transient provider error; backing off"
                );
                tokio::select! {
                    () = cancel.cancelled() => return Err("cancelled".to_string()),
                    () = tokio::time::sleep(wait) => {}
                }
            }
            Err(error) if error.is_transient() => {
                // Retries exhausted: one pass through the fallback chain.
                guardrails.retry_guardrail(max_retries + 1, max_retries);
                tracing::warn!(task = %task.id, "Retries exhausted; trying fallback models");
                let fallback = tokio::select! {
                    () = cancel.cancelled() => return Err("cancelled".to_string()),
                    result = content_router.generate_with_fallback(&request) => result,
                };
                match fallback {
                    Ok(response) => break response,
                    Err(fallback_error) => {
                        return Err(format!(
                            "provider error after retries and fallback: {}",
                            fallback_error
                        ))
                    }
                }
            }
            Err(error) => return Err(format!("provider error: {}", error)),
        }
    };

    let artifacts = commit_reply(&task, &agent, &blackboard, &guardrails, &response.text).await?;

    // The unit itself is a sub-agent call; debugger/planner agents carry
    // follow-up guardrails for the next dispatched unit.
    guardrails.after_subagent(&agent.name);

    Ok(artifacts)
}

/// Compose the model request: agent system prompt, task description,
/// upstream artifacts, unread notes, and pending guardrail messages.
async fn compose_request(
    task: &Task,
    agent: &AgentDescriptor,
    blackboard: &Blackboard,
    guardrails: &GuardrailManager,
) -> GenerationRequest {
    let mut prompt = format!("## Task: {}\n\n{}\n", task.title, task.description);

    if !task.expected_outputs.is_empty() {
        prompt.push_str("\nExpected outputs: ");
        prompt.push_str(&task.expected_outputs.join(", "));
        prompt.push('\n');
    }

    let mut upstream = String::new();
    for dep in &task.dependencies {
        for artifact in blackboard.artifacts_for_task(dep).await {
            upstream.push_str(&format!(
                "### {} (from {})\n",
                artifact.name, artifact.created_by
            ));
            if let Some(summary) = &artifact.summary {
                upstream.push_str(summary);
                upstream.push('\n');
            } else if let Some(content) = &artifact.content {
                let clipped: String = content.chars().take(2000).collect();
                upstream.push_str(&clipped);
                upstream.push('\n');
            } else if let Some(path) = &artifact.path {
                upstream.push_str(&format!("(stored at {})\n", path));
            }
        }
    }
    if !upstream.is_empty() {
        prompt.push_str("\n## Upstream artifacts\n\n");
        prompt.push_str(&upstream);
    }

    let notes = blackboard.notes_for_agent(&agent.name, true).await;
    if !notes.is_empty() {
        prompt.push_str("\n## Notes from other agents\n\n");
        for note in &notes {
            prompt.push_str(&format!("- [{}] {}: {}\n", note.author, note.title, note.body));
            let _ = blackboard.mark_note_read(note.id, &agent.name).await;
        }
    }

    let pending = guardrails.drain_pending();
    if !pending.is_empty() {
        prompt.push_str("\n## Control messages\n\n");
        for message in &pending {
            prompt.push_str(&format!("- {}\n", message.body));
        }
    }

    prompt.push_str(
        "\nReport your results as a fenced json block with \"artifacts\", \"notes\", \
         \"tool_calls\", and \"done\" fields.\n",
    );

    GenerationRequest {
        parts: vec![crate::domain::models::RequestPart::Text { text: prompt }],
        system: Some(agent.system_prompt.clone()),
        model: agent.model.clone(),
        temperature: Some(agent.temperature),
        max_tokens: Some(agent.max_tokens),
        active_tools: agent.tools.clone(),
    }
}

/// Parse a unit's reply, commit artifacts/notes to the blackboard, and run
/// each reported tool call through the post-call guardrails. Returns the
/// committed artifact ids.
async fn commit_reply(
    task: &Task,
    agent: &AgentDescriptor,
    blackboard: &Blackboard,
    guardrails: &GuardrailManager,
    reply_text: &str,
) -> Result<Vec<Uuid>, String> {
    let reply = parse_agent_reply(reply_text);
    let mut ids = vec![];

    match reply {
        Some(parsed) => {
            for call in &parsed.tool_calls {
                guardrails.after_tool(
                    &call.tool,
                    &ToolOutcome {
                        output: call.output.clone(),
                        exit_code: call.exit_code,
                    },
                );
            }
            for spec in parsed.artifacts {
                let mut artifact = Artifact::new(spec.name, spec.kind, &task.id);
                if let Some(content) = spec.content {
                    artifact = artifact.with_content(content);
                }
                if let Some(path) = spec.path {
                    artifact = artifact.with_path(path);
                }
                if let Some(summary) = spec.summary {
                    artifact = artifact.with_summary(summary);
                }
                artifact = artifact.with_tags(spec.tags);
                match blackboard.create_artifact(artifact).await {
                    Ok(id) => ids.push(id),
                    Err(e) => tracing::warn!(task = %task.id, error = %e, "Dropped invalid artifact"),
                }
            }
            for spec in parsed.notes {
                let mut note = Note::new(&agent.name, spec.title, spec.body)
                    .with_priority(spec.priority)
                    .with_category(spec.category);
                note.related_tasks.push(task.id.clone());
                note.target_agents = spec.target_agents;
                blackboard.create_note(note).await;
            }
        }
        None => {
            // No structured block: the whole reply becomes one document.
            let artifact = Artifact::new(
                format!("{}-output", task.id),
                ArtifactKind::Document,
                &task.id,
            )
            .with_content(reply_text.to_string());
            let id = blackboard
                .create_artifact(artifact)
                .await
                .map_err(|e| e.to_string())?;
            ids.push(id);
        }
    }

    Ok(ids)
}

/// Structured agent reply, parsed from a fenced json block.
#[derive(Debug, serde::Deserialize)]
struct AgentReply {
    #[serde(default)]
    artifacts: Vec<ArtifactSpec>,
    #[serde(default)]
    notes: Vec<NoteSpec>,
    /// Tool invocations the agent reports having made, in call order.
    #[serde(default)]
    tool_calls: Vec<ToolCallSpec>,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

#[derive(Debug, serde::Deserialize)]
struct ToolCallSpec {
    tool: String,
    #[serde(default)]
    output: String,
    #[serde(default)]
    exit_code: Option<i32>,
}

#[derive(Debug, serde::Deserialize)]
struct ArtifactSpec {
    name: String,
    #[serde(default)]
    kind: ArtifactKind,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct NoteSpec {
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    priority: NotePriority,
    #[serde(default)]
    category: NoteCategory,
    #[serde(default)]
    target_agents: Vec<String>,
}

/// Extract and parse the first fenced ```json block, falling back to the
/// whole text when it parses as a reply object.
fn parse_agent_reply(text: &str) -> Option<AgentReply> {
    let fenced = text.split("```json").nth(1).and_then(|rest| rest.split("```").next());
    if let Some(block) = fenced {
        if let Ok(reply) = serde_json::from_str::<AgentReply>(block.trim()) {
            return Some(reply);
        }
    }
    serde_json::from_str::<AgentReply>(text.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_reply() {
        let text = r#"Work is done.

```json
{
  "artifacts": [{ "name": "schema", "kind": "schema", "content": "CREATE TABLE t;" }],
  "notes": [{ "title": "fyi", "body": "used uuid keys" }],
  "done": true
}
```
"#;
        let reply = parse_agent_reply(text).unwrap();
        assert_eq!(reply.artifacts.len(), 1);
        assert_eq!(reply.artifacts[0].name, "schema");
        assert_eq!(reply.notes.len(), 1);
        assert!(reply.done);
    }

    #[test]
    fn test_parse_reply_with_tool_calls() {
        let text = r#"```json
{
  "artifacts": [],
  "tool_calls": [
    { "tool": "edit", "output": "patched src/lib.rs" },
    { "tool": "shell", "exit_code": 2, "output": "2 tests failed" }
  ],
  "done": false
}
```"#;
        let reply = parse_agent_reply(text).unwrap();
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].tool, "edit");
        assert_eq!(reply.tool_calls[1].exit_code, Some(2));
    }

    #[test]
    fn test_parse_bare_json_reply() {
        let text = r#"{ "artifacts": [], "notes": [], "done": true }"#;
        assert!(parse_agent_reply(text).is_some());
    }

    #[test]
    fn test_parse_prose_reply_is_none() {
        assert!(parse_agent_reply("I finished the task, all good.").is_none());
    }

    #[test]
    fn test_report_all_completed() {
        let report = ScheduleReport {
            completed: vec!["a".to_string()],
            ..Default::default()
        };
        assert!(report.all_completed());

        let failed = ScheduleReport {
            completed: vec!["a".to_string()],
            failed: vec!["b".to_string()],
            ..Default::default()
        };
        assert!(!failed.all_completed());

        let cancelled = ScheduleReport {
            cancelled: true,
            ..Default::default()
        };
        assert!(!cancelled.all_completed());
    }

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert_eq!(config.backoff.base_ms, 500);
    }
}
