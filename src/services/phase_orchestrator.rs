//! Phase orchestrator service.
//!
//! Drives a session through the four-phase state machine
//! (metadata -> pareto -> strategic -> execution), enforcing each phase's
//! output contract. The orchestrator is deterministic: it invokes the model
//! only at the Pareto and Strategic decision points and hands the Execution
//! phase to the scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    GenerationRequest, ParetoEntry, Phase, Strategy, Task, TaskDag,
};
use crate::services::agent_registry::AgentRegistry;
use crate::services::blackboard::Blackboard;
use crate::services::content_router::ContentRouter;
use crate::services::guardrails::GuardrailManager;
use crate::services::scheduler::{ScheduleReport, Scheduler, SchedulerConfig};
use crate::services::task_planner::{PlannerPreferences, TaskPlanner};

/// Terminal outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    TaskComplete,
    Blocked,
    Failed,
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskComplete => "TASK COMPLETE",
            Self::Blocked => "BLOCKED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Facts the completion predicate inspects after the execution phase.
#[derive(Debug, Clone, Default)]
pub struct SessionOutput {
    /// Whether testing-category tasks all completed; `None` when the plan
    /// carried no testing tasks.
    pub tests_passed: Option<bool>,
    /// Work that never completed (blocked tasks).
    pub todo_items: Vec<String>,
    /// Failed tasks and open blocking issues.
    pub blockers: Vec<String>,
}

/// User-overridable completion decision. Returning `None` defers to the
/// schedule report.
pub type CompletionPredicate = Arc<dyn Fn(&SessionOutput) -> Option<SessionOutcome> + Send + Sync>;

/// The default predicate: complete when tests passed with nothing left on
/// the todo list; blocked when blockers exist; otherwise undecided.
pub fn default_completion_predicate(output: &SessionOutput) -> Option<SessionOutcome> {
    if output.tests_passed == Some(true) && output.todo_items.is_empty() {
        Some(SessionOutcome::TaskComplete)
    } else if !output.blockers.is_empty() {
        Some(SessionOutcome::Blocked)
    } else {
        None
    }
}

/// Result of a full session.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub task_id: String,
    pub outcome: SessionOutcome,
    pub pareto: Vec<ParetoEntry>,
    pub plan: Option<String>,
    pub report: Option<ScheduleReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct PhaseOrchestratorConfig {
    pub scheduler: SchedulerConfig,
    pub preferences: PlannerPreferences,
    /// Optional project context injected into planning and phase prompts.
    pub project_context: Option<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    task_id: Option<String>,
    query: Option<String>,
    started_at: Option<DateTime<Utc>>,
    pareto: Vec<ParetoEntry>,
    plan: Option<String>,
}

/// Drives the metadata -> pareto -> strategic -> execution state machine.
pub struct PhaseOrchestrator {
    planner: TaskPlanner,
    registry: Arc<AgentRegistry>,
    blackboard: Arc<Blackboard>,
    content_router: Arc<ContentRouter>,
    guardrails: Arc<GuardrailManager>,
    config: PhaseOrchestratorConfig,
    completion: CompletionPredicate,
    state: Mutex<SessionState>,
}

impl PhaseOrchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        blackboard: Arc<Blackboard>,
        content_router: Arc<ContentRouter>,
        guardrails: Arc<GuardrailManager>,
        config: PhaseOrchestratorConfig,
    ) -> Self {
        Self {
            planner: TaskPlanner::new(),
            registry,
            blackboard,
            content_router,
            guardrails,
            config,
            completion: Arc::new(default_completion_predicate),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Override the completion predicate.
    pub fn with_completion_predicate(mut self, predicate: CompletionPredicate) -> Self {
        self.completion = predicate;
        self
    }

    /// Current phase, if the session has started.
    pub fn current_phase(&self) -> Option<Phase> {
        self.guardrails.current_phase()
    }

    /// Metadata phase: record identity and start time. Never calls the
    /// model. The task id defaults to `task-<epoch-ms>` when the caller
    /// does not supply one.
    pub async fn initialize_metadata(
        &self,
        query: &str,
        task_id: Option<String>,
    ) -> DomainResult<String> {
        self.guardrails.transition(Phase::Metadata)?;
        let task_id = task_id.unwrap_or_else(|| format!("task-{}", Utc::now().timestamp_millis()));

        let mut state = self.state.lock().await;
        state.task_id = Some(task_id.clone());
        state.query = Some(query.to_string());
        state.started_at = Some(Utc::now());
        tracing::info!(task_id = %task_id, "Session initialized");
        Ok(task_id)
    }

    /// Pareto phase: one deterministic model call producing the ranked
    /// high-impact file list. An invalid output triggers one guardrail-led
    /// re-call; a second failure fails the session.
    pub async fn execute_pareto(&self) -> DomainResult<Vec<ParetoEntry>> {
        self.guardrails.transition(Phase::Pareto)?;
        let query = self.query().await?;

        // Consume the buffered pre-phase message into this call's prompt.
        let instruction = drain_bodies(&self.guardrails);
        let mut prompt = format!("{}\n\nUser request: {}\n", instruction, query);
        if let Some(context) = &self.config.project_context {
            prompt.push_str("\nProject context:\n");
            prompt.push_str(context);
        }

        let entries = self
            .call_with_validation_retry(&prompt, 0.0, |value| {
                self.guardrails.validate_pareto(value)
            })
            .await?;

        self.state.lock().await.pareto = entries.clone();
        Ok(entries)
    }

    /// Strategic phase: one low-temperature model call producing the
    /// sentinel-terminated plan, with the same one-retry policy.
    pub async fn execute_strategic(&self) -> DomainResult<String> {
        self.guardrails.transition(Phase::Strategic)?;
        let query = self.query().await?;

        let instruction = drain_bodies(&self.guardrails);
        let pareto = self.state.lock().await.pareto.clone();
        let mut prompt = format!(
            "{}\n\nUser request: {}\n\nRespond as a JSON object with \"plan\" and \
             \"proceed\" fields.\n",
            instruction, query
        );
        if !pareto.is_empty() {
            prompt.push_str("\nHighest-impact files:\n");
            for entry in &pareto {
                prompt.push_str(&format!("- {}: {}\n", entry.path, entry.reason));
            }
        }

        let plan = self
            .call_with_validation_retry(&prompt, 0.2, |value| {
                self.guardrails.validate_strategic(value)
            })
            .await?;

        self.state.lock().await.plan = Some(plan.clone());
        Ok(plan)
    }

    /// Execution phase: decompose the query into a DAG and hand off to the
    /// scheduler, then decide the outcome through the completion predicate.
    pub async fn execute_execution(&self, cancel: CancellationToken) -> DomainResult<SessionResult> {
        self.guardrails.transition(Phase::Execution)?;
        let query = self.query().await?;

        let decomposition = self.planner.decompose(
            &query,
            &self.registry.list(),
            self.config.project_context.as_deref(),
            &self.config.preferences,
        )?;
        tracing::info!(
            tasks = decomposition.dag.tasks.len(),
            strategy = %decomposition.dag.strategy,
            confidence = decomposition.confidence,
            "Execution phase planned: {}",
            decomposition.reasoning
        );

        self.run_dag(&decomposition.dag, cancel).await
    }

    /// Full session: metadata, pareto, strategic, then execution. Phase
    /// output rejections and cancellation map to terminal outcomes rather
    /// than errors.
    pub async fn run(
        &self,
        query: &str,
        task_id: Option<String>,
        cancel: CancellationToken,
    ) -> DomainResult<SessionResult> {
        let task_id = self.initialize_metadata(query, task_id).await?;

        if let Err(error) = self.execute_pareto().await {
            return Ok(self.failed_result(&task_id, error).await);
        }
        if cancel.is_cancelled() {
            return Ok(self.cancelled_result(&task_id).await);
        }
        if let Err(error) = self.execute_strategic().await {
            return Ok(self.failed_result(&task_id, error).await);
        }
        if cancel.is_cancelled() {
            return Ok(self.cancelled_result(&task_id).await);
        }
        self.execute_execution(cancel).await
    }

    /// Single-agent session: bypass the planner and phases entirely and
    /// run one task pinned to the named agent.
    pub async fn run_with_agent(
        &self,
        agent_name: &str,
        query: &str,
        cancel: CancellationToken,
    ) -> DomainResult<SessionResult> {
        let agent = self.registry.get(agent_name)?;
        {
            let mut state = self.state.lock().await;
            state.task_id = Some(format!("use-{}", agent.name));
            state.query = Some(query.to_string());
            state.started_at = Some(Utc::now());
        }

        let task = Task::new("direct-task", format!("Direct request for {}", agent.name))
            .with_description(query.to_string())
            .with_effort(5)
            .with_category("direct")
            .with_outputs(vec!["result".to_string()]);
        // The explicit-invocation query form pins the router to this agent.
        let pinned_query = format!("use {}: \"{}\"", agent.name, query.replace('"', "'"));
        let dag = TaskDag::from_tasks(vec![task], pinned_query, Strategy::Generic)?;

        self.run_dag(&dag, cancel).await
    }

    async fn run_dag(
        &self,
        dag: &TaskDag,
        cancel: CancellationToken,
    ) -> DomainResult<SessionResult> {
        let scheduler = Scheduler::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.blackboard),
            Arc::clone(&self.content_router),
            Arc::clone(&self.guardrails),
            self.config.scheduler.clone(),
        );
        let report = scheduler.execute(dag, cancel).await?;

        let output = self.session_output(dag, &report).await;
        let outcome = if report.cancelled {
            SessionOutcome::Cancelled
        } else {
            (self.completion)(&output).unwrap_or_else(|| {
                if report.all_completed() {
                    SessionOutcome::TaskComplete
                } else {
                    SessionOutcome::Blocked
                }
            })
        };

        let state = self.state.lock().await;
        Ok(SessionResult {
            task_id: state.task_id.clone().unwrap_or_default(),
            outcome,
            pareto: state.pareto.clone(),
            plan: state.plan.clone(),
            report: Some(report),
            started_at: state.started_at.unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
            error: None,
        })
    }

    /// Derive the predicate's input from the schedule report and the
    /// blackboard.
    async fn session_output(&self, dag: &TaskDag, report: &ScheduleReport) -> SessionOutput {
        let testing_tasks: Vec<&String> = dag
            .tasks
            .values()
            .filter(|t| t.category == "testing")
            .map(|t| &t.id)
            .collect();
        let tests_passed = if testing_tasks.is_empty() {
            None
        } else {
            Some(testing_tasks.iter().all(|id| report.completed.contains(id)))
        };

        let mut blockers: Vec<String> = report.failed.clone();
        for state in self.blackboard.tasks().await {
            for issue in &state.blocking_issues {
                if !issue.resolved {
                    blockers.push(format!("{}: {}", state.task.id, issue.description));
                }
            }
        }

        SessionOutput {
            tests_passed,
            todo_items: report.blocked.clone(),
            blockers,
        }
    }

    /// One model call plus at most one guardrail-led retry on validation
    /// failure.
    async fn call_with_validation_retry<T>(
        &self,
        prompt: &str,
        temperature: f32,
        validate: impl Fn(&serde_json::Value) -> DomainResult<T>,
    ) -> DomainResult<T> {
        const SYSTEM: &str = "You are the planning front-end of an engineering \
             orchestrator. Respond with JSON exactly as instructed.";

        let request = GenerationRequest::from_text(prompt)
            .with_system(SYSTEM)
            .with_temperature(temperature);
        let response = self
            .content_router
            .generate(&request)
            .await
            .map_err(|e| DomainError::ExecutionFailed(e.to_string()))?;

        // Validation failures buffer a guardrail message as a side effect.
        match extract_json(&response.text) {
            Some(value) => {
                if let Ok(valid) = validate(&value) {
                    return Ok(valid);
                }
            }
            None => {
                // Run the validator against null so the guardrail for the
                // re-call names the structural problem.
                let _ = validate(&serde_json::Value::Null);
            }
        }

        let correction = drain_bodies(&self.guardrails);
        let retry_request =
            GenerationRequest::from_text(format!("{}\n\n{}\n", prompt, correction))
                .with_system(SYSTEM)
                .with_temperature(temperature);
        let retry_response = self
            .content_router
            .generate(&retry_request)
            .await
            .map_err(|e| DomainError::ExecutionFailed(e.to_string()))?;

        let value = extract_json(&retry_response.text).ok_or_else(|| {
            DomainError::PhaseOutputRejected("phase output is not JSON".to_string())
        })?;
        validate(&value).map_err(|e| DomainError::PhaseOutputRejected(e.to_string()))
    }

    async fn query(&self) -> DomainResult<String> {
        self.state
            .lock()
            .await
            .query
            .clone()
            .ok_or_else(|| DomainError::ValidationFailed("session not initialized".to_string()))
    }

    async fn failed_result(&self, task_id: &str, error: DomainError) -> SessionResult {
        let state = self.state.lock().await;
        SessionResult {
            task_id: task_id.to_string(),
            outcome: SessionOutcome::Failed,
            pareto: state.pareto.clone(),
            plan: state.plan.clone(),
            report: None,
            started_at: state.started_at.unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
            error: Some(error.to_string()),
        }
    }

    async fn cancelled_result(&self, task_id: &str) -> SessionResult {
        let state = self.state.lock().await;
        SessionResult {
            task_id: task_id.to_string(),
            outcome: SessionOutcome::Cancelled,
            pareto: state.pareto.clone(),
            plan: state.plan.clone(),
            report: None,
            started_at: state.started_at.unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
            error: None,
        }
    }
}

/// Drain the guardrail buffer into one newline-joined instruction block.
fn drain_bodies(guardrails: &GuardrailManager) -> String {
    guardrails
        .drain_pending()
        .into_iter()
        .map(|m| m.body)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull the first JSON value out of a response: a fenced ```json block,
/// or the outermost array/object literal.
fn extract_json(text: &str) -> Option<serde_json::Value> {
    if let Some(block) = text.split("```json").nth(1).and_then(|rest| rest.split("```").next()) {
        if let Ok(value) = serde_json::from_str(block.trim()) {
            return Some(value);
        }
    }
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }
    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&text[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}
