//! Scheduler integration tests: concurrency bounds, failure propagation,
//! retry/fallback ordering, timeouts, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use maestro::domain::models::{GuardrailKind, Strategy, Task, TaskDag, TaskStatus};
use maestro::domain::ports::{Generator, ProviderError};
use maestro::infrastructure::providers::{MockGenerator, MockReply, RetryPolicy};
use maestro::services::agent_registry::AgentRegistry;
use maestro::services::blackboard::Blackboard;
use maestro::services::content_router::{ContentRouter, ContentRouterConfig};
use maestro::services::guardrails::GuardrailManager;
use maestro::services::scheduler::{Scheduler, SchedulerConfig};

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        max_concurrency: None,
        per_task_timeout: Some(Duration::from_secs(5)),
        session_deadline: Some(Duration::from_secs(30)),
        max_retries: 3,
        backoff: RetryPolicy::new(3, 1, 2.0, 10, 0.2),
        grace_period: Duration::from_millis(200),
    }
}

fn scheduler_over(
    text: Arc<dyn Generator>,
    fallback: Vec<Arc<dyn Generator>>,
    config: SchedulerConfig,
) -> (Scheduler, Arc<Blackboard>, Arc<GuardrailManager>) {
    let blackboard = Arc::new(Blackboard::new());
    let guardrails = Arc::new(GuardrailManager::with_defaults());
    let router = Arc::new(
        ContentRouter::new(
            text,
            Arc::new(MockGenerator::succeeding("vision-model", "vision")),
            ContentRouterConfig::default(),
        )
        .with_fallback_chain(fallback),
    );
    let scheduler = Scheduler::new(
        AgentRegistry::empty(),
        Arc::clone(&blackboard),
        router,
        Arc::clone(&guardrails),
        config,
    );
    (scheduler, blackboard, guardrails)
}

fn independent_tasks(n: usize) -> TaskDag {
    let tasks: Vec<Task> = (0..n)
        .map(|i| {
            Task::new(format!("task-{:02}", i), format!("Task {}", i))
                .with_description("independent unit of work")
                .with_effort(((i % 10) + 1) as u32)
        })
        .collect();
    TaskDag::from_tasks(tasks, "run the batch", Strategy::Generic).expect("valid dag")
}

#[tokio::test]
async fn concurrency_bound_is_respected_and_all_tasks_complete() {
    let generator: Arc<dyn Generator> = Arc::new(
        MockGenerator::succeeding("text-model", "done").with_delay(Duration::from_millis(40)),
    );
    let config = SchedulerConfig {
        max_concurrency: Some(3),
        ..fast_config()
    };
    let (scheduler, blackboard, _) = scheduler_over(generator, vec![], config);

    let dag = independent_tasks(10);
    let (_sub, mut rx) = blackboard.subscribe();

    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run succeeds");

    assert_eq!(report.completed.len(), 10);
    assert!(report.failed.is_empty());
    assert!(report.blocked.is_empty());

    // Replay the event stream and track how many tasks were running at
    // once. Status transitions are totally ordered per task, and the
    // blackboard delivers events in emission order.
    let mut running = 0usize;
    let mut max_running = 0usize;
    while let Ok(event) = rx.try_recv() {
        if let Some(status) = event.data.get("status").and_then(|s| s.as_str()) {
            match status {
                "running" => {
                    running += 1;
                    max_running = max_running.max(running);
                }
                "completed" | "failed" | "blocked" => {
                    running = running.saturating_sub(1);
                }
                _ => {}
            }
        }
    }
    assert!(
        max_running <= 3,
        "observed {} concurrent running tasks",
        max_running
    );
    assert!(max_running >= 2, "expected some parallelism");
}

#[tokio::test]
async fn failure_propagates_blocked_through_the_chain() {
    let generator: Arc<dyn Generator> = Arc::new(MockGenerator::failing(
        "text-model",
        ProviderError::InvalidRequest("malformed".to_string()),
    ));
    let (scheduler, blackboard, _) = scheduler_over(generator, vec![], fast_config());

    // a -> b -> c
    let dag = TaskDag::from_tasks(
        vec![
            Task::new("a", "A").with_effort(1),
            Task::new("b", "B")
                .with_dependencies(vec!["a".to_string()])
                .with_effort(1),
            Task::new("c", "C")
                .with_dependencies(vec!["b".to_string()])
                .with_effort(1),
        ],
        "chain",
        Strategy::Generic,
    )
    .expect("valid dag");

    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run finishes");

    assert_eq!(report.failed, vec!["a"]);
    let mut blocked = report.blocked.clone();
    blocked.sort();
    assert_eq!(blocked, vec!["b", "c"]);

    assert_eq!(
        blackboard.task("b").await.expect("b").status,
        TaskStatus::Blocked
    );
    assert_eq!(
        blackboard.task("c").await.expect("c").status,
        TaskStatus::Blocked
    );

    // The failure left an error note for the final summary.
    let notes = blackboard.notes().await;
    assert!(notes
        .iter()
        .any(|n| n.title.contains("'a'") && n.author == "scheduler"));
}

#[tokio::test]
async fn retry_exhaustion_falls_back_and_succeeds() {
    // Fails 4 times (initial + 3 retries), then succeeds: the 5th call is
    // the fallback-chain attempt against the same generator.
    let generator = Arc::new(MockGenerator::failing_then_success("text-model", 4, "rescued"));
    let (scheduler, blackboard, guardrails) = scheduler_over(
        generator.clone(),
        vec![generator.clone() as Arc<dyn Generator>],
        fast_config(),
    );

    let dag = TaskDag::from_tasks(
        vec![Task::new("solo", "Solo task").with_effort(5)],
        "single",
        Strategy::Generic,
    )
    .expect("valid dag");

    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run succeeds");

    assert_eq!(report.completed, vec!["solo"]);
    assert_eq!(generator.call_count(), 5);
    assert_eq!(
        blackboard.task("solo").await.expect("solo").status,
        TaskStatus::Completed
    );

    // Guardrail buffer: retry messages for attempts 1..3, then exactly one
    // fallback directive, in that order.
    let messages: Vec<_> = guardrails
        .messages()
        .into_iter()
        .filter(|m| m.kind == GuardrailKind::Retry)
        .collect();
    assert_eq!(messages.len(), 4);
    for (i, message) in messages.iter().take(3).enumerate() {
        assert_eq!(
            message.metadata["attempt"].as_u64(),
            Some(i as u64 + 1),
            "retry message {} out of order",
            i
        );
    }
    assert_eq!(messages[3].metadata["fallback"].as_bool(), Some(true));
}

#[tokio::test]
async fn permanent_errors_do_not_retry() {
    let generator = Arc::new(MockGenerator::failing(
        "text-model",
        ProviderError::InvalidApiKey,
    ));
    let (scheduler, _, guardrails) =
        scheduler_over(generator.clone(), vec![], fast_config());

    let dag = TaskDag::from_tasks(
        vec![Task::new("solo", "Solo").with_effort(1)],
        "single",
        Strategy::Generic,
    )
    .expect("valid dag");

    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run finishes");

    assert_eq!(report.failed, vec!["solo"]);
    assert_eq!(generator.call_count(), 1);
    assert!(guardrails
        .messages()
        .iter()
        .all(|m| m.kind != GuardrailKind::Retry));
}

#[tokio::test]
async fn task_timeout_marks_failed_with_timeout_reason() {
    let generator: Arc<dyn Generator> = Arc::new(
        MockGenerator::succeeding("text-model", "slow").with_delay(Duration::from_millis(500)),
    );
    let config = SchedulerConfig {
        per_task_timeout: Some(Duration::from_millis(50)),
        ..fast_config()
    };
    let (scheduler, blackboard, _) = scheduler_over(generator, vec![], config);

    let dag = TaskDag::from_tasks(
        vec![Task::new("slow-task", "Slow").with_effort(1)],
        "timeout case",
        Strategy::Generic,
    )
    .expect("valid dag");

    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run finishes");

    assert_eq!(report.failed, vec!["slow-task"]);
    let state = blackboard.task("slow-task").await.expect("state");
    assert_eq!(state.error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn cancellation_sweeps_all_remaining_work() {
    let generator: Arc<dyn Generator> = Arc::new(
        MockGenerator::succeeding("text-model", "never").with_delay(Duration::from_secs(10)),
    );
    let config = SchedulerConfig {
        max_concurrency: Some(2),
        grace_period: Duration::from_millis(100),
        ..fast_config()
    };
    let (scheduler, blackboard, _) = scheduler_over(generator, vec![], config);

    let dag = independent_tasks(4);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let report = scheduler.execute(&dag, cancel).await.expect("run finishes");

    assert!(report.cancelled);
    assert!(report.completed.is_empty());
    assert_eq!(report.failed.len(), 4);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "cancellation should not wait for slow units"
    );

    // Every task ended in a terminal state with a cancellation reason.
    for state in blackboard.tasks().await {
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("cancelled"));
    }
}

#[tokio::test]
async fn session_deadline_cancels_the_run() {
    let generator: Arc<dyn Generator> = Arc::new(
        MockGenerator::succeeding("text-model", "never").with_delay(Duration::from_secs(10)),
    );
    let config = SchedulerConfig {
        session_deadline: Some(Duration::from_millis(80)),
        grace_period: Duration::from_millis(50),
        ..fast_config()
    };
    let (scheduler, _, _) = scheduler_over(generator, vec![], config);

    let dag = independent_tasks(2);
    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run finishes");
    assert!(report.cancelled);
    assert!(report.completed.is_empty());
}

#[tokio::test]
async fn terminal_partition_is_total_and_disjoint() {
    // Mixed outcome: some tasks fail (via scripted replies), the rest
    // complete; the report buckets must partition the task set.
    let generator = MockGenerator::succeeding("text-model", "ok");
    generator.push_reply(MockReply::Failure(ProviderError::InvalidRequest(
        "bad".to_string(),
    )));
    let (scheduler, _, _) =
        scheduler_over(Arc::new(generator), vec![], fast_config());

    let dag = independent_tasks(5);
    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run finishes");

    let mut all: Vec<String> = report
        .completed
        .iter()
        .chain(report.failed.iter())
        .chain(report.blocked.iter())
        .cloned()
        .collect();
    all.sort();
    let mut expected: Vec<String> = dag.tasks.keys().cloned().collect();
    expected.sort();
    assert_eq!(all, expected);

    let unique: std::collections::HashSet<&String> = all.iter().collect();
    assert_eq!(unique.len(), all.len(), "buckets must be disjoint");
}

#[tokio::test]
async fn reported_tool_calls_emit_post_call_guardrails() {
    let generator = MockGenerator::succeeding("text-model", "plain");
    generator.push_reply(MockReply::Success(
        r#"```json
{ "artifacts": [{ "name": "patch", "kind": "file", "content": "diff --git" }],
  "tool_calls": [
    { "tool": "edit", "output": "patched src/lib.rs" },
    { "tool": "shell", "exit_code": 2, "output": "2 tests failed" },
    { "tool": "teleport", "output": "ignored" }
  ],
  "done": true }
```"#
            .to_string(),
    ));
    let (scheduler, _, guardrails) =
        scheduler_over(Arc::new(generator), vec![], fast_config());

    let dag = TaskDag::from_tasks(
        vec![Task::new("solo", "Solo").with_effort(1)],
        "single",
        Strategy::Generic,
    )
    .expect("valid dag");

    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run succeeds");
    assert_eq!(report.completed, vec!["solo"]);

    // edit and shell carry post-call rules, in call order; unknown tools
    // are a no-op.
    let tool_messages: Vec<_> = guardrails
        .messages()
        .into_iter()
        .filter(|m| m.kind == GuardrailKind::ToolCall)
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert!(tool_messages[0].body.contains("test command"));
    assert!(tool_messages[1].body.contains("exited 2"));
}

#[tokio::test]
async fn subagent_followup_guardrails_flow_into_the_next_unit() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("debugger.md"),
        "---\nname: debugger\ndescription: Debugs failures from stack traces\nkeywords:\n  - debug\n---\n\nYou are the debugger. Trace faults to their source.\n",
    )
    .expect("write agent");
    let registry = AgentRegistry::new(Some(dir.path().to_path_buf()), None);

    let build = |guardrails: Arc<GuardrailManager>| {
        Scheduler::new(
            Arc::clone(&registry),
            Arc::new(Blackboard::new()),
            Arc::new(ContentRouter::new(
                Arc::new(MockGenerator::succeeding("text-model", "traced")),
                Arc::new(MockGenerator::succeeding("vision-model", "v")),
                ContentRouterConfig::default(),
            )),
            guardrails,
            fast_config(),
        )
    };

    // A lone debugger task: its follow-up stays buffered after the run.
    let guardrails = Arc::new(GuardrailManager::with_defaults());
    let dag = TaskDag::from_tasks(
        vec![Task::new("trace", "Trace the crash").with_effort(1)],
        r#"use debugger: "trace the crash""#,
        Strategy::Generic,
    )
    .expect("valid dag");
    build(Arc::clone(&guardrails))
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run succeeds");

    let bodies: Vec<String> = guardrails.messages().into_iter().map(|m| m.body).collect();
    assert!(
        bodies.iter().any(|b| b.contains("debugger agent finished")),
        "missing debugger follow-up in {:?}",
        bodies
    );

    // In a chain, the first unit's follow-up is drained into the second
    // unit's prompt, so only the final unit's follow-up stays buffered.
    let guardrails = Arc::new(GuardrailManager::with_defaults());
    let dag = TaskDag::from_tasks(
        vec![
            Task::new("trace", "Trace the crash").with_effort(2),
            Task::new("fix", "Fix the crash")
                .with_dependencies(vec!["trace".to_string()])
                .with_effort(1),
        ],
        r#"use debugger: "trace and fix the crash""#,
        Strategy::Generic,
    )
    .expect("valid dag");
    build(Arc::clone(&guardrails))
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run succeeds");

    let followups = guardrails
        .messages()
        .into_iter()
        .filter(|m| m.body.contains("debugger agent finished"))
        .count();
    assert_eq!(
        followups, 1,
        "the first follow-up must be consumed by the second unit's prompt"
    );
}

#[tokio::test]
async fn upstream_artifacts_feed_downstream_prompts() {
    // The downstream task's prompt should carry the upstream artifact; we
    // verify through the blackboard that both tasks completed and the
    // upstream artifact was committed before the downstream ran.
    let generator = MockGenerator::succeeding("text-model", "plain");
    generator.push_reply(MockReply::Success(
        r#"```json
{ "artifacts": [{ "name": "schema", "kind": "schema", "content": "CREATE TABLE users;" }],
  "notes": [{ "title": "schema note", "body": "uuid keys" }],
  "done": true }
```"#
            .to_string(),
    ));
    let (scheduler, blackboard, _) =
        scheduler_over(Arc::new(generator), vec![], fast_config());

    let dag = TaskDag::from_tasks(
        vec![
            Task::new("schema-task", "Design schema").with_effort(2),
            Task::new("api-task", "Build API")
                .with_dependencies(vec!["schema-task".to_string()])
                .with_effort(2),
        ],
        "pipeline",
        Strategy::Generic,
    )
    .expect("valid dag");

    let report = scheduler
        .execute(&dag, CancellationToken::new())
        .await
        .expect("run succeeds");
    assert_eq!(report.completed.len(), 2);

    let upstream = blackboard.artifacts_for_task("schema-task").await;
    assert_eq!(upstream.len(), 1);
    assert_eq!(upstream[0].name, "schema");

    // The structured note was committed too.
    assert!(blackboard
        .notes()
        .await
        .iter()
        .any(|n| n.title == "schema note"));

    // Dependency ordering: upstream finished before downstream started.
    let schema = blackboard.task("schema-task").await.expect("schema");
    let api = blackboard.task("api-task").await.expect("api");
    assert!(schema.finished_at.expect("finished") <= api.started_at.expect("started"));
}
