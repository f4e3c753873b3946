//! Planner and DAG integration tests: decomposition shapes, consolidation,
//! and graph invariants.

use maestro::domain::models::{Strategy, TaskStatus};
use maestro::services::blackboard::Blackboard;
use maestro::services::task_planner::{PlannerPreferences, TaskPlanner};

#[test]
fn mvp_dag_has_the_expected_shape() {
    let planner = TaskPlanner::new();
    let decomposition = planner
        .decompose(
            "Build an MVP for a food delivery app",
            &[],
            None,
            &PlannerPreferences::default(),
        )
        .expect("decomposition succeeds");

    let dag = &decomposition.dag;
    assert_eq!(dag.strategy, Strategy::Mvp);

    let expected_ids = [
        "requirements-analysis",
        "architecture-design",
        "database-schema",
        "api-design",
        "backend-implementation",
        "frontend-setup",
        "ui-components",
        "frontend-integration",
        "testing",
        "deployment",
    ];
    assert_eq!(dag.tasks.len(), expected_ids.len());
    for id in expected_ids {
        assert!(dag.tasks.contains_key(id), "missing {}", id);
    }

    assert!(dag.tasks["requirements-analysis"].dependencies.is_empty());
    assert_eq!(dag.tasks["deployment"].dependencies, vec!["testing"]);

    let critical: Vec<&str> = decomposition.critical_path.iter().map(String::as_str).collect();
    assert!(critical.contains(&"backend-implementation"));
    assert!(critical.contains(&"testing"));

    // Efforts stay in the generated 1-10 range.
    assert!(dag.tasks.values().all(|t| (1..=10).contains(&t.effort)));
    assert!((0.0..=1.0).contains(&decomposition.confidence));
}

#[test]
fn consolidation_respects_the_task_budget_and_effort_rule() {
    let planner = TaskPlanner::new();
    let full = planner
        .decompose(
            "Build an MVP for a food delivery app",
            &[],
            None,
            &PlannerPreferences::default(),
        )
        .expect("full decomposition");

    let consolidated = planner
        .decompose(
            "Build an MVP for a food delivery app",
            &[],
            None,
            &PlannerPreferences {
                max_tasks: Some(5),
                ..Default::default()
            },
        )
        .expect("consolidated decomposition");

    assert_eq!(consolidated.dag.tasks.len(), 5);

    // Every merged group's effort obeys max(1, floor(0.8 * sum)).
    // Reconstruct groups from the full skeleton's adjacency by category.
    let full_tasks: Vec<_> = [
        "requirements-analysis",
        "architecture-design",
        "database-schema",
        "api-design",
        "backend-implementation",
        "frontend-setup",
        "ui-components",
        "frontend-integration",
        "testing",
        "deployment",
    ]
    .iter()
    .map(|id| full.dag.tasks[*id].clone())
    .collect();

    let mut groups: Vec<Vec<&maestro::domain::models::Task>> = vec![];
    for task in &full_tasks {
        match groups.last_mut() {
            Some(group) if group[0].category == task.category => group.push(task),
            _ => groups.push(vec![task]),
        }
    }
    for group in groups {
        let survivor = &consolidated.dag.tasks[&group[0].id];
        let sum: u32 = group.iter().map(|t| t.effort).sum();
        let expected = if group.len() == 1 {
            group[0].effort
        } else {
            ((f64::from(sum) * 0.8).floor() as u32).max(1)
        };
        assert_eq!(
            survivor.effort, expected,
            "group starting at {} has wrong effort",
            group[0].id
        );
    }

    // Expected outputs are unioned into the survivors.
    let backend = &consolidated.dag.tasks["database-schema"];
    for output in ["schema", "api-spec", "backend-service"] {
        assert!(backend.expected_outputs.contains(&output.to_string()));
    }
}

#[test]
fn dependents_is_the_exact_transpose_for_every_strategy() {
    let planner = TaskPlanner::new();
    for query in [
        "Build an MVP for a store app",
        "analyze the payment module",
        "refactor the session layer",
        "implement exports",
        "make it nicer",
    ] {
        let decomposition = planner
            .decompose(query, &[], None, &PlannerPreferences::default())
            .expect("decomposition succeeds");
        let dag = &decomposition.dag;

        let mut forward_edges = 0;
        for (id, deps) in &dag.dependencies {
            for dep in deps {
                forward_edges += 1;
                assert!(
                    dag.dependents[dep].contains(id),
                    "{}: edge {} -> {} missing from dependents",
                    query,
                    dep,
                    id
                );
            }
        }
        let reverse_edges: usize = dag.dependents.values().map(Vec::len).sum();
        assert_eq!(forward_edges, reverse_edges, "{}", query);
    }
}

#[test]
fn critical_path_dominates_every_chain() {
    let planner = TaskPlanner::new();
    let decomposition = planner
        .decompose(
            "Build an MVP for a marketplace app",
            &[],
            None,
            &PlannerPreferences::default(),
        )
        .expect("decomposition succeeds");
    let dag = &decomposition.dag;
    let critical_effort = dag.critical_path_effort().expect("critical path");

    // Brute-force every root-to-leaf chain.
    fn walk(
        dag: &maestro::domain::models::TaskDag,
        id: &str,
        acc: u32,
        best: &mut u32,
    ) {
        let effort = acc + dag.tasks[id].effort;
        match dag.dependents.get(id) {
            Some(dependents) if !dependents.is_empty() => {
                for next in dependents {
                    walk(dag, next, effort, best);
                }
            }
            _ => *best = (*best).max(effort),
        }
    }

    let mut best = 0;
    for root in dag.roots() {
        walk(dag, &root, 0, &mut best);
    }
    assert_eq!(critical_effort, best);
    assert_eq!(decomposition.estimated_duration, critical_effort);
}

#[tokio::test]
async fn loaded_dag_promotes_roots_and_tracks_readiness() {
    let planner = TaskPlanner::new();
    let decomposition = planner
        .decompose(
            "audit the crypto module",
            &[],
            None,
            &PlannerPreferences::default(),
        )
        .expect("decomposition succeeds");

    let board = Blackboard::new();
    board.load_dag(&decomposition.dag).await;

    // Roots were promoted at load; everything else is pending.
    for state in board.tasks().await {
        if decomposition.dag.dependencies[&state.task.id].is_empty() {
            assert_eq!(state.status, TaskStatus::Ready);
        } else {
            assert_eq!(state.status, TaskStatus::Pending);
        }
    }

    // A ready task implies every dependency is completed.
    board
        .update_status("scope-definition", TaskStatus::Running, "tester", None)
        .await
        .expect("run");
    board
        .update_status("scope-definition", TaskStatus::Completed, "tester", None)
        .await
        .expect("complete");
    board.promote_ready().await;

    for state in board.tasks().await {
        if state.status == TaskStatus::Ready {
            for dep in &state.task.dependencies {
                assert_eq!(
                    board.task(dep).await.expect("dep exists").status,
                    TaskStatus::Completed
                );
            }
        }
    }
}
