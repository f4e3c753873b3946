//! Task planner service.
//!
//! Converts a natural-language request plus project context into a
//! validated task DAG. Strategy selection is rule-based over whole words in
//! the query; each strategy expands to a fixed task skeleton with fixed
//! dependencies, categories, and effort points. When the skeleton exceeds
//! the caller's task budget, adjacent tasks sharing a category are
//! consolidated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentDescriptor, Strategy, Task, TaskDag};

/// Planner detail / parallelism preference levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceLevel {
    High,
    Medium,
    Low,
}

impl PreferenceLevel {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Caller preferences for decomposition.
#[derive(Debug, Clone)]
pub struct PlannerPreferences {
    /// Consolidate down toward this many tasks when exceeded.
    pub max_tasks: Option<usize>,
    pub detail_level: PreferenceLevel,
    pub parallelism: PreferenceLevel,
}

impl Default for PlannerPreferences {
    fn default() -> Self {
        Self {
            max_tasks: None,
            detail_level: PreferenceLevel::Medium,
            parallelism: PreferenceLevel::Medium,
        }
    }
}

/// Output of [`TaskPlanner::decompose`].
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub dag: TaskDag,
    /// Rule-based confidence in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    /// Sum of efforts along the critical path.
    pub estimated_duration: u32,
    pub critical_path: Vec<String>,
}

/// Rule-based task planner.
#[derive(Debug, Clone, Default)]
pub struct TaskPlanner;

impl TaskPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Select a strategy from whole-word, case-insensitive token matches.
    /// When several patterns match, the first in MVP -> Analysis ->
    /// Refactoring -> Feature order wins.
    pub fn select_strategy(query: &str) -> Strategy {
        let lowered = query.to_lowercase();
        let words: HashSet<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let has = |w: &str| words.contains(w);

        if has("mvp") || (has("build") && (has("app") || has("application"))) {
            Strategy::Mvp
        } else if has("analyze") || has("review") || has("audit") {
            Strategy::Analysis
        } else if has("refactor") || has("restructure") || has("modernize") {
            Strategy::Refactoring
        } else if has("add") || has("implement") || has("create") {
            Strategy::Feature
        } else {
            Strategy::Generic
        }
    }

    /// Decompose a query into a validated DAG.
    pub fn decompose(
        &self,
        query: &str,
        available_agents: &[AgentDescriptor],
        context: Option<&str>,
        preferences: &PlannerPreferences,
    ) -> DomainResult<Decomposition> {
        let strategy = Self::select_strategy(query);
        let mut tasks = skeleton(strategy, query, context, preferences.detail_level);

        let mut consolidated = false;
        if let Some(max_tasks) = preferences.max_tasks {
            if tasks.len() > max_tasks {
                tasks = consolidate(tasks);
                consolidated = true;
            }
        }

        let dag = TaskDag::from_tasks(tasks, query, strategy)?;
        let critical_path = dag.critical_path()?;
        let estimated_duration = dag.critical_path_effort()?;

        // Confidence is rule-based: 0.85 for a matched strategy, 0.5 for
        // generic, minus 0.05 when consolidation fires.
        let mut confidence: f64 = if strategy == Strategy::Generic { 0.5 } else { 0.85 };
        if consolidated {
            confidence -= 0.05;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let reasoning = format!(
            "Matched the {} strategy for \"{}\": {} tasks across {} categories{}; \
             {} agents available for routing.",
            strategy,
            query,
            dag.tasks.len(),
            dag.tasks
                .values()
                .map(|t| t.category.as_str())
                .collect::<HashSet<_>>()
                .len(),
            if consolidated {
                " (consolidated to fit the task budget)"
            } else {
                ""
            },
            available_agents.len(),
        );

        Ok(Decomposition {
            dag,
            confidence,
            reasoning,
            estimated_duration,
            critical_path,
        })
    }
}

/// A template row: (id, title, deps, effort, category, outputs).
type Row = (
    &'static str,
    &'static str,
    &'static [&'static str],
    u32,
    &'static str,
    &'static [&'static str],
);

const MVP_ROWS: &[Row] = &[
    ("requirements-analysis", "Requirements analysis", &[], 3, "design", &["requirements-doc"]),
    ("architecture-design", "Architecture design", &["requirements-analysis"], 5, "design", &["architecture-doc"]),
    ("database-schema", "Database schema", &["architecture-design"], 4, "backend", &["schema"]),
    ("api-design", "API design", &["architecture-design"], 4, "backend", &["api-spec"]),
    ("backend-implementation", "Backend implementation", &["database-schema", "api-design"], 8, "backend", &["backend-service"]),
    ("frontend-setup", "Frontend setup", &["architecture-design"], 2, "frontend", &["frontend-scaffold"]),
    ("ui-components", "UI components", &["frontend-setup"], 5, "frontend", &["component-library"]),
    ("frontend-integration", "Frontend integration", &["ui-components", "api-design"], 4, "frontend", &["integrated-frontend"]),
    ("testing", "Testing", &["backend-implementation", "frontend-integration"], 6, "testing", &["test-report"]),
    ("deployment", "Deployment", &["testing"], 3, "deployment", &["deployment-config"]),
];

const ANALYSIS_ROWS: &[Row] = &[
    ("scope-definition", "Scope definition", &[], 2, "analysis", &["scope-doc"]),
    ("code-survey", "Code survey", &["scope-definition"], 5, "analysis", &["survey-notes"]),
    ("dependency-audit", "Dependency audit", &["code-survey"], 3, "analysis", &["dependency-report"]),
    ("quality-assessment", "Quality assessment", &["code-survey"], 4, "analysis", &["quality-report"]),
    ("findings-report", "Findings report", &["dependency-audit", "quality-assessment"], 3, "reporting", &["findings"]),
];

const REFACTORING_ROWS: &[Row] = &[
    ("baseline-tests", "Baseline tests", &[], 4, "testing", &["baseline-suite"]),
    ("hotspot-analysis", "Hotspot analysis", &["baseline-tests"], 3, "analysis", &["hotspot-list"]),
    ("refactor-plan", "Refactor plan", &["hotspot-analysis"], 3, "design", &["refactor-plan"]),
    ("incremental-refactor", "Incremental refactor", &["refactor-plan"], 8, "implementation", &["refactored-code"]),
    ("regression-testing", "Regression testing", &["incremental-refactor"], 5, "testing", &["regression-report"]),
    ("docs-update", "Docs update", &["regression-testing"], 2, "documentation", &["updated-docs"]),
];

const FEATURE_ROWS: &[Row] = &[
    ("requirements-clarification", "Requirements clarification", &[], 2, "design", &["requirements-notes"]),
    ("feature-design", "Feature design", &["requirements-clarification"], 3, "design", &["design-doc"]),
    ("implementation", "Implementation", &["feature-design"], 7, "implementation", &["feature-code"]),
    ("unit-tests", "Unit tests", &["implementation"], 4, "testing", &["unit-suite"]),
    ("integration", "Integration", &["unit-tests"], 3, "implementation", &["integrated-feature"]),
    ("documentation", "Documentation", &["integration"], 2, "documentation", &["feature-docs"]),
];

const GENERIC_ROWS: &[Row] = &[
    ("research", "Research", &[], 3, "research", &["research-notes"]),
    ("plan", "Plan", &["research"], 2, "planning", &["work-plan"]),
    ("execute", "Execute", &["plan"], 6, "implementation", &["work-product"]),
    ("verify", "Verify", &["execute"], 3, "verification", &["verification-report"]),
];

fn skeleton(
    strategy: Strategy,
    query: &str,
    context: Option<&str>,
    detail: PreferenceLevel,
) -> Vec<Task> {
    let rows = match strategy {
        Strategy::Mvp => MVP_ROWS,
        Strategy::Analysis => ANALYSIS_ROWS,
        Strategy::Refactoring => REFACTORING_ROWS,
        Strategy::Feature => FEATURE_ROWS,
        Strategy::Generic => GENERIC_ROWS,
    };

    rows.iter()
        .map(|(id, title, deps, effort, category, outputs)| {
            let mut description = format!("{} for: {}", title, query);
            if detail != PreferenceLevel::Low {
                if let Some(ctx) = context {
                    description.push_str("\n\nProject context:\n");
                    description.push_str(ctx);
                }
            }
            if detail == PreferenceLevel::High && !outputs.is_empty() {
                description.push_str("\n\nExpected outputs: ");
                description.push_str(&outputs.join(", "));
            }
            Task::new(*id, *title)
                .with_description(description)
                .with_dependencies(deps.iter().map(|d| (*d).to_string()).collect())
                .with_effort(*effort)
                .with_category(*category)
                .with_outputs(outputs.iter().map(|o| (*o).to_string()).collect())
        })
        .collect()
}

/// Merge every adjacent run of tasks sharing a category.
///
/// The merged task keeps the first member's id, unions the members'
/// external dependencies and expected outputs, and takes effort
/// `max(1, floor(0.8 * sum))`. Generation order is preserved.
fn consolidate(tasks: Vec<Task>) -> Vec<Task> {
    // Group adjacent same-category tasks.
    let mut groups: Vec<Vec<Task>> = vec![];
    for task in tasks {
        match groups.last_mut() {
            Some(group) if group[0].category == task.category => group.push(task),
            _ => groups.push(vec![task]),
        }
    }

    // Map each member id to its group's surviving id.
    let mut remap: std::collections::HashMap<String, String> =
        std::collections::HashMap::new();
    for group in &groups {
        let survivor = group[0].id.clone();
        for member in group {
            remap.insert(member.id.clone(), survivor.clone());
        }
    }

    groups
        .into_iter()
        .map(|mut group| {
            if group.len() == 1 {
                let mut task = group.swap_remove(0);
                task.dependencies = remap_deps(&task.id, &task.dependencies, &remap);
                return task;
            }

            let member_ids: HashSet<String> = group.iter().map(|t| t.id.clone()).collect();
            let survivor_id = group[0].id.clone();
            let title = group
                .iter()
                .map(|t| t.title.as_str())
                .collect::<Vec<_>>()
                .join(" + ");
            let description = group
                .iter()
                .map(|t| t.description.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let effort_sum: u32 = group.iter().map(|t| t.effort).sum();
            let effort = ((f64::from(effort_sum) * 0.8).floor() as u32).max(1);

            let mut dependencies: Vec<String> = vec![];
            let mut outputs: Vec<String> = vec![];
            for member in &group {
                for dep in &member.dependencies {
                    if !member_ids.contains(dep) {
                        let mapped = remap.get(dep).cloned().unwrap_or_else(|| dep.clone());
                        if !dependencies.contains(&mapped) {
                            dependencies.push(mapped);
                        }
                    }
                }
                for output in &member.expected_outputs {
                    if !outputs.contains(output) {
                        outputs.push(output.clone());
                    }
                }
            }

            Task::new(survivor_id, title)
                .with_description(description)
                .with_dependencies(dependencies)
                .with_effort(effort)
                .with_category(group[0].category.clone())
                .with_outputs(outputs)
        })
        .collect()
}

fn remap_deps(
    own_id: &str,
    deps: &[String],
    remap: &std::collections::HashMap<String, String>,
) -> Vec<String> {
    let mut result = vec![];
    for dep in deps {
        let mapped = remap.get(dep).cloned().unwrap_or_else(|| dep.clone());
        if mapped != own_id && !result.contains(&mapped) {
            result.push(mapped);
        }
    }
    result
}
