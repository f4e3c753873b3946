//! Task DAG domain model.
//!
//! Represents the planner's dependency graph and provides cycle detection,
//! topological sorting, and the effort-weighted critical path.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::task::Task;
use crate::domain::errors::{DomainError, DomainResult};

/// Decomposition strategy that produced a DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Mvp,
    Analysis,
    Refactoring,
    Feature,
    Generic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mvp => "mvp",
            Self::Analysis => "analysis",
            Self::Refactoring => "refactoring",
            Self::Feature => "feature",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated task dependency graph.
///
/// `dependents` is maintained as the exact transpose of `dependencies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDag {
    /// All tasks keyed by id, in deterministic order.
    pub tasks: BTreeMap<String, Task>,
    /// Edges: task id -> ids it depends on.
    pub dependencies: HashMap<String, Vec<String>>,
    /// Transposed edges: task id -> ids that depend on it.
    pub dependents: HashMap<String, Vec<String>>,
    /// The user query this DAG was planned from.
    pub original_query: String,
    /// The strategy the planner selected.
    pub strategy: Strategy,
}

impl TaskDag {
    /// Build a DAG from a list of tasks, rejecting unknown dependencies
    /// and cycles.
    pub fn from_tasks(
        tasks: Vec<Task>,
        original_query: impl Into<String>,
        strategy: Strategy,
    ) -> DomainResult<Self> {
        let original_query = original_query.into();
        if tasks.is_empty() {
            return Err(DomainError::EmptyPlan(original_query));
        }

        let mut task_map: BTreeMap<String, Task> = BTreeMap::new();
        for task in tasks {
            if task_map.contains_key(&task.id) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate task id: {}",
                    task.id
                )));
            }
            task_map.insert(task.id.clone(), task);
        }

        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for id in task_map.keys() {
            dependencies.insert(id.clone(), vec![]);
            dependents.insert(id.clone(), vec![]);
        }

        for task in task_map.values() {
            for dep in &task.dependencies {
                if !task_map.contains_key(dep) {
                    return Err(DomainError::ValidationFailed(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.id, dep
                    )));
                }
                if let Some(deps) = dependencies.get_mut(&task.id) {
                    deps.push(dep.clone());
                }
                if let Some(deps) = dependents.get_mut(dep) {
                    deps.push(task.id.clone());
                }
            }
        }

        let dag = Self {
            tasks: task_map,
            dependencies,
            dependents,
            original_query,
            strategy,
        };

        if let Some(task_id) = dag.find_cycle() {
            return Err(DomainError::DependencyCycle(task_id));
        }

        Ok(dag)
    }

    /// Ids of root tasks (no dependencies).
    pub fn roots(&self) -> Vec<String> {
        self.tasks
            .keys()
            .filter(|id| self.dependencies.get(*id).is_none_or(|d| d.is_empty()))
            .cloned()
            .collect()
    }

    /// Ids of leaf tasks (no dependents).
    pub fn leaves(&self) -> Vec<String> {
        self.tasks
            .keys()
            .filter(|id| self.dependents.get(*id).is_none_or(|d| d.is_empty()))
            .cloned()
            .collect()
    }

    /// Return a task id that participates in a cycle, if any.
    pub fn find_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for id in self.tasks.keys() {
            if self.cycle_dfs(id, &mut visited, &mut rec_stack) {
                return Some(id.clone());
            }
        }
        None
    }

    fn cycle_dfs(
        &self,
        id: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
    ) -> bool {
        if rec_stack.contains(id) {
            return true;
        }
        if visited.contains(id) {
            return false;
        }

        visited.insert(id.to_string());
        rec_stack.insert(id.to_string());

        if let Some(deps) = self.dependencies.get(id) {
            for dep in deps {
                if self.cycle_dfs(dep, visited, rec_stack) {
                    return true;
                }
            }
        }

        rec_stack.remove(id);
        false
    }

    /// Topological order (dependencies before dependents).
    pub fn topological_sort(&self) -> DomainResult<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        for (id, deps) in &self.dependencies {
            in_degree.insert(id.as_str(), deps.len());
        }
        // BTreeMap keys give a stable order for ties.
        for id in self.tasks.keys() {
            if in_degree.get(id.as_str()).copied().unwrap_or(0) == 0 {
                queue.push_back(id.as_str());
            }
        }

        let mut result = Vec::with_capacity(self.tasks.len());
        while let Some(id) = queue.pop_front() {
            result.push(id.to_string());
            if let Some(dependents) = self.dependents.get(id) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent.as_str());
                        }
                    }
                }
            }
        }

        if result.len() != self.tasks.len() {
            return Err(DomainError::DependencyCycle(
                self.find_cycle().unwrap_or_default(),
            ));
        }
        Ok(result)
    }

    /// The effort-weighted critical path: the root-to-leaf chain whose
    /// summed effort is maximal.
    pub fn critical_path(&self) -> DomainResult<Vec<String>> {
        let sorted = self.topological_sort()?;
        let mut distance: HashMap<&str, u32> = HashMap::new();
        let mut predecessor: HashMap<&str, Option<&str>> = HashMap::new();

        for id in &sorted {
            let own_effort = self.tasks.get(id.as_str()).map_or(0, |t| t.effort);
            let (best_dist, best_pred) = self
                .dependencies
                .get(id.as_str())
                .map(|deps| {
                    deps.iter()
                        .filter_map(|d| distance.get(d.as_str()).map(|dist| (*dist, d.as_str())))
                        .max_by_key(|(dist, _)| *dist)
                        .map_or((0, None), |(dist, pred)| (dist, Some(pred)))
                })
                .unwrap_or((0, None));

            // Borrow the canonical key so the map outlives `sorted`.
            let key = self
                .tasks
                .get_key_value(id.as_str())
                .map(|(k, _)| k.as_str())
                .unwrap_or_default();
            distance.insert(key, best_dist + own_effort);
            predecessor.insert(key, best_pred);
        }

        let end = distance
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(id, _)| *id);

        let mut path = vec![];
        let mut current = end;
        while let Some(id) = current {
            path.push(id.to_string());
            current = predecessor.get(id).copied().flatten();
        }
        path.reverse();
        Ok(path)
    }

    /// Total effort along the critical path.
    pub fn critical_path_effort(&self) -> DomainResult<u32> {
        Ok(self
            .critical_path()?
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(|t| t.effort)
            .sum())
    }

    /// All ids that transitively depend on the given task.
    pub fn transitive_dependents(&self, task_id: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        if let Some(dependents) = self.dependents.get(task_id) {
            queue.extend(dependents.iter().cloned());
        }
        while let Some(id) = queue.pop_front() {
            if result.insert(id.clone()) {
                if let Some(dependents) = self.dependents.get(&id) {
                    queue.extend(dependents.iter().cloned());
                }
            }
        }
        result
    }
}
