//! Agent registry service.
//!
//! Maintains the current set of valid agent descriptors, loaded from two
//! roots (project-local and user-global). Each reload builds a fresh map
//! off-line and swaps a single immutable snapshot atomically, so readers
//! never observe a half-built registry. Directory changes trigger a
//! debounced rebuild.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentDescriptor, AgentScope};

/// Outcome of one registry load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Names loaded into the snapshot.
    pub loaded: Vec<String>,
    /// Per-file warnings (parse/validation failures, shadowing).
    pub warnings: Vec<String>,
}

/// Registry of agent descriptors with atomic snapshot swap and hot reload.
pub struct AgentRegistry {
    snapshot: RwLock<Arc<BTreeMap<String, AgentDescriptor>>>,
    project_dir: Option<PathBuf>,
    user_dir: Option<PathBuf>,
    /// Watchers are stored to keep the file-system watches alive.
    watchers: Mutex<Vec<RecommendedWatcher>>,
}

impl AgentRegistry {
    /// Create a registry over the given roots. Missing roots are tolerated:
    /// the registry starts with just the built-in agent and logs the gap.
    pub fn new(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Arc<Self> {
        let registry = Arc::new(Self {
            snapshot: RwLock::new(Arc::new(BTreeMap::new())),
            project_dir,
            user_dir,
            watchers: Mutex::new(vec![]),
        });
        let report = registry.reload();
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        tracing::info!(agents = report.loaded.len(), "Agent registry loaded");
        registry
    }

    /// Registry with no file-backed agents, only the built-in default.
    pub fn empty() -> Arc<Self> {
        Self::new(None, None)
    }

    /// Rebuild the descriptor map from disk and swap it in atomically.
    ///
    /// User-scope descriptors load first; project-scope descriptors shadow
    /// them on name collision (with a recorded warning). Invalid files are
    /// warnings, never fatal. The built-in `general-purpose` agent is always
    /// present unless a file-backed agent takes its name.
    pub fn reload(&self) -> LoadReport {
        let mut report = LoadReport::default();
        let mut map: BTreeMap<String, AgentDescriptor> = BTreeMap::new();

        let builtin = AgentDescriptor::general_purpose();
        map.insert(builtin.name.clone(), builtin);

        if let Some(dir) = &self.user_dir {
            Self::load_root(dir, AgentScope::User, &mut map, &mut report);
        }
        if let Some(dir) = &self.project_dir {
            Self::load_root(dir, AgentScope::Project, &mut map, &mut report);
        }

        report.loaded = map.keys().cloned().collect();
        *self
            .snapshot
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Arc::new(map);
        report
    }

    fn load_root(
        dir: &Path,
        scope: AgentScope,
        map: &mut BTreeMap<String, AgentDescriptor>,
        report: &mut LoadReport,
    ) {
        if !dir.exists() {
            report
                .warnings
                .push(format!("Agents directory {:?} does not exist", dir));
            return;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                report
                    .warnings
                    .push(format!("Failed to read agents directory {:?}: {}", dir, e));
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    report
                        .warnings
                        .push(format!("Failed to read {:?}: {}", path, e));
                    continue;
                }
            };
            match AgentDescriptor::parse(&content, scope) {
                Ok(descriptor) => {
                    if let Some(existing) = map.get(&descriptor.name) {
                        if existing.scope == AgentScope::User && scope == AgentScope::Project {
                            report.warnings.push(format!(
                                "Agent '{}': project descriptor shadows user descriptor",
                                descriptor.name
                            ));
                        }
                    }
                    tracing::debug!(
                        agent = %descriptor.name,
                        scope = scope.as_str(),
                        "Loaded agent descriptor from {:?}",
                        path
                    );
                    map.insert(descriptor.name.clone(), descriptor);
                }
                Err(e) => {
                    report
                        .warnings
                        .push(format!("Invalid agent descriptor {:?}: {}", path, e));
                }
            }
        }
    }

    /// Snapshot of currently valid agents.
    pub fn list(&self) -> Vec<AgentDescriptor> {
        self.current().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> DomainResult<AgentDescriptor> {
        self.current()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| DomainError::AgentNotFound(name.to_string()))
    }

    /// Agents whose keyword set contains the given keyword, in name order.
    pub fn lookup_by_keyword(&self, keyword: &str) -> Vec<AgentDescriptor> {
        let keyword = keyword.to_lowercase();
        self.current()
            .values()
            .filter(|a| a.keywords.iter().any(|k| k.to_lowercase() == keyword))
            .cloned()
            .collect()
    }

    /// Agents whose description mentions the given category, in name order.
    pub fn lookup_by_category(&self, category: &str) -> Vec<AgentDescriptor> {
        let category = category.to_lowercase();
        self.current()
            .values()
            .filter(|a| {
                a.description.to_lowercase().contains(&category)
                    || a.keywords.iter().any(|k| k.to_lowercase() == category)
            })
            .cloned()
            .collect()
    }

    /// The built-in fallback descriptor from the current snapshot.
    pub fn default_agent(&self) -> AgentDescriptor {
        self.get("general-purpose")
            .unwrap_or_else(|_| AgentDescriptor::general_purpose())
    }

    fn current(&self) -> Arc<BTreeMap<String, AgentDescriptor>> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Start watching both roots for changes. Reloads are debounced:
    /// a burst of file events collapses into one rebuild after
    /// `debounce_ms` (minimum 100 ms).
    pub fn watch(self: &Arc<Self>, debounce_ms: u64) -> DomainResult<()> {
        let debounce_ms = debounce_ms.max(100);
        let (tx, rx) = std_mpsc::channel::<()>();

        let roots: Vec<PathBuf> = [self.project_dir.clone(), self.user_dir.clone()]
            .into_iter()
            .flatten()
            .filter(|p| p.exists())
            .collect();

        for root in &roots {
            let tx = tx.clone();
            let mut watcher =
                notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
                    if let Ok(event) = res {
                        if matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        ) {
                            let _ = tx.send(());
                        }
                    }
                })
                .map_err(|e| {
                    DomainError::ValidationFailed(format!("Failed to create file watcher: {}", e))
                })?;

            watcher
                .watch(root, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    DomainError::ValidationFailed(format!(
                        "Failed to watch agents directory {:?}: {}",
                        root, e
                    ))
                })?;
            self.watchers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(watcher);
            tracing::info!(path = %root.display(), "Agent hot-reload watcher started");
        }

        let registry = Arc::clone(self);
        std::thread::spawn(move || {
            let debounce = Duration::from_millis(debounce_ms);
            let mut last_reload: Option<Instant> = None;

            while rx.recv().is_ok() {
                // Drain events that arrive during the debounce window so a
                // burst of writes reloads once.
                while rx.try_recv().is_ok() {}

                if let Some(last) = last_reload {
                    let elapsed = last.elapsed();
                    if elapsed < debounce {
                        std::thread::sleep(debounce - elapsed);
                        while rx.try_recv().is_ok() {}
                    }
                }
                last_reload = Some(Instant::now());

                let report = registry.reload();
                for warning in &report.warnings {
                    tracing::warn!("{}", warning);
                }
                tracing::info!(agents = report.loaded.len(), "Agent registry reloaded");
            }
            tracing::debug!("Agent watcher thread exiting");
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_agent(dir: &Path, file: &str, name: &str, extra: &str) {
        let content = format!(
            "---\nname: {}\ndescription: test agent\nkeywords:\n  - test\n{}---\n\nDo the thing.\n",
            name, extra
        );
        let mut f = std::fs::File::create(dir.join(file)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_empty_registry_has_builtin() {
        let registry = AgentRegistry::empty();
        let agents = registry.list();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "general-purpose");
        assert!(registry.get("general-purpose").is_ok());
    }

    #[test]
    fn test_missing_agent_is_not_found() {
        let registry = AgentRegistry::empty();
        assert!(matches!(
            registry.get("ghost"),
            Err(DomainError::AgentNotFound(_))
        ));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_agent(dir.path(), "reviewer.md", "reviewer", "");
        write_agent(dir.path(), "backend.md", "backend-dev", "");
        // Non-md files are ignored.
        std::fs::write(dir.path().join("notes.txt"), "not an agent").unwrap();

        let registry = AgentRegistry::new(Some(dir.path().to_path_buf()), None);
        let names: Vec<String> = registry.list().into_iter().map(|a| a.name).collect();
        assert!(names.contains(&"reviewer".to_string()));
        assert!(names.contains(&"backend-dev".to_string()));
        assert!(names.contains(&"general-purpose".to_string()));
    }

    #[test]
    fn test_invalid_file_is_warning_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_agent(dir.path(), "good.md", "good-agent", "");
        std::fs::write(dir.path().join("broken.md"), "no frontmatter at all").unwrap();

        let registry = AgentRegistry::new(Some(dir.path().to_path_buf()), None);
        let report = registry.reload();
        assert!(report.warnings.iter().any(|w| w.contains("broken.md")));
        assert!(registry.get("good-agent").is_ok());
    }

    #[test]
    fn test_project_shadows_user() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write_agent(user.path(), "agent.md", "shared-agent", "temperature: 0.2\n");
        write_agent(
            project.path(),
            "agent.md",
            "shared-agent",
            "temperature: 0.9\n",
        );

        let registry = AgentRegistry::new(
            Some(project.path().to_path_buf()),
            Some(user.path().to_path_buf()),
        );
        let agent = registry.get("shared-agent").unwrap();
        assert_eq!(agent.scope, AgentScope::Project);
        assert!((agent.temperature - 0.9).abs() < f32::EPSILON);

        let report = registry.reload();
        assert!(report.warnings.iter().any(|w| w.contains("shadows")));
    }

    #[test]
    fn test_lookup_by_keyword() {
        let dir = tempfile::tempdir().unwrap();
        write_agent(dir.path(), "a.md", "api-agent", "");
        let registry = AgentRegistry::new(Some(dir.path().to_path_buf()), None);

        let hits = registry.lookup_by_keyword("test");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "api-agent");
        assert!(registry.lookup_by_keyword("nope").is_empty());
    }

    #[test]
    fn test_reload_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(Some(dir.path().to_path_buf()), None);
        assert!(registry.get("late-agent").is_err());

        write_agent(dir.path(), "late.md", "late-agent", "");
        registry.reload();
        assert!(registry.get("late-agent").is_ok());
    }

    #[test]
    fn test_case_insensitive_get() {
        let dir = tempfile::tempdir().unwrap();
        write_agent(dir.path(), "a.md", "backend-dev", "");
        let registry = AgentRegistry::new(Some(dir.path().to_path_buf()), None);
        assert!(registry.get("Backend-Dev").is_ok());
    }
}
