//! Agent router service.
//!
//! Maps a (task, query) pair to an agent descriptor by keyword/heuristic
//! scoring, with an explicit-invocation override. The router never
//! executes anything; it only resolves.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::models::{AgentDescriptor, Task};

/// Scoring weights. Keyword hits dominate, category hits follow,
/// description-word overlap breaks the rest.
const KEYWORD_WEIGHT: u32 = 3;
const CATEGORY_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;

/// Result of a routing decision.
#[derive(Debug, Clone)]
pub struct AgentSelection {
    pub agent: AgentDescriptor,
    pub score: u32,
    pub reason: String,
}

/// Explicit invocation form: `use <agent>: "<query>"`.
fn explicit_invocation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*use\s+([a-z0-9-]+)\s*:\s*"(.+)"\s*$"#)
            .expect("explicit invocation regex is valid")
    })
}

/// Stateless router over a set of candidate descriptors.
#[derive(Debug, Clone, Default)]
pub struct AgentRouter;

impl AgentRouter {
    pub fn new() -> Self {
        Self
    }

    /// Parse an explicit `use <agent>: "<query>"` invocation.
    pub fn parse_explicit(query: &str) -> Option<(String, String)> {
        explicit_invocation_re().captures(query).map(|caps| {
            (
                caps[1].to_lowercase(),
                caps[2].to_string(),
            )
        })
    }

    /// Resolve an agent for the given task.
    ///
    /// An explicit invocation in the query bypasses scoring entirely. On a
    /// scoring tie the agent with the narrower tool set wins (more
    /// specialized); a remaining tie goes to the lexicographically smaller
    /// name. An empty match falls back to `general-purpose`.
    pub fn resolve(
        &self,
        task: &Task,
        query: &str,
        candidates: &[AgentDescriptor],
        fallback: &AgentDescriptor,
    ) -> AgentSelection {
        if let Some((name, _)) = Self::parse_explicit(query) {
            if let Some(agent) = candidates.iter().find(|a| a.name == name) {
                return AgentSelection {
                    agent: agent.clone(),
                    score: u32::MAX,
                    reason: format!("explicit invocation of '{}'", name),
                };
            }
            tracing::warn!(
                agent = %name,
                "Explicitly invoked agent not found; falling back to scoring"
            );
        }

        let haystack = format!(
            "{} {} {}",
            query.to_lowercase(),
            task.title.to_lowercase(),
            task.description.to_lowercase()
        );
        let words: HashSet<&str> = haystack.split(|c: char| !c.is_alphanumeric()).collect();

        let mut best: Option<(&AgentDescriptor, u32)> = None;
        for agent in candidates {
            let score = Self::score(agent, task, &words);
            if score == 0 {
                continue;
            }
            best = match best {
                None => Some((agent, score)),
                Some((current, current_score)) => {
                    if Self::beats(agent, score, current, current_score) {
                        Some((agent, score))
                    } else {
                        Some((current, current_score))
                    }
                }
            };
        }

        match best {
            Some((agent, score)) => AgentSelection {
                agent: agent.clone(),
                score,
                reason: format!("scored {} for category '{}'", score, task.category),
            },
            None => AgentSelection {
                agent: fallback.clone(),
                score: 0,
                reason: "no agent matched; using general-purpose fallback".to_string(),
            },
        }
    }

    fn score(agent: &AgentDescriptor, task: &Task, words: &HashSet<&str>) -> u32 {
        let mut score = 0;

        for keyword in &agent.keywords {
            if words.contains(keyword.to_lowercase().as_str()) {
                score += KEYWORD_WEIGHT;
            }
        }

        let category = task.category.to_lowercase();
        if agent
            .keywords
            .iter()
            .any(|k| k.to_lowercase() == category)
            || agent.description.to_lowercase().contains(&category)
        {
            score += CATEGORY_WEIGHT;
        }

        let description_hits = agent
            .description
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3 && words.contains(w))
            .count() as u32;
        score += description_hits.min(3) * DESCRIPTION_WEIGHT;

        score
    }

    /// Tie-break: higher score wins; then fewer tools (more specialized);
    /// then lexicographically smaller name.
    fn beats(
        challenger: &AgentDescriptor,
        challenger_score: u32,
        incumbent: &AgentDescriptor,
        incumbent_score: u32,
    ) -> bool {
        challenger_score > incumbent_score
            || (challenger_score == incumbent_score
                && (challenger.tools.len() < incumbent.tools.len()
                    || (challenger.tools.len() == incumbent.tools.len()
                        && challenger.name < incumbent.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentScope;

    fn agent(name: &str, keywords: &[&str], tools: &[&str], description: &str) -> AgentDescriptor {
        AgentDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            tools: tools.iter().map(|t| (*t).to_string()).collect(),
            model: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            color: None,
            examples: vec![],
            system_prompt: "prompt".to_string(),
            scope: AgentScope::Project,
        }
    }

    fn task(category: &str, description: &str) -> Task {
        Task::new("t", "Task").with_category(category).with_description(description)
    }

    #[test]
    fn test_explicit_invocation() {
        let parsed = AgentRouter::parse_explicit(r#"use Debugger: "find the crash""#);
        assert_eq!(
            parsed,
            Some(("debugger".to_string(), "find the crash".to_string()))
        );
        assert!(AgentRouter::parse_explicit("just a normal query").is_none());
    }

    #[test]
    fn test_explicit_invocation_bypasses_scoring() {
        let router = AgentRouter::new();
        let candidates = vec![
            agent("debugger", &[], &["read", "debugger"], "Debugs failures"),
            agent("backend-dev", &["backend"], &["read"], "Backend work"),
        ];
        let fallback = AgentDescriptor::general_purpose();
        let selection = router.resolve(
            &task("backend", "backend work"),
            r#"use debugger: "trace the panic""#,
            &candidates,
            &fallback,
        );
        assert_eq!(selection.agent.name, "debugger");
        assert_eq!(selection.score, u32::MAX);
    }

    #[test]
    fn test_keyword_scoring_wins() {
        let router = AgentRouter::new();
        let candidates = vec![
            agent("frontend-dev", &["frontend", "ui"], &["read", "write"], "Builds UIs"),
            agent("backend-dev", &["backend", "api"], &["read", "write"], "Builds APIs"),
        ];
        let fallback = AgentDescriptor::general_purpose();
        let selection = router.resolve(
            &task("backend", "implement the api endpoints"),
            "add rest api",
            &candidates,
            &fallback,
        );
        assert_eq!(selection.agent.name, "backend-dev");
    }

    #[test]
    fn test_tie_prefers_fewer_tools() {
        let router = AgentRouter::new();
        let candidates = vec![
            agent("generalist", &["api"], &["read", "write", "shell", "search"], "x"),
            agent("specialist", &["api"], &["read"], "x"),
        ];
        let fallback = AgentDescriptor::general_purpose();
        let selection = router.resolve(
            &task("misc", ""),
            "design the api",
            &candidates,
            &fallback,
        );
        assert_eq!(selection.agent.name, "specialist");
    }

    #[test]
    fn test_remaining_tie_is_lexicographic() {
        let router = AgentRouter::new();
        let candidates = vec![
            agent("zeta", &["api"], &["read"], "x"),
            agent("alpha", &["api"], &["read"], "x"),
        ];
        let fallback = AgentDescriptor::general_purpose();
        let selection = router.resolve(&task("misc", ""), "api work", &candidates, &fallback);
        assert_eq!(selection.agent.name, "alpha");
    }

    #[test]
    fn test_no_match_falls_back() {
        let router = AgentRouter::new();
        let candidates = vec![agent("frontend-dev", &["frontend"], &["read"], "UIs")];
        let fallback = AgentDescriptor::general_purpose();
        let selection = router.resolve(
            &task("ops", "rotate the credentials"),
            "rotate credentials",
            &candidates,
            &fallback,
        );
        assert_eq!(selection.agent.name, "general-purpose");
        assert_eq!(selection.score, 0);
    }
}
