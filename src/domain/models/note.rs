//! Shared note domain model.
//!
//! Notes are the inter-agent messaging primitive on the blackboard: an
//! agent posts a note, targeted agents (or everyone, for a broadcast) read
//! and optionally acknowledge it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority of a shared note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for NotePriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Category of a shared note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    Info,
    Warning,
    Error,
    Question,
    Suggestion,
    Decision,
}

impl Default for NoteCategory {
    fn default() -> Self {
        Self::Info
    }
}

/// An acknowledgment recorded against a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub agent: String,
    pub response: Option<String>,
    pub at: DateTime<Utc>,
}

/// A note posted by one agent for others to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    /// Name of the agent that authored the note.
    pub author: String,
    pub title: String,
    pub body: String,
    pub priority: NotePriority,
    pub category: NoteCategory,
    /// Empty means broadcast to every agent.
    pub target_agents: Vec<String>,
    pub related_tasks: Vec<String>,
    pub related_artifacts: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Agents that have read the note.
    pub read_by: BTreeSet<String>,
    pub requires_ack: bool,
    pub acknowledgments: Vec<Acknowledgment>,
}

impl Note {
    pub fn new(
        author: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author: author.into(),
            title: title.into(),
            body: body.into(),
            priority: NotePriority::default(),
            category: NoteCategory::default(),
            target_agents: vec![],
            related_tasks: vec![],
            related_artifacts: vec![],
            created_at: Utc::now(),
            read_by: BTreeSet::new(),
            requires_ack: false,
            acknowledgments: vec![],
        }
    }

    pub fn with_priority(mut self, priority: NotePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: NoteCategory) -> Self {
        self.category = category;
        self
    }

    pub fn targeted_at(mut self, agents: Vec<String>) -> Self {
        self.target_agents = agents;
        self
    }

    pub fn requiring_ack(mut self) -> Self {
        self.requires_ack = true;
        self
    }

    /// Whether this note is addressed to the given agent.
    pub fn addressed_to(&self, agent: &str) -> bool {
        self.target_agents.is_empty() || self.target_agents.iter().any(|a| a == agent)
    }

    pub fn is_read_by(&self, agent: &str) -> bool {
        self.read_by.contains(agent)
    }

    /// Record a read.
    pub fn mark_read(&mut self, agent: &str) {
        self.read_by.insert(agent.to_string());
    }

    /// Record an acknowledgment. An ack implies a read.
    pub fn acknowledge(&mut self, agent: &str, response: Option<String>) {
        self.mark_read(agent);
        self.acknowledgments.push(Acknowledgment {
            agent: agent.to_string(),
            response,
            at: Utc::now(),
        });
    }

    pub fn is_acknowledged_by(&self, agent: &str) -> bool {
        self.acknowledgments.iter().any(|a| a.agent == agent)
    }
}
