//! Artifact domain model.
//!
//! Artifacts are the stored outputs agents produce while executing tasks.
//! They are owned by the blackboard and may be updated by later tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Kind of artifact content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    File,
    Document,
    Data,
    Report,
    Config,
    Schema,
    Other,
}

impl Default for ArtifactKind {
    fn default() -> Self {
        Self::Other
    }
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Document => "document",
            Self::Data => "data",
            Self::Report => "report",
            Self::Config => "config",
            Self::Schema => "schema",
            Self::Other => "other",
        }
    }
}

/// A stored output produced by an agent during task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub name: String,
    pub kind: ArtifactKind,
    /// Filesystem location, when the content lives on disk.
    pub path: Option<String>,
    /// Inline content, when the artifact is carried in memory.
    pub content: Option<String>,
    pub summary: Option<String>,
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
    /// Id of the task whose execution produced this artifact.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
    /// Ids of artifacts this one was derived from.
    pub dependencies: Vec<Uuid>,
    pub metadata: serde_json::Value,
}

impl Artifact {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            path: None,
            content: None,
            summary: None,
            size_bytes: None,
            mime_type: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
            tags: vec![],
            dependencies: vec![],
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.size_bytes = Some(content.len() as u64);
        self.content = Some(content);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Either `path` or `content` must be populated.
    pub fn validate(&self) -> DomainResult<()> {
        if self.path.is_none() && self.content.is_none() {
            return Err(DomainError::ValidationFailed(format!(
                "artifact '{}' has neither path nor content",
                self.name
            )));
        }
        Ok(())
    }
}

/// A partial update applied to an existing artifact.
///
/// Fields left as `None` are untouched; tags are appended (deduplicated).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactDelta {
    pub content: Option<String>,
    pub path: Option<String>,
    pub summary: Option<String>,
    pub add_tags: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}

impl ArtifactDelta {
    /// Apply this delta, refreshing `updated_at`.
    pub fn apply(self, artifact: &mut Artifact) {
        if let Some(content) = self.content {
            artifact.size_bytes = Some(content.len() as u64);
            artifact.content = Some(content);
        }
        if let Some(path) = self.path {
            artifact.path = Some(path);
        }
        if let Some(summary) = self.summary {
            artifact.summary = Some(summary);
        }
        for tag in self.add_tags {
            if !artifact.tags.contains(&tag) {
                artifact.tags.push(tag);
            }
        }
        if let Some(metadata) = self.metadata {
            artifact.metadata = metadata;
        }
        artifact.updated_at = Utc::now();
    }
}
