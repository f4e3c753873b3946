//! Phase and guardrail domain models.
//!
//! A session advances monotonically through four phases. Guardrail
//! messages are synthetic prompts injected into the next model call to
//! enforce the per-phase protocol or recover from failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed string that must terminate a well-formed strategic plan.
pub const PLAN_SENTINEL: &str = "PLAN LOCKED - PROCEED TO EXECUTION";

/// Session phase. Transitions are strictly monotonic:
/// `metadata -> pareto -> strategic -> execution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Metadata,
    Pareto,
    Strategic,
    Execution,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Pareto => "pareto",
            Self::Strategic => "strategic",
            Self::Execution => "execution",
        }
    }

    /// The only phase reachable from this one, if any. `Execution` is
    /// terminal.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Self::Metadata => Some(Self::Pareto),
            Self::Pareto => Some(Self::Strategic),
            Self::Strategic => Some(Self::Execution),
            Self::Execution => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the phase transition log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Option<Phase>,
    pub to: Phase,
    pub at: DateTime<Utc>,
}

/// Kind of guardrail message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailKind {
    PhaseTransition,
    ToolCall,
    Validation,
    Retry,
}

/// A synthetic control message injected into a subsequent model turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailMessage {
    pub kind: GuardrailKind,
    pub phase: Option<Phase>,
    pub body: String,
    pub at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl GuardrailMessage {
    pub fn new(kind: GuardrailKind, phase: Option<Phase>, body: impl Into<String>) -> Self {
        Self {
            kind,
            phase,
            body: body.into(),
            at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One ranked entry in the Pareto phase output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoEntry {
    /// File or module path.
    pub path: String,
    /// Quantitative justification for its impact.
    pub reason: String,
}

/// The Strategic phase output: a first-person implementation plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicPlan {
    pub plan: String,
    /// Must equal [`PLAN_SENTINEL`] for the plan to validate.
    pub proceed: String,
}

/// One step of the Execution phase's Thought/Action/Observation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub thought: String,
    pub action: String,
    pub observation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_progression() {
        assert_eq!(Phase::Metadata.next(), Some(Phase::Pareto));
        assert_eq!(Phase::Pareto.next(), Some(Phase::Strategic));
        assert_eq!(Phase::Strategic.next(), Some(Phase::Execution));
        assert_eq!(Phase::Execution.next(), None);
    }

    #[test]
    fn test_phase_serde_names() {
        let json = serde_json::to_string(&Phase::Pareto).unwrap();
        assert_eq!(json, "\"pareto\"");
    }
}
