//! Domain models for the Maestro runtime.

pub mod agent;
pub mod artifact;
pub mod dag;
pub mod generation;
pub mod note;
pub mod phase;
pub mod task;

pub use agent::{AgentDescriptor, AgentExample, AgentScope, TOOL_CATALOGUE};
pub use artifact::{Artifact, ArtifactDelta, ArtifactKind};
pub use dag::{Strategy, TaskDag};
pub use generation::{GenerationChunk, GenerationRequest, GenerationResponse, RequestPart};
pub use note::{Acknowledgment, Note, NoteCategory, NotePriority};
pub use phase::{
    ExecutionStep, GuardrailKind, GuardrailMessage, ParetoEntry, Phase, PhaseTransition,
    StrategicPlan, PLAN_SENTINEL,
};
pub use task::{BlockingIssue, StatusChange, Task, TaskState, TaskStatus};
