//! Maestro - multi-agent orchestration runtime
//!
//! A user submits a natural-language task; the runtime decomposes it into a
//! dependency graph of typed subtasks, dispatches each subtask to a
//! specialized agent, coordinates concurrent execution through a shared
//! blackboard, applies phase-gated guardrails, and synthesizes a final
//! result. Features:
//! - Rule-based task planner producing validated DAGs
//! - Readiness-driven scheduler with bounded concurrency, retries,
//!   timeouts, and cancellation
//! - Concurrent event-emitting blackboard for statuses, artifacts, and
//!   inter-agent notes
//! - Hot-reloading agent registry backed by markdown descriptors
//! - Text/vision content routing with model fallback chains
//! - Metadata -> Pareto -> Strategic -> Execution phase state machine

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{AgentDescriptor, Task, TaskDag, TaskStatus};
pub use services::{
    Blackboard, ContentRouter, GuardrailManager, PhaseOrchestrator, Scheduler, SessionOutcome,
    TaskPlanner,
};
