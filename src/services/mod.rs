//! Application services for the Maestro runtime.

pub mod agent_registry;
pub mod agent_router;
pub mod blackboard;
pub mod content_router;
pub mod guardrails;
pub mod phase_orchestrator;
pub mod scheduler;
pub mod task_planner;

pub use agent_registry::{AgentRegistry, LoadReport};
pub use agent_router::{AgentRouter, AgentSelection};
pub use blackboard::{
    Blackboard, BlackboardEvent, BlackboardEventKind, BlackboardQuery, BlackboardSnapshot,
    SearchResults, SubscriberId,
};
pub use content_router::{
    ContentRouter, ContentRouterConfig, ModelChoice, RouterInfo, RoutingStrategy,
};
pub use guardrails::{
    estimate_tokens, GuardrailConfig, GuardrailManager, ToolOutcome, PARETO_MAX_ENTRIES,
    PARETO_MAX_REASON_CHARS, STRATEGIC_MAX_TOKENS,
};
pub use phase_orchestrator::{
    default_completion_predicate, CompletionPredicate, PhaseOrchestrator,
    PhaseOrchestratorConfig, SessionOutcome, SessionOutput, SessionResult,
};
pub use scheduler::{ScheduleReport, Scheduler, SchedulerConfig};
pub use task_planner::{Decomposition, PlannerPreferences, PreferenceLevel, TaskPlanner};
