//! Configuration management for the Maestro runtime.

mod loader;

pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agents: AgentsConfig,
    pub scheduler: SchedulerSettings,
    pub guardrails: GuardrailSettings,
    pub router: RouterSettings,
    pub planner: PlannerSettings,
    pub logging: LoggingConfig,
}

/// Agent descriptor discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Project-local agents directory (relative to the working directory).
    pub project_dir: String,
    /// User-global agents directory. Defaults to `~/.maestro/agents`,
    /// resolved at startup.
    pub user_dir: Option<String>,
    /// Whether to watch the roots and hot-reload on change.
    pub hot_reload: bool,
    /// Reload debounce in milliseconds (minimum 100).
    pub debounce_ms: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            project_dir: ".maestro/agents".to_string(),
            user_dir: None,
            hot_reload: true,
            debounce_ms: 100,
        }
    }
}

/// Scheduler and executor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Concurrency cap. Unset means min(task count, CPU count x 2).
    pub max_concurrency: Option<usize>,
    /// Per-task timeout in milliseconds. 0 = unbounded.
    pub per_task_timeout_ms: u64,
    /// Overall session deadline in milliseconds. 0 = unbounded.
    pub session_deadline_ms: u64,
    pub max_retries: u32,
    pub backoff: BackoffSettings,
    /// Grace window after cancellation before in-flight units are aborted.
    pub grace_period_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            per_task_timeout_ms: 600_000,
            session_deadline_ms: 1_800_000,
            max_retries: 3,
            backoff: BackoffSettings::default(),
            grace_period_ms: 5_000,
        }
    }
}

/// Exponential backoff settings for transient provider errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub base_ms: u64,
    pub factor: f64,
    pub cap_ms: u64,
    /// Randomization factor; 0.2 = ±20% jitter.
    pub jitter: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_ms: 500,
            factor: 2.0,
            cap_ms: 30_000,
            jitter: 0.2,
        }
    }
}

/// Guardrail behavior toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailSettings {
    pub enabled: bool,
    pub phase_transition_messages: bool,
    pub tool_call_validation: bool,
    pub retry_enabled: bool,
}

impl Default for GuardrailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            phase_transition_messages: true,
            tool_call_validation: true,
            retry_enabled: true,
        }
    }
}

/// Content routing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// One of: explicit, tool-based, auto.
    pub strategy: String,
    pub fallback_to_text: bool,
    pub provider: String,
    pub text_model: String,
    pub vision_model: String,
    /// Ordered secondary models tried once each on fallback.
    pub fallback_models: Vec<String>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            strategy: "auto".to_string(),
            fallback_to_text: true,
            provider: "anthropic".to_string(),
            text_model: "claude-sonnet-4-20250514".to_string(),
            vision_model: "claude-opus-4-20250514".to_string(),
            fallback_models: vec!["claude-3-5-haiku-20241022".to_string()],
        }
    }
}

/// Planner preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub max_tasks: Option<usize>,
    /// One of: high, medium, low.
    pub detail_level: String,
    /// One of: high, medium, low.
    pub parallelism_preference: String,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_tasks: None,
            detail_level: "medium".to_string(),
            parallelism_preference: "medium".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of: trace, debug, info, warn, error.
    pub level: String,
    /// One of: json, pretty.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
