use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrency: {0}. Must be at least 1")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid router strategy: {0}. Must be one of: explicit, tool-based, auto")]
    InvalidRouterStrategy(String),

    #[error("Invalid planner level: {0}. Must be one of: high, medium, low")]
    InvalidPlannerLevel(String),

    #[error("Invalid planner max_tasks: 0. Must be at least 1")]
    InvalidMaxTasks,

    #[error(
        "Invalid backoff configuration: base_ms ({0}) must be less than cap_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid backoff jitter: {0}. Must be within [0, 1)")]
    InvalidJitter(f64),

    #[error("Invalid agents debounce_ms: {0}. Must be at least 100")]
    InvalidDebounce(u64),

    #[error("Agents project_dir cannot be empty")]
    EmptyAgentsDir,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .maestro/config.yaml (project config)
    /// 3. .maestro/local.yaml (project local overrides, optional)
    /// 4. Environment variables (MAESTRO_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.maestro/) so several
    /// sessions on one machine can target different projects.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".maestro/config.yaml"))
            .merge(Yaml::file(".maestro/local.yaml"))
            .merge(Env::prefixed("MAESTRO_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if let Some(c) = config.scheduler.max_concurrency {
            if c == 0 {
                return Err(ConfigError::InvalidMaxConcurrency(c));
            }
        }

        let backoff = &config.scheduler.backoff;
        if backoff.base_ms >= backoff.cap_ms {
            return Err(ConfigError::InvalidBackoff(backoff.base_ms, backoff.cap_ms));
        }
        if !(0.0..1.0).contains(&backoff.jitter) {
            return Err(ConfigError::InvalidJitter(backoff.jitter));
        }

        let valid_strategies = ["explicit", "tool-based", "auto"];
        if !valid_strategies.contains(&config.router.strategy.as_str()) {
            return Err(ConfigError::InvalidRouterStrategy(
                config.router.strategy.clone(),
            ));
        }

        let valid_levels = ["high", "medium", "low"];
        if !valid_levels.contains(&config.planner.detail_level.as_str()) {
            return Err(ConfigError::InvalidPlannerLevel(
                config.planner.detail_level.clone(),
            ));
        }
        if !valid_levels.contains(&config.planner.parallelism_preference.as_str()) {
            return Err(ConfigError::InvalidPlannerLevel(
                config.planner.parallelism_preference.clone(),
            ));
        }
        if config.planner.max_tasks == Some(0) {
            return Err(ConfigError::InvalidMaxTasks);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.agents.project_dir.is_empty() {
            return Err(ConfigError::EmptyAgentsDir);
        }
        if config.agents.debounce_ms < 100 {
            return Err(ConfigError::InvalidDebounce(config.agents.debounce_ms));
        }

        Ok(())
    }
}
