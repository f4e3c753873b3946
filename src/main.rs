//! Maestro CLI entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use maestro::cli::{render_agent_list, render_session_result, AgentCommands, Cli, Commands};
use maestro::infrastructure::config::{Config, ConfigLoader};
use maestro::infrastructure::logging;
use maestro::infrastructure::providers::GeneratorRegistry;
use maestro::services::{
    AgentRegistry, Blackboard, ContentRouter, ContentRouterConfig, GuardrailConfig,
    GuardrailManager, PhaseOrchestrator, PhaseOrchestratorConfig, PlannerPreferences,
    PreferenceLevel, RoutingStrategy, SchedulerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    logging::init(&config.logging);

    let registry = build_agent_registry(&config)?;

    match cli.command {
        Commands::Agents(agent_cmd) => match agent_cmd {
            AgentCommands::List => {
                let agents = registry.list();
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&agents)?);
                } else {
                    println!("{}", render_agent_list(&agents));
                }
            }
            AgentCommands::Show { name } => {
                let agent = registry.get(&name)?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&agent)?);
                } else {
                    print!("{}", agent.to_markdown());
                }
            }
        },
        Commands::Run {
            query,
            task_id,
            max_tasks,
        } => {
            let orchestrator = build_orchestrator(&config, Arc::clone(&registry), max_tasks)?;
            let cancel = cancel_on_ctrl_c();
            let result = orchestrator.run(&query, task_id, cancel).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "task_id": result.task_id,
                        "outcome": result.outcome.to_string(),
                        "error": result.error,
                    })
                );
            } else {
                print!("{}", render_session_result(&result));
            }
        }
        Commands::Use { agent, query } => {
            let orchestrator = build_orchestrator(&config, Arc::clone(&registry), None)?;
            let cancel = cancel_on_ctrl_c();
            let result = orchestrator.run_with_agent(&agent, &query, cancel).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "task_id": result.task_id,
                        "outcome": result.outcome.to_string(),
                        "error": result.error,
                    })
                );
            } else {
                print!("{}", render_session_result(&result));
            }
        }
    }

    Ok(())
}

/// Build the agent registry over the configured roots and start the
/// hot-reload watchers.
fn build_agent_registry(config: &Config) -> Result<Arc<AgentRegistry>> {
    let project_dir = Some(PathBuf::from(&config.agents.project_dir));
    let user_dir = config
        .agents
        .user_dir
        .clone()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".maestro/agents"))
        });

    let registry = AgentRegistry::new(project_dir, user_dir);
    if config.agents.hot_reload {
        if let Err(e) = registry.watch(config.agents.debounce_ms) {
            tracing::warn!(error = %e, "Agent hot-reload unavailable");
        }
    }
    Ok(registry)
}

/// Wire providers, routers, guardrails, and the orchestrator from config.
fn build_orchestrator(
    config: &Config,
    registry: Arc<AgentRegistry>,
    max_tasks: Option<usize>,
) -> Result<Arc<PhaseOrchestrator>> {
    // Credentials are opaque; only presence matters here.
    let api_key = std::env::var("MAESTRO_API_KEY")
        .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
        .unwrap_or_default();
    let providers = GeneratorRegistry::with_builtins(&api_key);

    let provider = &config.router.provider;
    let text = providers
        .create(provider, &config.router.text_model)
        .context("Failed to build text generator")?;
    let vision = providers
        .create(provider, &config.router.vision_model)
        .context("Failed to build vision generator")?;
    let fallback_chain = config
        .router
        .fallback_models
        .iter()
        .map(|model| providers.create(provider, model))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to build fallback generators")?;

    let strategy = RoutingStrategy::from_str(&config.router.strategy)
        .context("Invalid router strategy")?;
    let content_router = Arc::new(
        ContentRouter::new(
            text,
            vision,
            ContentRouterConfig {
                strategy,
                fallback_to_text: config.router.fallback_to_text,
            },
        )
        .with_fallback_chain(fallback_chain),
    );

    let guardrails = Arc::new(GuardrailManager::new(GuardrailConfig {
        enabled: config.guardrails.enabled,
        phase_transition_messages: config.guardrails.phase_transition_messages,
        tool_call_validation: config.guardrails.tool_call_validation,
        retry_enabled: config.guardrails.retry_enabled,
    }));

    let scheduler_config = SchedulerConfig {
        max_concurrency: config.scheduler.max_concurrency,
        per_task_timeout: duration_or_unbounded(config.scheduler.per_task_timeout_ms),
        session_deadline: duration_or_unbounded(config.scheduler.session_deadline_ms),
        max_retries: config.scheduler.max_retries,
        backoff: maestro::infrastructure::providers::RetryPolicy::new(
            config.scheduler.max_retries,
            config.scheduler.backoff.base_ms,
            config.scheduler.backoff.factor,
            config.scheduler.backoff.cap_ms,
            config.scheduler.backoff.jitter,
        ),
        grace_period: std::time::Duration::from_millis(config.scheduler.grace_period_ms),
    };

    let preferences = PlannerPreferences {
        max_tasks: max_tasks.or(config.planner.max_tasks),
        detail_level: PreferenceLevel::from_str(&config.planner.detail_level)
            .unwrap_or(PreferenceLevel::Medium),
        parallelism: PreferenceLevel::from_str(&config.planner.parallelism_preference)
            .unwrap_or(PreferenceLevel::Medium),
    };

    Ok(Arc::new(PhaseOrchestrator::new(
        registry,
        Arc::new(Blackboard::new()),
        content_router,
        guardrails,
        PhaseOrchestratorConfig {
            scheduler: scheduler_config,
            preferences,
            project_context: None,
        },
    )))
}

fn duration_or_unbounded(ms: u64) -> Option<std::time::Duration> {
    (ms > 0).then(|| std::time::Duration::from_millis(ms))
}

/// A token cancelled by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling session");
            trigger.cancel();
        }
    });
    cancel
}
