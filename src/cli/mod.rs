//! CLI definitions and display helpers.

use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use console::style;

use crate::domain::models::AgentDescriptor;
use crate::services::{SessionOutcome, SessionResult};

/// Multi-agent orchestration runtime.
#[derive(Debug, Parser)]
#[command(name = "maestro", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a full session: plan, phase-gate, and execute a query.
    Run {
        /// The natural-language task.
        query: String,

        /// Session id (defaults to a generated `task-<epoch-ms>`).
        #[arg(long)]
        task_id: Option<String>,

        /// Consolidate the plan down toward this many tasks.
        #[arg(long)]
        max_tasks: Option<usize>,
    },

    /// Run a single agent directly, bypassing the planner.
    Use {
        /// Agent name.
        agent: String,

        /// The query handed to the agent.
        query: String,
    },

    /// Inspect the agent registry.
    #[command(subcommand)]
    Agents(AgentCommands),
}

#[derive(Debug, Subcommand)]
pub enum AgentCommands {
    /// List currently valid agents.
    List,
    /// Show one agent's full descriptor.
    Show { name: String },
}

/// Render the agent list as a table.
pub fn render_agent_list(agents: &[AgentDescriptor]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Scope", "Keywords", "Tools", "Description"]);
    for agent in agents {
        table.add_row(vec![
            Cell::new(&agent.name),
            Cell::new(agent.scope.as_str()),
            Cell::new(agent.keywords.join(", ")),
            Cell::new(agent.tools.join(", ")),
            Cell::new(truncate(&agent.description, 60)),
        ]);
    }
    table
}

/// Render a session result summary.
pub fn render_session_result(result: &SessionResult) -> String {
    let outcome = match result.outcome {
        SessionOutcome::TaskComplete => style(result.outcome.to_string()).green().bold(),
        SessionOutcome::Blocked => style(result.outcome.to_string()).yellow().bold(),
        SessionOutcome::Failed | SessionOutcome::Cancelled => {
            style(result.outcome.to_string()).red().bold()
        }
    };

    let mut out = format!("\n{}  ({})\n", outcome, result.task_id);
    if let Some(error) = &result.error {
        out.push_str(&format!("  error: {}\n", error));
    }
    if let Some(report) = &result.report {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Completed", "Failed", "Blocked", "Artifacts", "Duration"]);
        table.add_row(vec![
            Cell::new(report.completed.len()),
            Cell::new(report.failed.len()),
            Cell::new(report.blocked.len()),
            Cell::new(report.artifacts.len()),
            Cell::new(format!("{} ms", report.duration_ms)),
        ]);
        out.push_str(&format!("{}\n", table));
        if !report.critical_path.is_empty() {
            out.push_str(&format!(
                "  critical path: {}\n",
                report.critical_path.join(" -> ")
            ));
        }
        if !report.failed.is_empty() {
            out.push_str(&format!("  failed: {}\n", report.failed.join(", ")));
        }
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", clipped)
    }
}
