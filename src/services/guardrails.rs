//! Guardrail manager service.
//!
//! Validates the orchestrator's phase transitions and synthesizes the
//! control messages injected after phase boundaries, tool calls, and
//! sub-agent calls. All emitted messages land in an append-only buffer the
//! scheduler drains into the next model call.

use std::sync::Mutex;

use chrono::Utc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ExecutionStep, GuardrailKind, GuardrailMessage, ParetoEntry, Phase, PhaseTransition,
    PLAN_SENTINEL,
};

/// Maximum entries in a valid Pareto output.
pub const PARETO_MAX_ENTRIES: usize = 5;
/// Maximum characters per Pareto reason.
pub const PARETO_MAX_REASON_CHARS: usize = 200;
/// Token budget for the strategic plan.
pub const STRATEGIC_MAX_TOKENS: usize = 350;

/// Rough token estimate: ~4 characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Behavior toggles for the guardrail manager.
#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    /// Master switch; when off, no messages are emitted (transitions are
    /// still validated and recorded).
    pub enabled: bool,
    pub phase_transition_messages: bool,
    pub tool_call_validation: bool,
    pub retry_enabled: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phase_transition_messages: true,
            tool_call_validation: true,
            retry_enabled: true,
        }
    }
}

/// Outcome of a tool call, fed into the post-call guardrails.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    /// Raw tool output (stack trace, search hits, command output).
    pub output: String,
    /// Exit code for shell-like tools.
    pub exit_code: Option<i32>,
}

/// Guardrail manager: phase state machine plus message synthesis.
pub struct GuardrailManager {
    config: GuardrailConfig,
    buffer: Mutex<Vec<GuardrailMessage>>,
    transitions: Mutex<Vec<PhaseTransition>>,
}

impl GuardrailManager {
    pub fn new(config: GuardrailConfig) -> Self {
        Self {
            config,
            buffer: Mutex::new(vec![]),
            transitions: Mutex::new(vec![]),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GuardrailConfig::default())
    }

    // ========================================================================
    // Phase state machine
    // ========================================================================

    /// The last phase transitioned to, if any.
    pub fn current_phase(&self) -> Option<Phase> {
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|t| t.to)
    }

    /// Validate and record a phase transition, emitting the pre-phase
    /// guardrail message. The only allowed moves are the initial entry into
    /// `metadata` and `metadata -> pareto -> strategic -> execution`.
    pub fn transition(&self, to: Phase) -> DomainResult<Option<GuardrailMessage>> {
        let from = self.current_phase();
        let allowed = match from {
            None => to == Phase::Metadata,
            Some(current) => current.next() == Some(to),
        };
        if !allowed {
            return Err(DomainError::InvalidTransition { from, to });
        }

        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PhaseTransition {
                from,
                to,
                at: Utc::now(),
            });
        tracing::debug!(from = ?from, to = %to, "Phase transition");

        if !self.config.enabled || !self.config.phase_transition_messages {
            return Ok(None);
        }
        let message = phase_message(to)
            .map(|body| self.push(GuardrailKind::PhaseTransition, Some(to), body));
        Ok(message)
    }

    // ========================================================================
    // Post-call guardrails
    // ========================================================================

    /// Guardrail injected after a tool call. Unknown tools are a no-op.
    pub fn after_tool(&self, tool: &str, outcome: &ToolOutcome) -> Option<GuardrailMessage> {
        if !self.config.enabled || !self.config.tool_call_validation {
            return None;
        }
        let body = match tool {
            "debugger" => Some(
                "The debugger returned a stack trace. Open each file named in the trace \
                 and inspect the frames before proposing a fix."
                    .to_string(),
            ),
            "edit" | "write" => Some(
                "A file was modified. Run the project's test command now and confirm the \
                 change did not break anything."
                    .to_string(),
            ),
            "search" | "grep" | "glob" => Some(
                "Search results are in. Open the top results and read the surrounding \
                 code before acting on them."
                    .to_string(),
            ),
            "shell" => match outcome.exit_code {
                Some(0) => Some(
                    "The command exited 0. Proceed to the next plan step.".to_string(),
                ),
                Some(code) => Some(format!(
                    "The command exited {}. Analyze the failure output and adapt the plan \
                     before retrying.",
                    code
                )),
                None => None,
            },
            _ => None,
        };
        body.map(|body| self.push(GuardrailKind::ToolCall, self.current_phase(), body))
    }

    /// Guardrail injected after a sub-agent call. Unknown agents are a
    /// no-op.
    pub fn after_subagent(&self, agent: &str) -> Option<GuardrailMessage> {
        if !self.config.enabled || !self.config.tool_call_validation {
            return None;
        }
        let body = match agent {
            "debugger" => Some(
                "The debugger agent finished. Read every source file it referenced \
                 before continuing."
                    .to_string(),
            ),
            "planner" => Some(
                "The planner agent revised the plan. Gather the architectural context \
                 the revised plan touches before executing it."
                    .to_string(),
            ),
            _ => None,
        };
        body.map(|body| self.push(GuardrailKind::ToolCall, self.current_phase(), body))
    }

    // ========================================================================
    // Output validation
    // ========================================================================

    /// Validate a Pareto phase output: a list of at most five
    /// `{path, reason}` entries with bounded reasons. On failure a
    /// validation guardrail is buffered and the error is returned.
    pub fn validate_pareto(
        &self,
        value: &serde_json::Value,
    ) -> DomainResult<Vec<ParetoEntry>> {
        let result = (|| {
            let entries = value
                .as_array()
                .ok_or_else(|| "Pareto output must be a JSON list".to_string())?;
            if entries.len() > PARETO_MAX_ENTRIES {
                return Err(format!(
                    "Pareto output has {} entries; at most {} are allowed",
                    entries.len(),
                    PARETO_MAX_ENTRIES
                ));
            }
            let mut parsed = vec![];
            for (i, entry) in entries.iter().enumerate() {
                let path = entry
                    .get("path")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| format!("entry {} is missing 'path'", i))?;
                let reason = entry
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| format!("entry {} is missing 'reason'", i))?;
                if reason.chars().count() > PARETO_MAX_REASON_CHARS {
                    return Err(format!(
                        "entry {} reason exceeds {} characters",
                        i, PARETO_MAX_REASON_CHARS
                    ));
                }
                parsed.push(ParetoEntry {
                    path: path.to_string(),
                    reason: reason.to_string(),
                });
            }
            Ok(parsed)
        })();

        match result {
            Ok(parsed) => Ok(parsed),
            Err(problem) => {
                self.push_validation(Phase::Pareto, &problem);
                Err(DomainError::ValidationFailed(problem))
            }
        }
    }

    /// Validate a Strategic phase output: the `proceed` field must equal
    /// the sentinel and the plan must fit the token budget.
    pub fn validate_strategic(&self, value: &serde_json::Value) -> DomainResult<String> {
        let result = (|| {
            let plan = value
                .get("plan")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Strategic output must carry a 'plan' string".to_string())?;
            let proceed = value
                .get("proceed")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Strategic output must carry a 'proceed' field".to_string())?;
            if proceed != PLAN_SENTINEL {
                return Err(format!(
                    "'proceed' must equal the sentinel \"{}\"",
                    PLAN_SENTINEL
                ));
            }
            let tokens = estimate_tokens(plan);
            if tokens > STRATEGIC_MAX_TOKENS {
                return Err(format!(
                    "plan is ~{} tokens; the budget is {}",
                    tokens, STRATEGIC_MAX_TOKENS
                ));
            }
            Ok(plan.to_string())
        })();

        match result {
            Ok(plan) => Ok(plan),
            Err(problem) => {
                self.push_validation(Phase::Strategic, &problem);
                Err(DomainError::ValidationFailed(problem))
            }
        }
    }

    /// Validate an Execution phase output: a list in which every element
    /// carries `thought`, `action`, and `observation`.
    pub fn validate_execution(
        &self,
        value: &serde_json::Value,
    ) -> DomainResult<Vec<ExecutionStep>> {
        let result: Result<Vec<ExecutionStep>, String> = (|| {
            let steps = value
                .as_array()
                .ok_or_else(|| "Execution output must be a JSON list".to_string())?;
            let mut parsed = vec![];
            for (i, step) in steps.iter().enumerate() {
                let field = |name: &str| {
                    step.get(name)
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .ok_or_else(|| format!("step {} is missing '{}'", i, name))
                };
                parsed.push(ExecutionStep {
                    thought: field("thought")?,
                    action: field("action")?,
                    observation: field("observation")?,
                });
            }
            Ok(parsed)
        })();

        match result {
            Ok(parsed) => Ok(parsed),
            Err(problem) => {
                self.push_validation(Phase::Execution, &problem);
                Err(DomainError::ValidationFailed(problem))
            }
        }
    }

    // ========================================================================
    // Retry guardrails
    // ========================================================================

    /// Emit the guardrail for retry attempt `attempt` (1-based). Attempts
    /// up to `max_retries` direct a same-model retry; the attempt after
    /// that emits a single fallback directive to switch models.
    pub fn retry_guardrail(&self, attempt: u32, max_retries: u32) -> Option<GuardrailMessage> {
        if !self.config.enabled || !self.config.retry_enabled {
            return None;
        }
        let (body, metadata) = if attempt <= max_retries {
            (
                format!(
                    "Attempt {} of {} failed with a transient provider error. \
                     Retry the same model.",
                    attempt, max_retries
                ),
                serde_json::json!({ "attempt": attempt, "max_retries": max_retries }),
            )
        } else {
            (
                "All retries are exhausted. Switch to the designated secondary model \
                 and try once more."
                    .to_string(),
                serde_json::json!({ "fallback": true, "max_retries": max_retries }),
            )
        };
        let message = GuardrailMessage::new(GuardrailKind::Retry, self.current_phase(), body)
            .with_metadata(metadata);
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Some(message)
    }

    // ========================================================================
    // Buffer access
    // ========================================================================

    /// All messages emitted so far, in emission order.
    pub fn messages(&self) -> Vec<GuardrailMessage> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove and return the buffered messages (consumed into the next
    /// model call).
    pub fn drain_pending(&self) -> Vec<GuardrailMessage> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// The recorded transition log.
    pub fn transition_log(&self) -> Vec<PhaseTransition> {
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Reset buffer and transition history.
    pub fn clear(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn push(&self, kind: GuardrailKind, phase: Option<Phase>, body: String) -> GuardrailMessage {
        let message = GuardrailMessage::new(kind, phase, body);
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        message
    }

    fn push_validation(&self, phase: Phase, problem: &str) {
        if !self.config.enabled {
            return;
        }
        self.push(
            GuardrailKind::Validation,
            Some(phase),
            format!(
                "The {} output failed validation: {}. Produce a corrected output that \
                 satisfies the contract exactly.",
                phase, problem
            ),
        );
    }
}

impl Default for GuardrailManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The pre-phase message injected when entering a phase.
fn phase_message(phase: Phase) -> Option<String> {
    match phase {
        Phase::Metadata => None,
        Phase::Pareto => Some(
            "Identify the files or modules where focused work yields the most impact. \
             Respond with a ranked JSON list of at most 5 entries, each carrying 'path' \
             and a quantitative 'reason'. Use deterministic decoding (temperature 0)."
                .to_string(),
        ),
        Phase::Strategic => Some(format!(
            "Write a first-person implementation plan of at most 350 tokens covering: \
             setup, ordered implementation steps, testing plan, rollback, and open \
             questions. End the plan with the exact sentence \"{}\".",
            PLAN_SENTINEL
        )),
        Phase::Execution => Some(
            "Execute the locked plan step by step. For every step, loop through \
             Thought -> Action -> Observation and record each part."
                .to_string(),
        ),
    }
}
