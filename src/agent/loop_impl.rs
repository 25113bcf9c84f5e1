use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, timeout};

use crate::agent::dispatch::{FunctionCallSpec, dispatch_calls};
use crate::agent::prompt::{FINALIZE_INSTRUCTION, REPAIR_PROMPT};
use crate::llm::provider::{
    AssistantCandidate, AssistantInput, AssistantMessage, AssistantPart, AssistantRole,
    FinishReason, FunctionDeclaration, LlmError, LlmProvider, ToolCallingMode,
};
use crate::tools::{ToolContext, ToolError, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_steps: usize,
    pub per_step_timeout_ms: u64,
    pub total_timeout_ms: u64,
    pub invalid_response_retries: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 6,
            per_step_timeout_ms: 20_000,
            total_timeout_ms: 50_000,
            invalid_response_retries: 1,
        }
    }
}

impl AgentConfig {
    /// Splits a request budget into agent deadlines: a third per model step
    /// and five sixths overall, so a 60 s request gets the 20 s / 50 s defaults.
    pub fn for_request_budget(budget: Duration) -> Self {
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        Self {
            per_step_timeout_ms: budget_ms / 3,
            total_timeout_ms: budget_ms.saturating_mul(5) / 6,
            ..Self::default()
        }
    }
}

/// Messages appended during one run, in order. The caller's history is not
/// included.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRun {
    pub produced: Vec<AssistantMessage>,
    /// Set when the run ended without a regular final answer (step limit or
    /// exhausted repair attempts).
    pub degraded: bool,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model did not answer within {0:?}")]
    Timeout(Duration),
    #[error("model request failed: {0}")]
    Provider(#[from] LlmError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentProgressEvent {
    StepStarted {
        step: usize,
    },
    ModelResponse {
        step: usize,
        tool_calls: usize,
        has_text: bool,
        finish_reason: Option<FinishReason>,
    },
    RepairRequested {
        step: usize,
    },
    ToolRequest {
        step: usize,
        id: Option<String>,
        name: String,
    },
    ToolResult {
        step: usize,
        id: Option<String>,
        name: String,
        ok: bool,
    },
    Finalizing,
}

/// Drives the model/tool loop until the model answers in plain text.
///
/// `history` holds the prior turns plus the new question as its last message.
pub async fn run_conversation<P: LlmProvider, F: FnMut(AgentProgressEvent)>(
    provider: &P,
    registry: &ToolRegistry,
    ctx: &ToolContext<'_>,
    system_prompt: &str,
    history: Vec<AssistantMessage>,
    config: &AgentConfig,
    on_event: &mut F,
) -> Result<AgentRun, AgentError> {
    let history_len = history.len();
    let mut messages = history;
    let tools = registry.declarations();
    let total_budget = Duration::from_millis(config.total_timeout_ms);
    let total_deadline = Instant::now() + total_budget;
    let mut invalid_response_attempts = 0usize;

    for step in 1..=config.max_steps {
        on_event(AgentProgressEvent::StepStarted { step });

        let budget = step_budget(total_deadline, config).ok_or(AgentError::Timeout(total_budget))?;
        let input = AssistantInput {
            system_instruction: Some(system_prompt.to_string()),
            messages: messages.clone(),
            tools: tools.clone(),
            tool_calling_mode: ToolCallingMode::Auto,
        };
        let output = timeout(budget, provider.generate(input))
            .await
            .map_err(|_| AgentError::Timeout(budget))??;

        let Some(candidate) = select_candidate(&output.candidates) else {
            if invalid_response_attempts >= config.invalid_response_retries {
                return Ok(finish(messages, history_len, true));
            }
            invalid_response_attempts += 1;
            on_event(AgentProgressEvent::RepairRequested { step });
            messages.push(AssistantMessage::user_text(REPAIR_PROMPT));
            continue;
        };

        let calls = extract_function_calls(&candidate.message.parts);
        let has_text = !candidate.message.joined_text().is_empty();
        on_event(AgentProgressEvent::ModelResponse {
            step,
            tool_calls: calls.len(),
            has_text,
            finish_reason: candidate.finish_reason,
        });

        messages.push(candidate.message.clone());

        if calls.is_empty() {
            if has_text {
                return Ok(finish(messages, history_len, false));
            }
            if invalid_response_attempts >= config.invalid_response_retries {
                return Ok(finish(messages, history_len, true));
            }
            invalid_response_attempts += 1;
            on_event(AgentProgressEvent::RepairRequested { step });
            messages.push(AssistantMessage::user_text(REPAIR_PROMPT));
            continue;
        }

        for call in &calls {
            on_event(AgentProgressEvent::ToolRequest {
                step,
                id: call.id.clone(),
                name: call.name.clone(),
            });
        }

        let responses = dispatch_calls(registry, ctx, &calls)?;
        for response in &responses {
            if let AssistantPart::FunctionResponse {
                id,
                name,
                response_json,
            } = response
            {
                on_event(AgentProgressEvent::ToolResult {
                    step,
                    id: id.clone(),
                    name: name.clone(),
                    ok: response_json["ok"].as_bool().unwrap_or(false),
                });
            }
        }
        messages.push(AssistantMessage {
            role: AssistantRole::Tool,
            parts: responses,
        });
    }

    if let Some(budget) = step_budget(total_deadline, config) {
        on_event(AgentProgressEvent::Finalizing);
        if let Some(message) =
            finalize_without_tools(provider, system_prompt, &messages, tools, budget).await
        {
            messages.push(message);
        }
    }

    Ok(finish(messages, history_len, true))
}

fn finish(mut messages: Vec<AssistantMessage>, history_len: usize, degraded: bool) -> AgentRun {
    AgentRun {
        produced: messages.split_off(history_len.min(messages.len())),
        degraded,
    }
}

/// Time allowed for the next model call, or `None` once the total deadline
/// has passed.
fn step_budget(total_deadline: Instant, config: &AgentConfig) -> Option<Duration> {
    let remaining = total_deadline.checked_duration_since(Instant::now())?;
    let budget = Duration::from_millis(config.per_step_timeout_ms).min(remaining);
    (!budget.is_zero()).then_some(budget)
}

fn select_candidate(candidates: &[AssistantCandidate]) -> Option<&AssistantCandidate> {
    let usable = || candidates.iter().filter(|candidate| is_usable_candidate(candidate));

    usable()
        .find(|candidate| {
            !candidate.message.has_function_calls() && !candidate.message.joined_text().is_empty()
        })
        .or_else(|| usable().find(|candidate| candidate.message.has_function_calls()))
        .or_else(|| usable().next())
}

fn is_usable_candidate(candidate: &AssistantCandidate) -> bool {
    !candidate.message.parts.is_empty()
        && !candidate.finish_reason.is_some_and(FinishReason::is_blocked)
}

/// Last-chance request after the step limit: tools are declared but calling
/// them is disabled. Failures here are logged and swallowed.
async fn finalize_without_tools<P: LlmProvider>(
    provider: &P,
    system_prompt: &str,
    messages: &[AssistantMessage],
    tools: Vec<FunctionDeclaration>,
    budget: Duration,
) -> Option<AssistantMessage> {
    let input = AssistantInput {
        system_instruction: Some(format!("{system_prompt}\n\n{FINALIZE_INSTRUCTION}")),
        messages: messages.to_vec(),
        tools,
        tool_calling_mode: ToolCallingMode::None,
    };

    let output = match timeout(budget, provider.generate(input)).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "final no-tool request failed");
            return None;
        }
        Err(_) => {
            tracing::warn!(?budget, "final no-tool request timed out");
            return None;
        }
    };

    let candidate = select_candidate(&output.candidates)?;
    let text = candidate.message.joined_text();
    (!text.is_empty()).then(|| AssistantMessage::model_text(text))
}

fn extract_function_calls(parts: &[AssistantPart]) -> Vec<FunctionCallSpec> {
    parts
        .iter()
        .filter_map(|part| match part {
            AssistantPart::FunctionCall {
                id,
                name,
                args_json,
                ..
            } => Some(FunctionCallSpec {
                id: id.clone(),
                name: name.clone(),
                args_json: args_json.clone(),
            }),
            _ => None,
        })
        .collect()
}
