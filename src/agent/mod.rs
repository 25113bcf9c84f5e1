pub mod dispatch;
mod loop_impl;
pub mod prompt;

pub use loop_impl::{AgentConfig, AgentError, AgentProgressEvent, AgentRun, run_conversation};

use crate::llm::provider::{AssistantMessage, LlmProvider};
use crate::tools::{ToolContext, ToolRegistry};

/// A provider bound to the tool catalog and the startup system prompt.
#[derive(Debug, Clone)]
pub struct Agent<P> {
    provider: P,
    registry: ToolRegistry,
    system_prompt: String,
    config: AgentConfig,
}

impl<P: LlmProvider> Agent<P> {
    pub fn new(provider: P, system_prompt: String) -> Self {
        Self {
            provider,
            registry: ToolRegistry::standard(),
            system_prompt,
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn run<F: FnMut(AgentProgressEvent)>(
        &self,
        ctx: &ToolContext<'_>,
        messages: Vec<AssistantMessage>,
        on_event: &mut F,
    ) -> Result<AgentRun, AgentError> {
        run_conversation(
            &self.provider,
            &self.registry,
            ctx,
            &self.system_prompt,
            messages,
            &self.config,
            on_event,
        )
        .await
    }
}
