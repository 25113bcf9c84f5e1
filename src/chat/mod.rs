//! Turn orchestration: validates a question, replays the caller's history into
//! the agent, and turns the run (or its failure) into a [`ChatResponse`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;

use crate::agent::{Agent, AgentConfig, AgentError, AgentProgressEvent};
use crate::chart::{ChartKind, ChartPayload, ChartSlot};
use crate::data::DatasetSource;
use crate::llm::AnyProvider;
use crate::llm::provider::{AssistantMessage, AssistantRole, LlmProvider};
use crate::tools::{ToolContext, ToolError};

pub const NO_TEXT_FALLBACK: &str =
    "I processed your request but couldn't generate a text response. Please try rephrasing.";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const LOG_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub chart_base64: Option<String>,
    pub chart_type: Option<ChartKind>,
    pub error: Option<FailureKind>,
}

impl ChatResponse {
    pub fn failure(kind: FailureKind) -> Self {
        AgentResult::failure(kind).into()
    }
}

/// Outcome of one turn before it is flattened onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResult {
    pub answer: String,
    pub chart: Option<ChartPayload>,
    pub failure: Option<FailureKind>,
}

impl AgentResult {
    pub fn failure(kind: FailureKind) -> Self {
        Self {
            answer: kind.message().to_string(),
            chart: None,
            failure: Some(kind),
        }
    }
}

impl From<AgentResult> for ChatResponse {
    fn from(result: AgentResult) -> Self {
        let (chart_base64, chart_type) = match result.chart {
            Some(payload) => (Some(payload.encoded_image), Some(payload.kind)),
            None => (None, None),
        };
        Self {
            answer: result.answer,
            chart_base64,
            chart_type,
            error: result.failure,
        }
    }
}

/// Why a turn fell back to a canned answer. Serialized as the response's
/// `error` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DataUnavailable,
    AgentUnavailable,
    ToolFailure,
    ModelFailure,
    Timeout,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::DataUnavailable => "data_unavailable",
            FailureKind::AgentUnavailable => "agent_unavailable",
            FailureKind::ToolFailure => "tool_failure",
            FailureKind::ModelFailure => "model_failure",
            FailureKind::Timeout => "timeout",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            FailureKind::DataUnavailable => {
                "The Titanic dataset is currently unavailable, so I can't answer that right now."
            }
            FailureKind::AgentUnavailable => {
                "⚠️ Agent is unavailable. Check the API key in your configuration and restart."
            }
            FailureKind::ToolFailure | FailureKind::ModelFailure => {
                "Sorry, something went wrong while answering your question. Please try again."
            }
            FailureKind::Timeout => {
                "The request took too long to complete. Please try again, perhaps with a simpler question."
            }
        }
    }
}

impl From<&AgentError> for FailureKind {
    fn from(err: &AgentError) -> Self {
        match err {
            AgentError::Timeout(_) => FailureKind::Timeout,
            AgentError::Provider(_) => FailureKind::ModelFailure,
            AgentError::Tool(ToolError::DataUnavailable(_)) => FailureKind::DataUnavailable,
            AgentError::Tool(ToolError::Render(_)) => FailureKind::ToolFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Question must not be empty.")]
    EmptyQuestion,
}

/// Shared, immutable per-process service. Each call to [`ChatService::answer`]
/// gets its own chart slot.
#[derive(Debug)]
pub struct ChatService<P = AnyProvider> {
    agent: Option<Agent<P>>,
    data: Arc<DatasetSource>,
    request_timeout: Duration,
}

impl<P: LlmProvider> ChatService<P> {
    pub fn new(agent: Agent<P>, data: Arc<DatasetSource>) -> Self {
        Self {
            agent: Some(agent),
            data,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// A service whose every answer is the agent-unavailable message.
    pub fn unavailable(data: Arc<DatasetSource>) -> Self {
        Self {
            agent: None,
            data,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the request budget and rescales the agent's step and total
    /// deadlines to fit inside it.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.agent = self
            .agent
            .map(|agent| agent.with_config(AgentConfig::for_request_budget(request_timeout)));
        self
    }

    pub fn is_available(&self) -> bool {
        self.agent.is_some()
    }

    pub fn data(&self) -> &DatasetSource {
        &self.data
    }

    pub async fn answer(&self, request: ChatRequest) -> Result<ChatResponse, ValidationError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }

        let Some(agent) = &self.agent else {
            tracing::warn!(question = %preview(question), "agent unavailable");
            return Ok(ChatResponse::failure(FailureKind::AgentUnavailable));
        };

        let charts = ChartSlot::new();
        let ctx = ToolContext {
            data: &self.data,
            charts: &charts,
        };
        let messages = build_messages(&request.history, question);
        tracing::info!(
            question = %preview(question),
            history_len = request.history.len(),
            messages = messages.len(),
            "running agent"
        );

        let outcome = timeout(
            self.request_timeout,
            agent.run(&ctx, messages, &mut log_progress),
        )
        .await;

        let run = match outcome {
            Ok(Ok(run)) => run,
            Ok(Err(err)) => {
                let kind = FailureKind::from(&err);
                tracing::error!(
                    question = %preview(question),
                    error = %err,
                    code = kind.code(),
                    "agent run failed"
                );
                return Ok(ChatResponse::failure(kind));
            }
            Err(_) => {
                tracing::error!(
                    question = %preview(question),
                    timeout = ?self.request_timeout,
                    "request timed out"
                );
                return Ok(ChatResponse::failure(FailureKind::Timeout));
            }
        };

        let answer = extract_answer(&run.produced);
        let chart = charts.take();
        tracing::info!(
            answer = %preview(&answer),
            chart = ?chart.as_ref().map(|payload| payload.kind),
            degraded = run.degraded,
            "agent finished"
        );

        Ok(AgentResult {
            answer,
            chart,
            failure: None,
        }
        .into())
    }
}

/// Replays non-blank history turns in order and appends the question.
pub fn build_messages(history: &[ConversationTurn], question: &str) -> Vec<AssistantMessage> {
    history
        .iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .map(|turn| match turn.role {
            TurnRole::User => AssistantMessage::user_text(turn.content.as_str()),
            TurnRole::Assistant => AssistantMessage::model_text(turn.content.as_str()),
        })
        .chain(std::iter::once(AssistantMessage::user_text(question)))
        .collect()
}

/// The newest model message with text. Tool results and call-only model
/// messages are skipped.
pub fn extract_answer(produced: &[AssistantMessage]) -> String {
    produced
        .iter()
        .rev()
        .filter(|message| message.role == AssistantRole::Model)
        .map(|message| message.joined_text())
        .find(|text| !text.trim().is_empty())
        .unwrap_or_else(|| NO_TEXT_FALLBACK.to_string())
}

fn log_progress(event: AgentProgressEvent) {
    match event {
        AgentProgressEvent::StepStarted { step } => tracing::debug!(step, "agent step started"),
        AgentProgressEvent::ModelResponse {
            step,
            tool_calls,
            has_text,
            finish_reason,
        } => tracing::debug!(step, tool_calls, has_text, ?finish_reason, "model responded"),
        AgentProgressEvent::RepairRequested { step } => {
            tracing::debug!(step, "invalid model response, asking for a repair")
        }
        AgentProgressEvent::ToolRequest { step, id, name } => {
            tracing::debug!(step, ?id, tool = %name, "tool requested")
        }
        AgentProgressEvent::ToolResult { step, id, name, ok } => {
            tracing::debug!(step, ?id, tool = %name, ok, "tool finished")
        }
        AgentProgressEvent::Finalizing => {
            tracing::debug!("step limit reached, requesting final answer without tools")
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;

    use super::{
        ChatRequest, ChatResponse, ChatService, ConversationTurn, FailureKind, NO_TEXT_FALLBACK,
        ValidationError, build_messages, extract_answer,
    };
    use crate::agent::Agent;
    use crate::chart::ChartKind;
    use crate::data::fixtures::{passenger, sample_dataset};
    use crate::data::{Dataset, DatasetSource, Sex};
    use crate::llm::AnyProvider;
    use crate::llm::provider::{
        AssistantCandidate, AssistantInput, AssistantMessage, AssistantOutput, AssistantPart,
        AssistantRole, FinishReason, LlmError, LlmProvider,
    };

    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<AssistantOutput, LlmError>>>,
        delay: Duration,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<AssistantOutput, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(VecDeque::from(responses)),
                delay: Duration::ZERO,
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, _input: AssistantInput) -> Result<AssistantOutput, LlmError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .expect("lock")
                .pop_front()
                .expect("queued response")
        }
    }

    fn model_output(parts: Vec<AssistantPart>) -> Result<AssistantOutput, LlmError> {
        Ok(AssistantOutput {
            candidates: vec![AssistantCandidate {
                message: AssistantMessage {
                    role: AssistantRole::Model,
                    parts,
                },
                finish_reason: Some(FinishReason::Stop),
            }],
        })
    }

    fn call(name: &str) -> Result<AssistantOutput, LlmError> {
        model_output(vec![AssistantPart::FunctionCall {
            id: Some("call_1".to_string()),
            name: name.to_string(),
            args_json: json!({}),
            thought_signature: None,
        }])
    }

    fn text(text: &str) -> Result<AssistantOutput, LlmError> {
        model_output(vec![AssistantPart::text(text)])
    }

    fn service(provider: ScriptedProvider) -> ChatService<ScriptedProvider> {
        ChatService::new(
            Agent::new(provider, "system".to_string()),
            Arc::new(DatasetSource::preloaded(sample_dataset())),
        )
    }

    /// Picks a chart tool from the question, then answers once the tool
    /// result is in the transcript.
    struct ChartByQuestionProvider;

    impl LlmProvider for ChartByQuestionProvider {
        async fn generate(&self, input: AssistantInput) -> Result<AssistantOutput, LlmError> {
            tokio::task::yield_now().await;
            let last = input.messages.last().expect("question");
            if last.role == AssistantRole::Tool {
                return text("Here is your chart.");
            }
            if last.joined_text().contains("age") {
                call("age_histogram")
            } else {
                call("survival_pie_chart")
            }
        }
    }

    fn tool_message() -> AssistantMessage {
        AssistantMessage {
            role: AssistantRole::Tool,
            parts: vec![AssistantPart::FunctionResponse {
                id: None,
                name: "get_survival_rate".to_string(),
                response_json: json!({"ok": true, "result": "60.00%"}),
            }],
        }
    }

    #[test]
    fn build_messages_drops_blank_turns_and_appends_question() {
        let history = vec![
            ConversationTurn::user("How many were male?"),
            ConversationTurn::assistant("In this dataset, 40.00% were male."),
            ConversationTurn::user("Show me a chart"),
            ConversationTurn::assistant("   "),
        ];

        let messages = build_messages(&history, "What about their ages?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], AssistantMessage::user_text("How many were male?"));
        assert_eq!(messages[1].role, AssistantRole::Model);
        assert_eq!(messages[2].joined_text(), "Show me a chart");
        assert_eq!(
            messages[3],
            AssistantMessage::user_text("What about their ages?")
        );
    }

    #[test]
    fn build_messages_without_history_is_just_the_question() {
        let messages = build_messages(&[], "hi");
        assert_eq!(messages, vec![AssistantMessage::user_text("hi")]);
    }

    #[test]
    fn extract_answer_skips_tool_and_call_only_messages() {
        let produced = vec![
            AssistantMessage::model_text("earlier answer"),
            AssistantMessage {
                role: AssistantRole::Model,
                parts: vec![AssistantPart::FunctionCall {
                    id: None,
                    name: "get_survival_rate".to_string(),
                    args_json: json!({}),
                    thought_signature: None,
                }],
            },
            tool_message(),
            AssistantMessage::model_text(""),
        ];

        assert_eq!(extract_answer(&produced), "earlier answer");
    }

    #[test]
    fn extract_answer_ignores_user_text_and_falls_back() {
        let produced = vec![AssistantMessage::user_text("repair please"), tool_message()];
        assert_eq!(extract_answer(&produced), NO_TEXT_FALLBACK);
        assert_eq!(extract_answer(&[]), NO_TEXT_FALLBACK);
    }

    #[test]
    fn request_history_defaults_to_empty() {
        let request: ChatRequest =
            serde_json::from_value(json!({"question": "hi"})).expect("request");
        assert!(request.history.is_empty());

        let request: ChatRequest = serde_json::from_value(json!({
            "question": "and women?",
            "history": [{"role": "assistant", "content": "40% male"}]
        }))
        .expect("request");
        assert_eq!(request.history, vec![ConversationTurn::assistant("40% male")]);
    }

    #[test]
    fn failure_response_serializes_error_code() {
        let value = serde_json::to_value(ChatResponse::failure(FailureKind::Timeout))
            .expect("serialize");
        assert_eq!(value["error"], json!("timeout"));
        assert_eq!(value["chart_base64"], json!(null));
        assert_eq!(value["chart_type"], json!(null));
        assert_eq!(FailureKind::ModelFailure.code(), "model_failure");
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_the_agent() {
        let service = service(ScriptedProvider::new(vec![]));
        let err = service
            .answer(ChatRequest::new("   \n"))
            .await
            .expect_err("validation");
        assert_eq!(err, ValidationError::EmptyQuestion);
        assert_eq!(err.to_string(), "Question must not be empty.");
    }

    #[tokio::test]
    async fn unavailable_agent_answers_with_fixed_message() {
        let service: ChatService<AnyProvider> =
            ChatService::unavailable(Arc::new(DatasetSource::new("/missing.csv")));

        let response = service
            .answer(ChatRequest::new("How many survived?"))
            .await
            .expect("degraded answer");

        assert_eq!(response, ChatResponse::failure(FailureKind::AgentUnavailable));
        assert!(response.answer.contains("Agent is unavailable"));
        assert!(!service.is_available());
    }

    #[tokio::test]
    async fn text_question_has_no_chart() {
        let service = service(ScriptedProvider::new(vec![
            call("get_male_percentage"),
            text("In this dataset, 40.00% of passengers were male."),
        ]));

        let response = service
            .answer(ChatRequest::new("What percentage were male?"))
            .await
            .expect("answer");

        assert!(response.answer.contains("40.00%"));
        assert_eq!(response.chart_base64, None);
        assert_eq!(response.chart_type, None);
        assert_eq!(response.error, None);
    }

    #[tokio::test]
    async fn chart_question_attaches_chart() {
        let service = service(ScriptedProvider::new(vec![
            call("age_histogram"),
            text("Most passengers in this dataset were young adults."),
        ]));

        let response = service
            .answer(ChatRequest::new("Show me a histogram of ages"))
            .await
            .expect("answer");

        assert_eq!(response.chart_type, Some(ChartKind::AgeHistogram));
        let encoded = response.chart_base64.expect("chart data");
        assert!(encoded.starts_with("iVBORw0KGgo"));
        assert!(!response.answer.is_empty());
        assert!(!response.answer.contains(&encoded));
    }

    #[tokio::test]
    async fn chart_does_not_leak_into_next_request() {
        let service = service(ScriptedProvider::new(vec![
            call("survival_pie_chart"),
            text("Here is the survival split."),
            text("The dataset has 15 records."),
        ]));

        let first = service
            .answer(ChatRequest::new("survival pie"))
            .await
            .expect("first");
        let second = service
            .answer(ChatRequest::new("how many records?"))
            .await
            .expect("second");

        assert_eq!(first.chart_type, Some(ChartKind::SurvivalPieChart));
        assert_eq!(second.chart_type, None);
        assert_eq!(second.chart_base64, None);
    }

    #[tokio::test]
    async fn provider_failure_becomes_model_failure() {
        let service = service(ScriptedProvider::new(vec![Err(LlmError::Transport(
            "connection refused".to_string(),
        ))]));

        let response = service
            .answer(ChatRequest::new("How many survived?"))
            .await
            .expect("answer");

        assert_eq!(response, ChatResponse::failure(FailureKind::ModelFailure));
    }

    #[tokio::test]
    async fn missing_dataset_becomes_data_unavailable() {
        let service = ChatService::new(
            Agent::new(
                ScriptedProvider::new(vec![call("get_total_passengers")]),
                "system".to_string(),
            ),
            Arc::new(DatasetSource::new("/missing/titanic.csv")),
        );

        let response = service
            .answer(ChatRequest::new("How many passengers?"))
            .await
            .expect("answer");

        assert_eq!(response.error, Some(FailureKind::DataUnavailable));
        assert_eq!(response.chart_base64, None);
    }

    #[tokio::test]
    async fn slow_request_times_out() {
        let mut provider = ScriptedProvider::new(vec![text("too late")]);
        provider.delay = Duration::from_secs(5);
        let service = service(provider).with_request_timeout(Duration::from_millis(50));

        let response = service
            .answer(ChatRequest::new("anything"))
            .await
            .expect("answer");

        assert_eq!(response, ChatResponse::failure(FailureKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn long_request_budget_allows_slow_model_step() {
        let mut provider =
            ScriptedProvider::new(vec![text("In this dataset, 60.00% of passengers survived.")]);
        provider.delay = Duration::from_secs(25);
        let service = service(provider).with_request_timeout(Duration::from_secs(120));

        let response = service
            .answer(ChatRequest::new("How many survived?"))
            .await
            .expect("answer");

        assert_eq!(response.error, None);
        assert_eq!(
            response.answer,
            "In this dataset, 60.00% of passengers survived."
        );
    }

    #[tokio::test]
    async fn concurrent_requests_keep_their_own_charts() {
        let service = Arc::new(ChatService::new(
            Agent::new(ChartByQuestionProvider, "system".to_string()),
            Arc::new(DatasetSource::preloaded(sample_dataset())),
        ));

        let (ages, survival) = tokio::join!(
            service.answer(ChatRequest::new("Show the age distribution")),
            service.answer(ChatRequest::new("Show who survived as a pie")),
        );
        let ages = ages.expect("ages answer");
        let survival = survival.expect("survival answer");

        assert_eq!(ages.chart_type, Some(ChartKind::AgeHistogram));
        assert_eq!(survival.chart_type, Some(ChartKind::SurvivalPieChart));
        assert_ne!(ages.chart_base64, survival.chart_base64);
        assert_eq!(ages.error, None);
        assert_eq!(survival.error, None);
    }

    #[tokio::test]
    async fn chart_without_data_becomes_tool_failure() {
        let data = Dataset::from_passengers(vec![
            passenger("Braund, Mr. Owen Harris", Sex::Male, Some(7.25)),
            passenger("Heikkinen, Miss. Laina", Sex::Female, Some(7.925)),
        ]);
        let service = ChatService::new(
            Agent::new(
                ScriptedProvider::new(vec![call("age_histogram")]),
                "system".to_string(),
            ),
            Arc::new(DatasetSource::preloaded(data)),
        );

        let response = service
            .answer(ChatRequest::new("Show me a histogram of ages"))
            .await
            .expect("answer");

        assert_eq!(response, ChatResponse::failure(FailureKind::ToolFailure));
        assert_eq!(response.chart_base64, None);
    }
}
