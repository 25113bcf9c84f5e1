use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProviderSettings;
use super::provider::{
    AssistantCandidate, AssistantInput, AssistantMessage, AssistantOutput, AssistantPart,
    AssistantRole, FinishReason, FunctionDeclaration, LlmError, LlmProvider, LlmResult,
    ToolCallingMode, error_body_excerpt, require_api_key,
};
use crate::http::{Credential, HttpClient};

/// OpenAI-compatible chat completions client for Groq.
#[derive(Debug, Clone)]
pub struct GroqProvider {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

impl GroqProvider {
    pub const NAME: &'static str = "groq";
    pub const DEFAULT_MODEL: &'static str = "llama-3.3-70b-versatile";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.groq.com/openai";

    pub fn new(http: HttpClient, settings: ProviderSettings) -> LlmResult<Self> {
        let api_key = require_api_key(settings.api_key, Self::NAME)?;
        Ok(Self {
            http,
            api_key,
            model: settings.model,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, input: &'a AssistantInput) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(input.messages.len() + 1);
        if let Some(system) = &input.system_instruction {
            messages.push(WireMessage::System {
                content: system.clone(),
            });
        }
        for message in &input.messages {
            push_wire_messages(&mut messages, message);
        }

        let offer_tools =
            !input.tools.is_empty() && input.tool_calling_mode == ToolCallingMode::Auto;
        let tools = if offer_tools {
            input.tools.iter().map(WireTool::from_declaration).collect()
        } else {
            Vec::new()
        };

        ChatCompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
            tool_choice: offer_tools.then_some("auto"),
            tools,
        }
    }
}

impl LlmProvider for GroqProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        let payload = self.build_request(&input);
        let response = self
            .http
            .post_json(&self.endpoint(), Credential::Bearer(&self.api_key), &payload)
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !response.is_success() {
            return Err(LlmError::HttpStatus {
                status: response.status,
                body: error_body_excerpt(&response.body),
            });
        }

        let parsed = serde_json::from_str::<ChatCompletionResponse>(&response.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        Ok(AssistantOutput {
            candidates: parsed.choices.into_iter().map(Choice::into_candidate).collect(),
        })
    }
}

fn push_wire_messages(out: &mut Vec<WireMessage>, message: &AssistantMessage) {
    match message.role {
        AssistantRole::User => out.push(WireMessage::User {
            content: message.joined_text(),
        }),
        AssistantRole::Model => {
            let text = message.joined_text();
            let tool_calls = message
                .parts
                .iter()
                .enumerate()
                .filter_map(|(index, part)| match part {
                    AssistantPart::FunctionCall {
                        id,
                        name,
                        args_json,
                        ..
                    } => Some(WireToolCall {
                        id: call_id(id.as_deref(), name, index),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: name.clone(),
                            arguments: args_json.to_string(),
                        },
                    }),
                    _ => None,
                })
                .collect();
            out.push(WireMessage::Assistant {
                content: (!text.is_empty()).then_some(text),
                tool_calls,
            });
        }
        AssistantRole::Tool => {
            for (index, part) in message.parts.iter().enumerate() {
                if let AssistantPart::FunctionResponse {
                    id,
                    name,
                    response_json,
                } = part
                {
                    out.push(WireMessage::Tool {
                        tool_call_id: call_id(id.as_deref(), name, index),
                        content: response_json.to_string(),
                    });
                }
            }
        }
    }
}

/// Groq always assigns ids; calls that arrive without one get a stable
/// synthetic id so requests and responses still pair up.
fn call_id(id: Option<&str>, name: &str, index: usize) -> String {
    id.map_or_else(|| format!("call_{name}_{index}"), str::to_string)
}

fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::MaxTokens,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::Blocked,
        _ => FinishReason::Other,
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<WireToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

impl<'a> WireTool<'a> {
    fn from_declaration(declaration: &'a FunctionDeclaration) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: &declaration.name,
                description: &declaration.description,
                parameters: &declaration.parameters_json_schema,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

impl Choice {
    fn into_candidate(self) -> AssistantCandidate {
        let mut parts = Vec::new();
        if let Some(text) = self.message.content.filter(|text| !text.trim().is_empty()) {
            parts.push(AssistantPart::text(text));
        }
        for call in self.message.tool_calls.unwrap_or_default() {
            parts.push(AssistantPart::FunctionCall {
                id: Some(call.id),
                name: call.function.name,
                args_json: parse_arguments(&call.function.arguments),
                thought_signature: None,
            });
        }

        AssistantCandidate {
            message: AssistantMessage {
                role: AssistantRole::Model,
                parts,
            },
            finish_reason: self.finish_reason.as_deref().map(map_finish_reason),
        }
    }
}
