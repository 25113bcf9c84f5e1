use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProviderSettings;
use super::provider::{
    AssistantCandidate, AssistantInput, AssistantMessage, AssistantOutput, AssistantPart,
    AssistantRole, FinishReason, FunctionDeclaration, LlmError, LlmProvider, LlmResult,
    ToolCallingMode, error_body_excerpt, require_api_key,
};
use crate::http::{Credential, HttpClient};

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

impl GeminiProvider {
    pub const NAME: &'static str = "gemini";
    pub const DEFAULT_MODEL: &'static str = "gemini-3-flash-preview";
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

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
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_request(&self, input: &AssistantInput) -> GeminiGenerateRequest {
        let declarations: Vec<GeminiFunctionDeclaration> = input
            .tools
            .iter()
            .map(GeminiFunctionDeclaration::from_declaration)
            .collect();
        let has_tools = !declarations.is_empty();

        GeminiGenerateRequest {
            contents: input.messages.iter().map(to_gemini_content).collect(),
            system_instruction: input.system_instruction.as_ref().map(|text| {
                GeminiSystemInstruction {
                    parts: vec![GeminiPart::text(text.clone())],
                }
            }),
            tools: if has_tools {
                vec![GeminiTool {
                    function_declarations: declarations,
                }]
            } else {
                Vec::new()
            },
            tool_config: has_tools.then(|| GeminiToolConfig {
                function_calling_config: GeminiFunctionCallingConfig {
                    mode: match input.tool_calling_mode {
                        ToolCallingMode::Auto => "AUTO",
                        ToolCallingMode::None => "NONE",
                    },
                },
            }),
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

impl LlmProvider for GeminiProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        let payload = self.build_request(&input);
        let response = self
            .http
            .post_json(&self.endpoint(), Credential::QueryKey(&self.api_key), &payload)
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !response.is_success() {
            return Err(LlmError::HttpStatus {
                status: response.status,
                body: error_body_excerpt(&response.body),
            });
        }

        let parsed = serde_json::from_str::<GeminiGenerateResponse>(&response.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        Ok(AssistantOutput {
            candidates: parsed
                .candidates
                .into_iter()
                .map(GeminiCandidate::into_candidate)
                .collect(),
        })
    }
}

fn to_gemini_content(message: &AssistantMessage) -> GeminiContent {
    let role = match message.role {
        AssistantRole::Model => "model",
        // Function responses travel in user turns.
        AssistantRole::User | AssistantRole::Tool => "user",
    };
    let parts = message
        .parts
        .iter()
        .map(|part| match part {
            AssistantPart::Text {
                text,
                thought_signature,
            } => GeminiPart {
                text: Some(text.clone()),
                thought_signature: thought_signature.clone(),
                ..GeminiPart::default()
            },
            AssistantPart::FunctionCall {
                id,
                name,
                args_json,
                thought_signature,
            } => GeminiPart {
                function_call: Some(GeminiFunctionCall {
                    id: id.clone(),
                    name: name.clone(),
                    args: args_json.clone(),
                }),
                thought_signature: thought_signature.clone(),
                ..GeminiPart::default()
            },
            AssistantPart::FunctionResponse {
                id,
                name,
                response_json,
            } => GeminiPart {
                function_response: Some(GeminiFunctionResponse {
                    id: id.clone(),
                    name: name.clone(),
                    response: response_json.clone(),
                }),
                ..GeminiPart::default()
            },
        })
        .collect();

    GeminiContent { role, parts }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::Blocked
        }
        _ => FinishReason::Other,
    }
}

fn has_parameters(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|properties| !properties.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters_json_schema: Option<Value>,
}

impl GeminiFunctionDeclaration {
    fn from_declaration(declaration: &FunctionDeclaration) -> Self {
        Self {
            name: declaration.name.clone(),
            description: declaration.description.clone(),
            parameters_json_schema: has_parameters(&declaration.parameters_json_schema)
                .then(|| declaration.parameters_json_schema.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }

    fn into_assistant_part(self) -> Option<AssistantPart> {
        if self.thought == Some(true) {
            return None;
        }
        if let Some(call) = self.function_call {
            return Some(AssistantPart::FunctionCall {
                id: call.id,
                name: call.name,
                args_json: call.args,
                thought_signature: self.thought_signature,
            });
        }
        self.text.map(|text| AssistantPart::Text {
            text,
            thought_signature: self.thought_signature,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiCandidate {
    fn into_candidate(self) -> AssistantCandidate {
        let parts = self
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(GeminiPart::into_assistant_part)
                    .collect()
            })
            .unwrap_or_default();

        AssistantCandidate {
            message: AssistantMessage {
                role: AssistantRole::Model,
                parts,
            },
            finish_reason: self.finish_reason.as_deref().map(map_finish_reason),
        }
    }
}
