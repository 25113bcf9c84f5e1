pub mod gemini;
pub mod groq;
pub mod provider;

use std::fmt;
use std::str::FromStr;

use gemini::GeminiProvider;
use groq::GroqProvider;
use provider::{AssistantInput, AssistantOutput, LlmProvider, LlmResult};

use crate::http::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Groq,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Groq => GroqProvider::NAME,
            ProviderKind::Gemini => GeminiProvider::NAME,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Groq => GroqProvider::DEFAULT_MODEL,
            ProviderKind::Gemini => GeminiProvider::DEFAULT_MODEL,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Groq => GroqProvider::DEFAULT_BASE_URL,
            ProviderKind::Gemini => GeminiProvider::DEFAULT_BASE_URL,
        }
    }

    /// Environment variable prefix for provider-specific settings.
    pub fn env_prefix(self) -> &'static str {
        match self {
            ProviderKind::Groq => "GROQ",
            ProviderKind::Gemini => "GEMINI",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(ProviderKind::Groq),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(format!("unknown provider '{other}' (expected groq or gemini)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
}

/// Provider chosen at startup from configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Groq(GroqProvider),
    Gemini(GeminiProvider),
}

impl AnyProvider {
    pub fn new(kind: ProviderKind, http: HttpClient, settings: ProviderSettings) -> LlmResult<Self> {
        Ok(match kind {
            ProviderKind::Groq => AnyProvider::Groq(GroqProvider::new(http, settings)?),
            ProviderKind::Gemini => AnyProvider::Gemini(GeminiProvider::new(http, settings)?),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            AnyProvider::Groq(_) => ProviderKind::Groq,
            AnyProvider::Gemini(_) => ProviderKind::Gemini,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            AnyProvider::Groq(provider) => provider.model(),
            AnyProvider::Gemini(provider) => provider.model(),
        }
    }
}

impl LlmProvider for AnyProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        match self {
            AnyProvider::Groq(provider) => provider.generate(input).await,
            AnyProvider::Gemini(provider) => provider.generate(input).await,
        }
    }
}
