use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─── Provider ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Openai,
    Anthropic,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Openai => DEFAULT_OPENAI_BASE_URL,
            Provider::Anthropic => DEFAULT_ANTHROPIC_BASE_URL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::Openai),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

// ─── ClientConfig ─────────────────────────────────────────────────────────

/// Connection settings for one pipeline's LLM endpoint.
///
/// `api_key_var` is the environment variable the key was expected in; it is
/// only used to produce a helpful error when the key is missing.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_var: String,
    pub model: String,
    pub timeout: Duration,
    /// Only sent to Anthropic, which requires it.
    pub max_tokens: u32,
}

impl ClientConfig {
    pub fn new(provider: Provider, api_key_var: impl Into<String>) -> Self {
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            api_key: None,
            api_key_var: api_key_var.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
            max_tokens: 8192,
        }
    }

    pub fn chat_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.provider {
            Provider::Openai => format!("{base}/chat/completions"),
            Provider::Anthropic => format!("{base}/messages"),
        }
    }
}

// ─── OpenAI-compatible wire types ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenaiRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenaiResponse {
    #[serde(default)]
    pub choices: Vec<OpenaiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenaiChoice {
    pub message: OpenaiChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenaiChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// ─── Anthropic Messages wire types ────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
}

/// `content[]` blocks; only `text` blocks carry the answer.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}
