use crate::error::LlmError;
use crate::types::{
    AnthropicRequest, AnthropicResponse, ChatMessage, ClientConfig, OpenaiRequest,
    OpenaiResponse, Provider, ResponseFormat, ANTHROPIC_VERSION,
};
use crate::{ChatClient, Result};
use std::sync::OnceLock;

/// Maximum number of response-body characters carried in an HTTP error.
const ERROR_BODY_LIMIT: usize = 500;

/// Blocking chat-completion client for OpenAI-compatible and Anthropic
/// endpoints. One request per call; the socket timeout is the only bound.
pub struct HttpChatClient {
    config: ClientConfig,
    api_key: String,
    http: reqwest::blocking::Client,
}

impl HttpChatClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_key = match config.api_key.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => {
                return Err(LlmError::MissingApiKey {
                    var: config.api_key_var.clone(),
                })
            }
        };
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn call_openai(&self, system: &str, user: &str) -> Result<String> {
        let body = OpenaiRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let resp = self
            .http
            .post(self.config.chat_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let text = self.read_success(resp)?;
        let parsed: OpenaiResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("no choices[0].message.content".into()))
    }

    fn call_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: vec![ChatMessage {
                role: "user",
                content: user,
            }],
        };
        let resp = self
            .http
            .post(self.config.chat_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()?;
        let text = self.read_success(resp)?;
        let parsed: AnthropicResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        parsed
            .content
            .into_iter()
            .find(|b| b.kind == "text" || b.kind.is_empty())
            .and_then(|b| b.text)
            .ok_or_else(|| LlmError::MalformedResponse("no text block in content[]".into()))
    }

    fn read_success(&self, resp: reqwest::blocking::Response) -> Result<String> {
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(LlmError::Http {
                provider: self.config.provider.to_string(),
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }
        Ok(text)
    }
}

impl ChatClient for HttpChatClient {
    fn complete(&self, system: &str, user: &str) -> Result<String> {
        tracing::debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            system_chars = system.len(),
            user_chars = user.len(),
            "sending chat request"
        );
        match self.config.provider {
            Provider::Openai => self.call_openai(system, user),
            Provider::Anthropic => self.call_anthropic(system, user),
        }
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.config.provider, self.config.model)
    }
}

/// Builds its [`HttpChatClient`] on the first request, so a missing API key
/// only fails runs that actually call the LLM.
pub struct LazyChatClient {
    config: ClientConfig,
    inner: OnceLock<HttpChatClient>,
}

impl LazyChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inner: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&HttpChatClient> {
        if let Some(c) = self.inner.get() {
            return Ok(c);
        }
        let built = HttpChatClient::new(self.config.clone())?;
        Ok(self.inner.get_or_init(|| built))
    }
}

impl ChatClient for LazyChatClient {
    fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.client()?.complete(system, user)
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.config.provider, self.config.model)
    }
}
