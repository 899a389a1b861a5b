use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{var} is not set (export {var}=sk-...)")]
    MissingApiKey { var: String },

    #[error("unknown LLM provider '{0}': expected 'openai' or 'anthropic'")]
    UnknownProvider(String),

    #[error("{provider} API error {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("Failed to parse JSON answer: {source}\n  text: {text}")]
    Parse {
        text: String,
        #[source]
        source: serde_json::Error,
    },
}
