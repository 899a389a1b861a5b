//! `llm-client`: the external chat-completion boundary for specgov.
//!
//! The ingest and taskgen pipelines only need "send a system + user prompt,
//! get text back". That contract is the [`ChatClient`] trait; the pipelines
//! take `&dyn ChatClient` so tests can substitute canned answers.
//!
//! ```text
//! ClientConfig ──► HttpChatClient ──► POST {base}/chat/completions  (openai)
//!                                 └─► POST {base}/messages          (anthropic)
//! ```

pub mod error;
pub mod http;
pub mod response;
pub mod types;

pub use error::LlmError;
pub use http::{HttpChatClient, LazyChatClient};
pub use response::extract_json;
pub use types::{ClientConfig, Provider};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;

/// A blocking chat-completion endpoint.
pub trait ChatClient {
    /// Send one system + user exchange and return the assistant's text.
    fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Short label for logs, e.g. `openai/gpt-4o`.
    fn describe(&self) -> String {
        "chat-client".to_string()
    }
}
