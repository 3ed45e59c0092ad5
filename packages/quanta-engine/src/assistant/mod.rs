//! Generative-text helpers: the results narrative and the lab chat assistant.

pub mod chat;
pub mod gemini;

pub use chat::{ChatSession, ResultsAnalyst, CHAT_GREETING, SYSTEM_INSTRUCTION};
pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    #[error("No API key configured")]
    MissingApiKey,
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Model returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Network(err.to_string())
    }
}

/// A text generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Single-shot completion.
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError>;

    /// Multi-turn completion. `history` excludes `message`.
    async fn chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, AssistantError>;
}
