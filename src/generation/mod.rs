//! Language-model capability and backends.
//!
//! The [`Generator`] trait is a single chat-completion call. Both the
//! [query rewriter](crate::rewriter) and the
//! [answer generator](crate::answer) are built on it, so a backend only has
//! to implement one method.
//!
//! | Config Value | Backend |
//! |--------------|---------|
//! | `"openai"` | [`OpenAIGenerator`] (`POST {base_url}/chat/completions`) |
//! | `"ollama"` | [`OllamaGenerator`] (`POST /api/chat`) |
//!
//! Failures surface as [`Error::GenerationService`] and are not retried.

mod ollama;
mod openai;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::models::{ConversationTurn, Role};

pub use ollama::OllamaGenerator;
pub use openai::OpenAIGenerator;

/// Author of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message sent to the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        let role = match turn.role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        };
        Self {
            role,
            content: turn.content.clone(),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Send `messages` and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Create the [`Generator`] selected by `config.provider`.
pub fn create_generator(config: &LlmConfig, api_key: Option<&str>) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => {
            let key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                Error::Configuration(format!(
                    "{} must be set for the openai llm provider",
                    crate::config::API_KEY_ENV
                ))
            })?;
            Ok(Arc::new(OpenAIGenerator::new(config, key)?))
        }
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => Err(Error::Configuration(format!(
            "unknown llm provider: {}",
            other
        ))),
    }
}
