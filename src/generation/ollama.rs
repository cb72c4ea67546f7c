use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::embedding::{http_client, DEFAULT_OLLAMA_URL};
use crate::error::{Error, Result};

use super::{ChatMessage, Generator};

const PROVIDER: &str = "ollama";

/// Chat backend using a local Ollama instance's `/api/chat` endpoint.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, messages = messages.len(), "chat completion");

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::GenerationService {
                provider: PROVIDER.to_string(),
                message: format!("connection error (is Ollama running at {}?): {}", self.url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::GenerationService {
                provider: PROVIDER.to_string(),
                message: format!("API returned {}: {}", status, text),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| Error::GenerationService {
            provider: PROVIDER.to_string(),
            message: format!("invalid response: {}", e),
        })?;

        Ok(parsed.message.content)
    }
}
