use super::{ensure_success, BackendInfo, InferenceBackend};
use crate::errors::BackendError;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Backend for Anthropic's messages API
#[derive(Debug)]
pub struct AnthropicProvider {
    info: BackendInfo,
    client: Client,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider instance
    ///
    /// # Returns
    /// * `Err(BackendError::Configuration)` if no API key was resolved
    pub fn new(info: BackendInfo) -> Result<Self, BackendError> {
        if info.api_key.is_none() {
            return Err(BackendError::Configuration(format!(
                "backend '{}' requires an API key",
                info.name
            )));
        }
        Ok(AnthropicProvider {
            info,
            client: Client::new(),
        })
    }

    fn api_key(&self) -> &str {
        self.info.api_key.as_deref().unwrap_or_default()
    }
}

#[async_trait]
impl InferenceBackend for AnthropicProvider {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn capabilities(&self) -> &[String] {
        &self.info.capabilities
    }

    fn timeout(&self) -> Duration {
        self.info.timeout
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, BackendError> {
        let (system_messages, user_messages): (Vec<_>, Vec<_>) =
            messages.into_iter().partition(|msg| msg.role == "system");
        let system_content = system_messages
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n");

        let request_body = json!({
            "model": self.info.model,
            "system": system_content,
            "max_tokens": 4096,
            "messages": user_messages
        });

        let res = self
            .client
            .post(self.info.endpoint("v1/messages")?)
            .header("x-api-key", self.api_key())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await?;
        let res = ensure_success(res).await?;

        let json_resp: serde_json::Value = res.json().await?;
        if let Some(content) = json_resp["content"][0]["text"].as_str() {
            debug!("Anthropic response: {}", content);
            Ok(content.trim().to_string())
        } else {
            Err(BackendError::InvalidResponse(
                "No content in Anthropic LLM response".into(),
            ))
        }
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let res = self
            .client
            .get(self.info.endpoint("v1/models")?)
            .header("x-api-key", self.api_key())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await?;
        ensure_success(res).await.map(|_| ())
    }
}
