use super::{ensure_success, BackendInfo, InferenceBackend};
use crate::errors::BackendError;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Backend for a local Ollama server
#[derive(Debug)]
pub struct OllamaProvider {
    info: BackendInfo,
    client: Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider instance
    ///
    /// # Arguments
    /// * `info` - Name, base url, model and capabilities of this backend
    pub fn new(info: BackendInfo) -> Self {
        OllamaProvider {
            info,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl InferenceBackend for OllamaProvider {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn capabilities(&self) -> &[String] {
        &self.info.capabilities
    }

    fn timeout(&self) -> Duration {
        self.info.timeout
    }

    /// Calls Ollama's chat API
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, BackendError> {
        let request_body = json!({
            "model": self.info.model,
            "stream": false,
            "messages": messages
        });

        let res = self
            .client
            .post(self.info.endpoint("api/chat")?)
            .json(&request_body)
            .send()
            .await?;
        let res = ensure_success(res).await?;

        let json_resp: serde_json::Value = res.json().await?;
        if let Some(content) = json_resp["message"]["content"].as_str() {
            Ok(content.trim().to_string())
        } else {
            Err(BackendError::InvalidResponse(
                "No content in Ollama LLM response".into(),
            ))
        }
    }

    /// Lists local models, which is cheap and proves the server answers
    async fn probe(&self) -> Result<(), BackendError> {
        let res = self
            .client
            .get(self.info.endpoint("api/tags")?)
            .send()
            .await?;
        ensure_success(res).await.map(|_| ())
    }
}
