use super::{ensure_success, BackendInfo, InferenceBackend};
use crate::errors::BackendError;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use std::time::Duration;

/// Backend for any OpenAI-compatible chat completions API (OpenAI, vLLM)
///
/// `base_url` is expected to include the version prefix, e.g. `https://api.openai.com/v1`.
#[derive(Debug)]
pub struct OpenAiProvider {
    info: BackendInfo,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(info: BackendInfo) -> Self {
        OpenAiProvider {
            info,
            client: Client::new(),
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.info.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[async_trait]
impl InferenceBackend for OpenAiProvider {
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
        let request_body = json!({
          "model": self.info.model,
          "messages": messages,
          "temperature": 0.7
        });

        let req = self
            .client
            .post(self.info.endpoint("chat/completions")?)
            .json(&request_body);
        let res = self.authorize(req).send().await?;
        let res = ensure_success(res).await?;

        let json_resp: serde_json::Value = res.json().await?;
        if let Some(content) = json_resp["choices"][0]["message"]["content"].as_str() {
            Ok(content.trim().to_string())
        } else {
            Err(BackendError::InvalidResponse(
                "No content in OpenAI LLM response".into(),
            ))
        }
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let req = self.client.get(self.info.endpoint("models")?);
        let res = self.authorize(req).send().await?;
        ensure_success(res).await.map(|_| ())
    }
}
