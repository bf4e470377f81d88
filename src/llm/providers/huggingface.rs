use super::{ensure_success, BackendInfo, InferenceBackend};
use crate::errors::BackendError;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use std::time::Duration;

/// Backend for the Hugging Face hosted inference API
#[derive(Debug)]
pub struct HuggingFaceProvider {
    info: BackendInfo,
    client: Client,
}

impl HuggingFaceProvider {
    pub fn new(info: BackendInfo) -> Self {
        HuggingFaceProvider {
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

    /// The text-generation endpoint takes a single prompt
    fn flatten(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl InferenceBackend for HuggingFaceProvider {
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
            "inputs": Self::flatten(&messages),
            "parameters": {
                "temperature": 0.7,
                "max_new_tokens": 2048,
                "return_full_text": false
            }
        });

        let req = self
            .client
            .post(self.info.endpoint(&self.info.model)?)
            .json(&request_body);
        let res = self.authorize(req).send().await?;
        let res = ensure_success(res).await?;

        let json_resp: serde_json::Value = res.json().await?;
        if let Some(content) = json_resp[0]["generated_text"].as_str() {
            Ok(content.trim().to_string())
        } else {
            Err(BackendError::InvalidResponse(
                "No generated_text in Hugging Face response".into(),
            ))
        }
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let req = self.client.get(self.info.endpoint(&self.info.model)?);
        let res = self.authorize(req).send().await?;
        ensure_success(res).await.map(|_| ())
    }
}
