use crate::errors::BackendError;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use reqwest::Response;
use std::fmt::Debug;
use std::time::Duration;
use url::Url;

pub mod anthropic;
pub mod huggingface;
pub mod ollama;
pub mod openai;

/// An inference service able to serve one or more model capabilities.
#[async_trait]
pub trait InferenceBackend: Debug + Send + Sync {
    /// Unique backend name from configuration
    fn name(&self) -> &str;

    /// Capability tags this backend advertises
    fn capabilities(&self) -> &[String];

    /// Upper bound for one inference call
    fn timeout(&self) -> Duration;

    /// Runs a chat completion and returns the generated text
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, BackendError>;

    /// Lightweight liveness check
    async fn probe(&self) -> Result<(), BackendError>;
}

/// Fields every HTTP backend carries
#[derive(Debug, Clone)]
pub struct BackendInfo {
    pub name: String,
    pub base_url: Url,
    pub model: String,
    pub capabilities: Vec<String>,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl BackendInfo {
    /// Joins a path onto the base url, keeping any path prefix the base already has
    pub fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::Configuration(e.to_string()))
    }
}

/// Turns a non-success HTTP status into a [`BackendError::Status`]
pub(crate) async fn ensure_success(res: Response) -> Result<Response, BackendError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let code = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(BackendError::Status { code, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(base: &str) -> BackendInfo {
        BackendInfo {
            name: "b".into(),
            base_url: Url::parse(base).unwrap(),
            model: "m".into(),
            capabilities: vec![],
            timeout: Duration::from_secs(1),
            api_key: None,
        }
    }

    #[test]
    fn endpoint_keeps_base_path() {
        assert_eq!(
            info("http://localhost:8000/v1").endpoint("/chat/completions").unwrap().as_str(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            info("http://localhost:11434").endpoint("api/tags").unwrap().as_str(),
            "http://localhost:11434/api/tags"
        );
    }
}
