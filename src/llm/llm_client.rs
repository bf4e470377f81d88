use crate::config::{BackendConfig, BackendKind};
use crate::errors::BackendError;
use crate::llm::providers::{
    anthropic::AnthropicProvider, huggingface::HuggingFaceProvider, ollama::OllamaProvider,
    openai::OpenAiProvider, BackendInfo, InferenceBackend,
};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Builds the backend described by `config`.
///
/// API keys are read from the environment variable named by `api_key_env`.
/// Hosted kinds fall back to their conventional variable when none is given.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn InferenceBackend>, BackendError> {
    let base_url =
        Url::parse(&config.base_url).map_err(|e| BackendError::Configuration(e.to_string()))?;
    let timeout = config
        .timeout()
        .map_err(|e| BackendError::Configuration(e.to_string()))?;

    let key_env = config
        .api_key_env
        .clone()
        .or_else(|| default_key_env(config.kind).map(str::to_string));
    let api_key = key_env.and_then(|var| match std::env::var(&var) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("{} not set for backend '{}'", var, config.name);
            None
        }
    });

    let info = BackendInfo {
        name: config.name.clone(),
        base_url,
        model: config.model.clone(),
        capabilities: config.capabilities.clone(),
        timeout,
        api_key,
    };

    let backend: Arc<dyn InferenceBackend> = match config.kind {
        BackendKind::Ollama => Arc::new(OllamaProvider::new(info)),
        BackendKind::OpenAi | BackendKind::Vllm => Arc::new(OpenAiProvider::new(info)),
        BackendKind::Anthropic => Arc::new(AnthropicProvider::new(info)?),
        BackendKind::HuggingFace => Arc::new(HuggingFaceProvider::new(info)),
    };
    info!(
        "Configured backend '{}' ({:?}, model {})",
        config.name, config.kind, config.model
    );
    Ok(backend)
}

/// Builds every configured backend, failing on the first misconfigured one
pub fn build_backends(
    configs: &[BackendConfig],
) -> Result<Vec<Arc<dyn InferenceBackend>>, BackendError> {
    configs.iter().map(build_backend).collect()
}

fn default_key_env(kind: BackendKind) -> Option<&'static str> {
    match kind {
        BackendKind::OpenAi => Some("OPENAI_API_KEY"),
        BackendKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        BackendKind::HuggingFace => Some("HUGGINGFACE_API_TOKEN"),
        BackendKind::Ollama | BackendKind::Vllm => None,
    }
}
