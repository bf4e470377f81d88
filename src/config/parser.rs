use super::{parse_duration, parse_interval, AppConfig};
use crate::errors::ConfigError;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;
use url::Url;

/// Serialization format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything but `.toml` is read as YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Loads and validates the application configuration from a YAML or TOML file
///
/// # Arguments
///
/// * `file_path` - Path to the configuration file
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be read
/// * The content cannot be parsed into an [`AppConfig`]
/// * A value is invalid (duplicate backend name, bad url, bad duration)
pub fn load_app_config(file_path: &str) -> Result<AppConfig, ConfigError> {
    let raw = fs::read_to_string(file_path)?;
    let config = parse_app_config(&raw, ConfigFormat::from_path(Path::new(file_path)))?;
    info!(
        "Loaded configuration with {} backend(s)",
        config.backends.len()
    );
    Ok(config)
}

pub fn parse_app_config(raw: &str, format: ConfigFormat) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(raw)?,
        ConfigFormat::Toml => toml::from_str(raw)?,
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for backend in &config.backends {
        if !names.insert(backend.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate backend name '{}'",
                backend.name
            )));
        }
        Url::parse(&backend.base_url).map_err(|e| {
            ConfigError::Invalid(format!("backend '{}' base_url: {}", backend.name, e))
        })?;
        backend.timeout()?;
    }
    parse_interval("health.interval", &config.health.interval)?;
    parse_interval("health.probe_timeout", &config.health.probe_timeout)?;
    parse_interval("cleanup.interval", &config.cleanup.interval)?;
    parse_duration("cleanup.max_age", &config.cleanup.max_age)?;
    if config.health.unreachable_after == 0 || config.health.recover_after == 0 {
        return Err(ConfigError::Invalid(
            "health thresholds must be at least 1".to_string(),
        ));
    }
    if config.orchestrator.max_concurrency == Some(0) {
        return Err(ConfigError::Invalid(
            "orchestrator.max_concurrency must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, StorageKind};

    const YAML: &str = r#"
backends:
  - name: local
    kind: ollama
    base_url: http://localhost:11434
    model: llama3.1:8b
    capabilities: [general, planning]
  - name: hosted
    kind: openai
    base_url: https://api.openai.com/v1
    model: gpt-4o-mini
    capabilities: [general, code]
    timeout: 30s
    api_key_env: OPENAI_API_KEY
health:
  interval: 2s
orchestrator:
  task_capabilities:
    code: [code]
storage:
  kind: sqlite
  path: /tmp/tw.db
"#;

    #[test]
    fn parses_yaml_with_defaults() {
        let config = parse_app_config(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].kind, BackendKind::Ollama);
        assert_eq!(config.backends[0].timeout, "60s");
        assert_eq!(config.health.unreachable_after, 3);
        assert_eq!(config.health.recover_after, 2);
        assert_eq!(config.router.max_retries, 1);
        assert_eq!(config.storage.kind, StorageKind::Sqlite);
        assert_eq!(
            config.orchestrator.task_capabilities["code"],
            vec!["code".to_string()]
        );
    }

    #[test]
    fn parses_toml() {
        let raw = r#"
[[backends]]
name = "vllm"
kind = "vllm"
base_url = "http://localhost:8000/v1"
model = "meta-llama/Llama-2-7b-chat-hf"
capabilities = ["general"]
retries = 0

[router]
max_retries = 2
"#;
        let config = parse_app_config(raw, ConfigFormat::Toml).unwrap();
        assert_eq!(config.backends[0].kind, BackendKind::Vllm);
        assert_eq!(config.backends[0].retries, Some(0));
        assert_eq!(config.router.max_retries, 2);
    }

    #[test]
    fn rejects_duplicate_names_and_bad_values() {
        let dup = r#"
backends:
  - {name: a, kind: ollama, base_url: "http://x", model: m}
  - {name: a, kind: ollama, base_url: "http://y", model: m}
"#;
        assert!(matches!(
            parse_app_config(dup, ConfigFormat::Yaml),
            Err(ConfigError::Invalid(_))
        ));
        let bad_timeout = r#"
backends:
  - {name: a, kind: ollama, base_url: "http://x", model: m, timeout: soon}
"#;
        assert!(parse_app_config(bad_timeout, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn rejects_zero_periods() {
        for raw in [
            "health: {interval: 0s}",
            "health: {probe_timeout: 0s}",
            "cleanup: {interval: 0s}",
            "backends:\n  - {name: a, kind: ollama, base_url: \"http://x\", model: m, timeout: 0s}",
        ] {
            let err = parse_app_config(raw, ConfigFormat::Yaml).unwrap_err();
            assert!(
                err.to_string().contains("greater than zero"),
                "{}: {}",
                raw,
                err
            );
        }
        let purge_all = parse_app_config("cleanup: {max_age: 0s}", ConfigFormat::Yaml).unwrap();
        assert_eq!(purge_all.cleanup.max_age, "0s");
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
    }
}
