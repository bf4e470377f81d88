mod parser;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::ConfigError;

pub use parser::{load_app_config, parse_app_config, ConfigFormat};

/// Top-level application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Inference backends the router may choose from
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Health probing policy
    #[serde(default)]
    pub health: HealthConfig,
    /// Routing and failover policy
    #[serde(default)]
    pub router: RouterConfig,
    /// Workflow execution settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Where workflow checkpoints are kept
    #[serde(default)]
    pub storage: StorageConfig,
    /// Purging of finished workflows
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Kind of inference service behind a backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Ollama,
    OpenAi,
    Vllm,
    Anthropic,
    HuggingFace,
}

/// Static descriptor for one inference backend
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    /// Unique backend name
    pub name: String,
    pub kind: BackendKind,
    /// Base url of the service
    pub base_url: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Capability tags (e.g. "general", "code", "planning")
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Per-call timeout, humantime format (e.g. "45s")
    #[serde(default = "default_backend_timeout")]
    pub timeout: String,
    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Failovers allowed when this backend is the first choice; `router.max_retries` otherwise
    #[serde(default)]
    pub retries: Option<usize>,
}

impl BackendConfig {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_interval("timeout", &self.timeout)
    }
}

/// Health probing policy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthConfig {
    /// Time between probe cycles
    #[serde(default = "default_probe_interval")]
    pub interval: String,
    /// Time allowed for a single probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,
    /// Consecutive failed probes before a backend is unreachable
    #[serde(default = "default_unreachable_after")]
    pub unreachable_after: u32,
    /// Consecutive successful probes before a backend is healthy again
    #[serde(default = "default_recover_after")]
    pub recover_after: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: default_probe_interval(),
            probe_timeout: default_probe_timeout(),
            unreachable_after: default_unreachable_after(),
            recover_after: default_recover_after(),
        }
    }
}

/// Routing and failover policy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouterConfig {
    /// Extra attempts against the next-best backend after a failed call
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

/// Workflow execution settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OrchestratorConfig {
    /// Upper bound on tasks dispatched at once; defaults to the number of backends
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Capability tags required per task type when a task declares none
    #[serde(default)]
    pub task_capabilities: HashMap<String, Vec<String>>,
    /// Capability tags required by the planner
    #[serde(default)]
    pub planner_capabilities: Option<Vec<String>>,
    /// Skip the human approval gate
    #[serde(default)]
    pub auto_approve: bool,
}

/// Which checkpoint store to use
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            path: default_db_path(),
        }
    }
}

/// Purging of finished workflows
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Time between cleanup runs
    #[serde(default = "default_cleanup_interval")]
    pub interval: String,
    /// Terminal workflows older than this are removed
    #[serde(default = "default_max_age")]
    pub max_age: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_cleanup_interval(),
            max_age: default_max_age(),
        }
    }
}

/// Parses a humantime duration, naming the field on error
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value)
        .map_err(|e| ConfigError::Invalid(format!("{}: '{}' ({})", field, value, e)))
}

/// Like [`parse_duration`] but rejects zero, for periods and timeouts
pub fn parse_interval(field: &str, value: &str) -> Result<Duration, ConfigError> {
    let duration = parse_duration(field, value)?;
    if duration.is_zero() {
        return Err(ConfigError::Invalid(format!(
            "{}: must be greater than zero",
            field
        )));
    }
    Ok(duration)
}

fn default_backend_timeout() -> String {
    "60s".to_string()
}

fn default_probe_interval() -> String {
    "5s".to_string()
}

fn default_probe_timeout() -> String {
    "3s".to_string()
}

fn default_unreachable_after() -> u32 {
    3
}

fn default_recover_after() -> u32 {
    2
}

fn default_max_retries() -> usize {
    1
}

fn default_db_path() -> String {
    "taskweave.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval() -> String {
    "6h".to_string()
}

fn default_max_age() -> String {
    "24h".to_string()
}
