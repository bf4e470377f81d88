use std::time::Duration;

use diesel::result::Error as DieselError;

use crate::core::TaskStatus;

/// Errors raised by the task graph. These are data errors and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("dependency cycle detected between tasks {involved:?}")]
    Cycle { involved: Vec<u64> },
    #[error("invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: u64,
        from: TaskStatus,
        to: TaskStatus,
    },
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: u64, dependency: u64 },
    #[error("task id {0} is already in use")]
    DuplicateTaskId(u64),
    #[error("task ids must be positive integers")]
    InvalidTaskId,
    #[error("task {0} not found")]
    TaskNotFound(u64),
}

/// Failure of a single call against an inference backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("backend misconfigured: {0}")]
    Configuration(String),
}

impl BackendError {
    /// Whether another backend is worth trying after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Timeout(_) | BackendError::Transport(_) => true,
            BackendError::Status { code, .. } => *code >= 500 || *code == 429,
            BackendError::InvalidResponse(_) | BackendError::Configuration(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// One failed attempt recorded by the router.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FailedAttempt {
    pub backend: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("no backend available for capabilities {capabilities:?}")]
    NoBackendAvailable { capabilities: Vec<String> },
    #[error("all backends exhausted: {}", format_attempts(.attempts))]
    BackendExhausted { attempts: Vec<FailedAttempt> },
}

fn format_attempts(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} ({})", a.backend, a.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Routing(#[from] RouterError),
    #[error("tool failed: {0}")]
    Tool(String),
    #[error("no executor registered for task type '{0}'")]
    Unsupported(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error(transparent)]
    Routing(#[from] RouterError),
    #[error("planner produced an invalid plan: {0}")]
    InvalidPlan(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Diesel error: {0}")]
    DieselError(#[from] DieselError),
    #[error("Connection pool error: {0}")]
    PoolError(#[from] diesel::r2d2::PoolError),
    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

/// Errors surfaced to callers of the workflow interface.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow {0} not found")]
    NotFound(String),
    #[error("invalid workflow state for {thread_id}: expected {expected}, found {actual}")]
    InvalidState {
        thread_id: String,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
