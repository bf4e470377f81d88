use super::task::SubTask;
use crate::constants::{task_system_prompt, DEFAULT_CAPABILITY, FETCH_MAX_CHARS};
use crate::errors::ExecutionError;
use crate::llm::ChatMessage;
use crate::router::{ModelRouter, RouteRequest};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// What an executor sees besides the task itself
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub thread_id: String,
    pub user_request: String,
    /// Results of the task's dependencies, by id
    pub dependency_results: BTreeMap<u64, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub output: String,
    /// Backend that served the call, for model tasks
    pub backend: Option<String>,
}

/// Runs one sub-task of a given type
#[async_trait]
pub trait TaskExecutor: Debug + Send + Sync {
    async fn execute(
        &self,
        task: &SubTask,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError>;
}

/// Executors keyed by task type, with an optional catch-all
#[derive(Debug, Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
    fallback: Option<Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, task_type: &str, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executors.insert(task_type.to_string(), executor);
        self
    }

    /// Executor used for any type without a dedicated registration
    pub fn with_fallback(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.fallback = Some(executor);
        self
    }

    pub fn resolve(&self, task_type: &str) -> Result<Arc<dyn TaskExecutor>, ExecutionError> {
        self.executors
            .get(task_type)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ExecutionError::Unsupported(task_type.to_string()))
    }
}

/// Sends a task to a language model through the router
#[derive(Debug)]
pub struct ModelExecutor {
    router: Arc<ModelRouter>,
    task_capabilities: HashMap<String, Vec<String>>,
}

impl ModelExecutor {
    pub fn new(router: Arc<ModelRouter>, task_capabilities: HashMap<String, Vec<String>>) -> Self {
        Self {
            router,
            task_capabilities,
        }
    }

    /// Capabilities declared on the task win, then the per-type mapping, then "general"
    pub fn capabilities_for(&self, task: &SubTask) -> Vec<String> {
        if !task.capabilities.is_empty() {
            return task.capabilities.clone();
        }
        self.task_capabilities
            .get(&task.task_type)
            .cloned()
            .unwrap_or_else(|| vec![DEFAULT_CAPABILITY.to_string()])
    }

    fn build_messages(task: &SubTask, ctx: &ExecutionContext) -> Vec<ChatMessage> {
        let mut prompt = format!("Overall goal: {}\n\n", ctx.user_request);
        if !ctx.dependency_results.is_empty() {
            prompt.push_str("Results of earlier steps:\n");
            for (id, result) in &ctx.dependency_results {
                prompt.push_str(&format!("- Step {}: {}\n", id, result));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!("Your task: {}", task.description));
        vec![
            ChatMessage::system(task_system_prompt(&task.task_type)),
            ChatMessage::user(&prompt),
        ]
    }
}

#[async_trait]
impl TaskExecutor for ModelExecutor {
    async fn execute(
        &self,
        task: &SubTask,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let request = RouteRequest {
            capabilities: self.capabilities_for(task),
            messages: Self::build_messages(task, ctx),
        };
        let routed = self.router.route(request).await?;
        debug!(
            "Task {} served by {} after {} attempt(s)",
            task.id,
            routed.backend_used,
            routed.attempts.len()
        );
        Ok(ExecutionOutput {
            output: routed.output,
            backend: Some(routed.backend_used),
        })
    }
}

/// Fetches the first URL found in the task description
#[derive(Debug, Default)]
pub struct FetchExecutor {
    client: Client,
}

impl FetchExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_url(description: &str) -> Option<Url> {
        description
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| matches!(c, '"' | '\'' | '(' | ')' | ',' | '<' | '>')))
            .find_map(|w| Url::parse(w).ok().filter(|u| matches!(u.scheme(), "http" | "https")))
    }
}

#[async_trait]
impl TaskExecutor for FetchExecutor {
    async fn execute(
        &self,
        task: &SubTask,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let url = Self::find_url(&task.description)
            .ok_or_else(|| ExecutionError::Tool("no http(s) url in task description".into()))?;
        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExecutionError::Tool(e.to_string()))?;
        if !res.status().is_success() {
            return Err(ExecutionError::Tool(format!(
                "GET {} returned {}",
                url,
                res.status()
            )));
        }
        let body = res
            .text()
            .await
            .map_err(|e| ExecutionError::Tool(e.to_string()))?;
        Ok(ExecutionOutput {
            output: body.chars().take(FETCH_MAX_CHARS).collect(),
            backend: None,
        })
    }
}
