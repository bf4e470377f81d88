use super::task::SubTask;
use crate::constants::{PLANNER_SYSTEM_PROMPT, PLANNER_USER_PROMPT, PLANNING_CAPABILITY};
use crate::errors::PlanError;
use crate::llm::{build_validator, validate_value, ChatMessage, PLAN_SCHEMA};
use crate::router::{ModelRouter, RouteRequest};
use async_trait::async_trait;
use jsonschema::Validator;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{info, warn};

/// Produces the ordered sub-task list for a request
#[async_trait]
pub trait Planner: Debug + Send + Sync {
    /// `feedback` and `previous` are set when a human amends an earlier plan
    async fn plan(
        &self,
        user_request: &str,
        feedback: Option<&str>,
        previous: &[SubTask],
    ) -> Result<Vec<SubTask>, PlanError>;
}

/// Returns the same plan for every request
#[derive(Debug, Clone)]
pub struct StaticPlanner {
    tasks: Vec<SubTask>,
}

impl StaticPlanner {
    pub fn new(tasks: Vec<SubTask>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn plan(
        &self,
        _user_request: &str,
        _feedback: Option<&str>,
        _previous: &[SubTask],
    ) -> Result<Vec<SubTask>, PlanError> {
        Ok(self.tasks.clone())
    }
}

/// Asks a planning-capable model for a JSON plan
pub struct LlmPlanner {
    router: Arc<ModelRouter>,
    capabilities: Vec<String>,
    validator: Validator,
}

impl Debug for LlmPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmPlanner")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl LlmPlanner {
    pub fn new(router: Arc<ModelRouter>, capabilities: Option<Vec<String>>) -> Result<Self, PlanError> {
        Ok(Self {
            router,
            capabilities: capabilities.unwrap_or_else(|| vec![PLANNING_CAPABILITY.to_string()]),
            validator: build_validator(PLAN_SCHEMA)?,
        })
    }

    fn build_prompt(user_request: &str, feedback: Option<&str>, previous: &[SubTask]) -> String {
        match feedback {
            Some(feedback) => {
                let previous_json = serde_json::to_string_pretty(previous).unwrap_or_default();
                format!(
                    "The user gave feedback on your previous plan. Produce a revised plan that addresses it.\n\nORIGINAL REQUEST: {}\n\nPREVIOUS PLAN:\n{}\n\nUSER FEEDBACK: {}\n\n{}",
                    user_request, previous_json, feedback, PLANNER_USER_PROMPT
                )
            }
            None => format!("USER REQUEST: {}\n\n{}", user_request, PLANNER_USER_PROMPT),
        }
    }

    /// Parses the model answer, tolerating prose around the JSON array
    pub fn parse_plan(&self, response: &str) -> Result<Vec<SubTask>, PlanError> {
        let value = extract_json_array(response)
            .ok_or_else(|| PlanError::InvalidPlan("no JSON array in planner output".into()))?;
        if !validate_value(&self.validator, &value) {
            return Err(PlanError::InvalidPlan(
                "planner output does not match the plan schema".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| PlanError::InvalidPlan(e.to_string()))
    }

    /// Single research task covering the whole request
    pub fn fallback_plan(user_request: &str) -> Vec<SubTask> {
        vec![SubTask::new(
            1,
            "research",
            &format!("Address the user request: {}", user_request),
        )]
    }
}

fn extract_json_array(response: &str) -> Option<Value> {
    let trimmed = response.trim();
    if let Ok(v @ Value::Array(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(v @ Value::Array(_)) => Some(v),
        _ => None,
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(
        &self,
        user_request: &str,
        feedback: Option<&str>,
        previous: &[SubTask],
    ) -> Result<Vec<SubTask>, PlanError> {
        let request = RouteRequest {
            capabilities: self.capabilities.clone(),
            messages: vec![
                ChatMessage::system(PLANNER_SYSTEM_PROMPT),
                ChatMessage::user(&Self::build_prompt(user_request, feedback, previous)),
            ],
        };
        let routed = self.router.route(request).await?;
        match self.parse_plan(&routed.output) {
            Ok(plan) => {
                info!("Planner produced {} task(s)", plan.len());
                Ok(plan)
            }
            Err(e) => {
                warn!("Unusable planner output, using fallback plan: {}", e);
                Ok(Self::fallback_plan(user_request))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthHandle, HealthSnapshot};

    fn planner() -> LlmPlanner {
        let router = ModelRouter::new(vec![], HealthHandle::fixed(HealthSnapshot::default()), 1);
        LlmPlanner::new(Arc::new(router), None).unwrap()
    }

    #[test]
    fn parses_array_wrapped_in_prose() {
        let out = "Here is the plan:\n```json\n[{\"id\": 1, \"type\": \"research\", \"description\": \"find\", \"dependencies\": []},\n {\"id\": 2, \"type\": \"code\", \"description\": \"sum\", \"dependencies\": [1]}]\n```";
        let plan = planner().parse_plan(out).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan[1].dependencies.contains(&1));
    }

    #[test]
    fn rejects_schema_violations() {
        assert!(planner().parse_plan("[{\"id\": 1}]").is_err());
        assert!(planner().parse_plan("no plan at all").is_err());
    }

    #[test]
    fn fallback_plan_is_single_research_task() {
        let plan = LlmPlanner::fallback_plan("write a haiku");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].task_type, "research");
    }
}
