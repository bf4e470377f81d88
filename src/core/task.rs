use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle status of a sub-task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its dependencies or for a dispatch slot
    Pending,
    /// Dispatched to an executor
    Running,
    /// Finished with a result
    Succeeded,
    /// Finished with an error
    Failed,
    /// Will never run, either because a dependency did not succeed or because it was dropped
    Skipped,
}

impl TaskStatus {
    /// Terminal statuses accept no further transition
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    /// Whether the task may legally move from `self` to `to`
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Skipped)
                | (TaskStatus::Running, TaskStatus::Succeeded)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Skipped)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

fn default_required() -> bool {
    true
}

/// One unit of work within a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique positive id, stable for the workflow's lifetime
    pub id: u64,
    /// Executor selector, e.g. "research" or "code"
    #[serde(rename = "type")]
    pub task_type: String,
    /// Free text instruction
    pub description: String,
    /// Ids that must succeed before this task becomes runnable
    #[serde(default)]
    pub dependencies: BTreeSet<u64>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    /// Present only once the task succeeded, failed or was skipped with a reason
    #[serde(default)]
    pub result: Option<String>,
    /// A required task that fails fails the whole workflow
    #[serde(default = "default_required")]
    pub required: bool,
    /// Capability tags the serving backend must advertise
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Pause for a human decision before dispatching this task
    #[serde(default)]
    pub requires_review: bool,
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

impl SubTask {
    pub fn new(id: u64, task_type: &str, description: &str) -> Self {
        Self {
            id,
            task_type: task_type.to_string(),
            description: description.to_string(),
            dependencies: BTreeSet::new(),
            status: TaskStatus::Pending,
            result: None,
            required: true,
            capabilities: Vec::new(),
            requires_review: false,
        }
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = u64>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_capabilities(mut self, caps: &[&str]) -> Self {
        self.capabilities = caps.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_review(mut self) -> Self {
        self.requires_review = true;
        self
    }
}

/// A task submitted for injection into a running workflow; its id is allocated on insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: BTreeSet<u64>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub requires_review: bool,
}

impl NewTask {
    pub fn into_subtask(self, id: u64) -> SubTask {
        SubTask {
            id,
            task_type: self.task_type,
            description: self.description,
            dependencies: self.dependencies,
            status: TaskStatus::Pending,
            result: None,
            required: self.required,
            capabilities: self.capabilities,
            requires_review: self.requires_review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!Pending.can_transition_to(Failed));
        for terminal in [Succeeded, Failed, Skipped] {
            for to in [Pending, Running, Succeeded, Failed, Skipped] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn deserializes_planner_shape() {
        let raw = r#"{"id": 2, "type": "code", "description": "sum", "dependencies": [1], "status": "pending", "result": null}"#;
        let task: SubTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.id, 2);
        assert_eq!(task.task_type, "code");
        assert!(task.dependencies.contains(&1));
        assert!(task.required);
        assert!(!task.requires_review);
    }
}
