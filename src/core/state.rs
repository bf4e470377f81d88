use super::task::{NewTask, SubTask};
use super::task_graph::TaskGraph;
use crate::errors::GraphError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Human decision on the proposed plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Where a workflow is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Planning,
    AwaitingApproval,
    Executing,
    AwaitingHumanReview,
    Completed,
    Rejected,
    Failed,
    /// Failed because a caller cancelled it while executing
    Cancelled,
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowPhase::Completed
                | WorkflowPhase::Rejected
                | WorkflowPhase::Failed
                | WorkflowPhase::Cancelled
        )
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowPhase::Planning => "planning",
            WorkflowPhase::AwaitingApproval => "awaiting_approval",
            WorkflowPhase::Executing => "executing",
            WorkflowPhase::AwaitingHumanReview => "awaiting_human_review",
            WorkflowPhase::Completed => "completed",
            WorkflowPhase::Rejected => "rejected",
            WorkflowPhase::Failed => "failed",
            WorkflowPhase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One entry of the append-only workflow log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMessage {
    /// Who produced the entry, e.g. "planner", "orchestrator", "human", "task:3"
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable state of one workflow instance.
///
/// Serializing and reloading this struct is enough to resume a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub thread_id: String,
    pub user_request: String,
    pub plan: TaskGraph,
    pub task_results: BTreeMap<u64, String>,
    pub next_task_id: u64,
    messages: Vec<WorkflowMessage>,
    pub human_approval_status: ApprovalStatus,
    pub user_feedback: Option<String>,
    pub final_report: Option<String>,
    pub phase: WorkflowPhase,
    /// Task currently waiting on a mid-run human review
    #[serde(default)]
    pub pending_review: Option<u64>,
    /// Tasks whose review was approved
    #[serde(default)]
    pub reviewed_tasks: BTreeSet<u64>,
    /// Reason the workflow failed, if it did
    #[serde(default)]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentState {
    pub fn new(thread_id: String, user_request: String) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            user_request,
            plan: TaskGraph::new(),
            task_results: BTreeMap::new(),
            next_task_id: 1,
            messages: Vec::new(),
            human_approval_status: ApprovalStatus::Pending,
            user_feedback: None,
            final_report: None,
            phase: WorkflowPhase::Planning,
            pending_review: None,
            reviewed_tasks: BTreeSet::new(),
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn messages(&self) -> &[WorkflowMessage] {
        &self.messages
    }

    /// Appends to the log; entries are never edited or removed
    pub fn push_message(&mut self, role: &str, content: impl Into<String>) -> &WorkflowMessage {
        let now = Utc::now();
        self.updated_at = now;
        self.messages.push(WorkflowMessage {
            role: role.to_string(),
            content: content.into(),
            timestamp: now,
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Replaces the plan wholesale; used by the planning step only.
    pub fn install_plan(&mut self, tasks: Vec<SubTask>) -> Result<(), GraphError> {
        let mut graph = TaskGraph::new();
        graph.add_tasks(tasks)?;
        self.next_task_id = graph.max_id() + 1;
        self.plan = graph;
        self.task_results.clear();
        self.reviewed_tasks.clear();
        self.pending_review = None;
        Ok(())
    }

    /// Allocates ids from `next_task_id` and inserts the tasks atomically.
    pub fn inject_tasks(&mut self, tasks: Vec<NewTask>) -> Result<Vec<u64>, GraphError> {
        let first = self.next_task_id;
        let subtasks: Vec<SubTask> = tasks
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.into_subtask(first + i as u64))
            .collect();
        let count = subtasks.len() as u64;
        let ids = self.plan.add_tasks(subtasks)?;
        self.next_task_id = first + count;
        Ok(ids)
    }

    pub fn set_phase(&mut self, phase: WorkflowPhase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskStatus;

    #[test]
    fn inject_allocates_monotonic_ids() {
        let mut state = AgentState::new("t".into(), "req".into());
        state
            .install_plan(vec![SubTask::new(1, "research", "a"), SubTask::new(2, "code", "b")])
            .unwrap();
        assert_eq!(state.next_task_id, 3);
        let ids = state
            .inject_tasks(vec![NewTask {
                task_type: "code".into(),
                description: "c".into(),
                dependencies: [1].into_iter().collect(),
                required: true,
                capabilities: vec![],
                requires_review: false,
            }])
            .unwrap();
        assert_eq!(ids, vec![3]);
        assert_eq!(state.next_task_id, 4);
    }

    #[test]
    fn failed_injection_leaves_counter_untouched() {
        let mut state = AgentState::new("t".into(), "req".into());
        state.install_plan(vec![SubTask::new(1, "research", "a")]).unwrap();
        let err = state.inject_tasks(vec![NewTask {
            task_type: "code".into(),
            description: "c".into(),
            dependencies: [99].into_iter().collect(),
            required: true,
            capabilities: vec![],
            requires_review: false,
        }]);
        assert!(err.is_err());
        assert_eq!(state.next_task_id, 2);
        assert_eq!(state.plan.len(), 1);
    }

    #[test]
    fn json_round_trip_mid_workflow() {
        let mut state = AgentState::new("t".into(), "req".into());
        state
            .install_plan(vec![
                SubTask::new(1, "research", "a"),
                SubTask::new(2, "code", "b").with_dependencies([1]),
            ])
            .unwrap();
        state.plan.mark_running(1).unwrap();
        state
            .plan
            .mark_result(1, TaskStatus::Succeeded, Some("r1".into()))
            .unwrap();
        state.task_results.insert(1, "r1".into());
        state.push_message("task:1", "done");
        state.set_phase(WorkflowPhase::Executing);

        let json = serde_json::to_string(&state).unwrap();
        let restored: AgentState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.plan.ready_tasks(), vec![2]);
    }
}
