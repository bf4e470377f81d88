use super::{invalid_state, ApprovalDecision, ReviewDecision, WorkflowHandle, WorkflowManager};
use crate::core::{ApprovalStatus, SubTask, WorkflowPhase};
use crate::errors::WorkflowError;
use std::sync::Arc;
use tracing::{error, info, warn};

impl WorkflowManager {
    /// Applies a human decision to a workflow waiting at the approval gate.
    ///
    /// A rejection is terminal and keeps `feedback` verbatim; an amendment
    /// re-plans with the feedback and waits for approval again.
    pub async fn submit_approval(
        self: &Arc<Self>,
        thread_id: &str,
        decision: ApprovalDecision,
        feedback: Option<String>,
    ) -> Result<(), WorkflowError> {
        let handle = self.handle(thread_id).await?;
        {
            let mut slot = handle.slot.lock().await;
            let state = &mut slot.state;
            if state.phase != WorkflowPhase::AwaitingApproval {
                return Err(invalid_state(thread_id, "awaiting_approval", state.phase));
            }
            if feedback.is_some() {
                state.user_feedback = feedback.clone();
            }

            match decision {
                ApprovalDecision::Approve => {
                    state.human_approval_status = ApprovalStatus::Approved;
                    let note = match &feedback {
                        Some(text) => format!("Plan approved: {}", text),
                        None => "Plan approved".to_string(),
                    };
                    self.record_message(state, "human", note);
                    self.transition(&handle, state, WorkflowPhase::Executing);
                }
                ApprovalDecision::Reject => {
                    state.human_approval_status = ApprovalStatus::Rejected;
                    let note = feedback.clone().unwrap_or_else(|| "Plan rejected".to_string());
                    self.record_message(state, "human", note);
                    self.transition(&handle, state, WorkflowPhase::Rejected);
                }
                ApprovalDecision::Amend => {
                    state.human_approval_status = ApprovalStatus::Pending;
                    let note = match &feedback {
                        Some(text) => format!("Plan changes requested: {}", text),
                        None => "Plan changes requested".to_string(),
                    };
                    self.record_message(state, "human", note);
                    self.transition(&handle, state, WorkflowPhase::Planning);
                }
            }
            self.store.save(state).await?;
        }

        match decision {
            ApprovalDecision::Approve => self.spawn_execution(handle),
            ApprovalDecision::Reject => info!("Workflow {} rejected", thread_id),
            ApprovalDecision::Amend => self.plan_workflow(&handle, feedback).await?,
        }
        Ok(())
    }

    /// Resolves the task held for review and resumes execution.
    ///
    /// Rejecting skips the task with the feedback as its reason; its
    /// dependents are skipped in turn.
    pub async fn submit_review(
        self: &Arc<Self>,
        thread_id: &str,
        decision: ReviewDecision,
        feedback: Option<String>,
    ) -> Result<(), WorkflowError> {
        let handle = self.handle(thread_id).await?;
        {
            let mut slot = handle.slot.lock().await;
            let state = &mut slot.state;
            let task_id = match (state.phase, state.pending_review) {
                (WorkflowPhase::AwaitingHumanReview, Some(id)) => id,
                (phase, _) => {
                    return Err(invalid_state(thread_id, "awaiting_human_review", phase));
                }
            };

            match decision {
                ReviewDecision::Approve => {
                    state.reviewed_tasks.insert(task_id);
                    self.record_message(state, "human", format!("Task {} approved", task_id));
                }
                ReviewDecision::Reject => {
                    let reason = feedback
                        .clone()
                        .unwrap_or_else(|| "rejected at review".to_string());
                    let skipped = state.plan.skip(task_id, &reason)?;
                    self.record_message(
                        state,
                        "human",
                        format!("Task {} rejected: {}; skipped {:?}", task_id, reason, skipped),
                    );
                }
            }
            if feedback.is_some() {
                state.user_feedback = feedback;
            }
            state.pending_review = None;
            self.transition(&handle, state, WorkflowPhase::Executing);
            self.store.save(state).await?;
        }

        self.spawn_execution(handle);
        Ok(())
    }

    /// Runs the planner for a workflow in the Planning phase and moves it to
    /// the approval gate. A failed first plan fails the workflow; a failed
    /// amendment keeps the previous plan.
    pub(super) async fn plan_workflow(
        self: &Arc<Self>,
        handle: &Arc<WorkflowHandle>,
        feedback: Option<String>,
    ) -> Result<(), WorkflowError> {
        let (user_request, previous): (String, Vec<SubTask>) = {
            let slot = handle.slot.lock().await;
            (
                slot.state.user_request.clone(),
                slot.state.plan.tasks().cloned().collect(),
            )
        };

        let planned = self
            .planner
            .plan(&user_request, feedback.as_deref(), &previous)
            .await;

        let mut slot = handle.slot.lock().await;
        let state = &mut slot.state;
        if state.phase != WorkflowPhase::Planning {
            // Cancelled while the planner was running.
            return Ok(());
        }

        let installed = planned
            .map_err(WorkflowError::from)
            .and_then(|tasks| state.install_plan(tasks).map_err(WorkflowError::from));
        let mut start_now = false;
        match installed {
            Ok(()) => {
                let summary = state
                    .plan
                    .tasks()
                    .map(|t| format!("{}. [{}] {}", t.id, t.task_type, t.description))
                    .collect::<Vec<_>>()
                    .join("\n");
                let note = format!("Proposed plan with {} task(s):\n{}", state.plan.len(), summary);
                self.record_message(state, "planner", note);
                self.transition(handle, state, WorkflowPhase::AwaitingApproval);
                if self.settings.auto_approve {
                    state.human_approval_status = ApprovalStatus::Approved;
                    self.record_message(state, "orchestrator", "Plan approved automatically");
                    self.transition(handle, state, WorkflowPhase::Executing);
                    start_now = true;
                }
            }
            Err(e) if previous.is_empty() => {
                error!("Planning failed for workflow {}: {}", state.thread_id, e);
                state.failure = Some(format!("planning failed: {}", e));
                self.record_message(state, "planner", format!("Planning failed: {}", e));
                self.transition(handle, state, WorkflowPhase::Failed);
                state.final_report = Some(super::synthesize_report(state));
            }
            Err(e) => {
                warn!(
                    "Re-planning failed for workflow {}, keeping previous plan: {}",
                    state.thread_id, e
                );
                self.record_message(
                    state,
                    "planner",
                    format!("Re-planning failed, keeping the previous plan: {}", e),
                );
                self.transition(handle, state, WorkflowPhase::AwaitingApproval);
            }
        }
        self.store.save(state).await?;
        drop(slot);

        if start_now {
            self.spawn_execution(Arc::clone(handle));
        }
        Ok(())
    }
}
