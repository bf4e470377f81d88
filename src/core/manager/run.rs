use super::{synthesize_report, WorkflowHandle, WorkflowManager};
use crate::core::{
    AgentState, ExecutionContext, ExecutionOutput, SubTask, TaskStatus, WorkflowPhase,
};
use crate::errors::{ExecutionError, WorkflowError};
use crate::event::Event;
use futures::stream::{self, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type Batch = Vec<(SubTask, ExecutionContext)>;
type BatchResults = Vec<(SubTask, Result<ExecutionOutput, ExecutionError>)>;

impl WorkflowManager {
    /// Starts the executing loop in the background
    pub(super) fn spawn_execution(self: &Arc<Self>, handle: Arc<WorkflowHandle>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = manager.drive(handle).await {
                error!("Executing loop stopped on error: {}", e);
            }
        });
    }

    /// Runs ready batches until the workflow completes, fails, is cancelled,
    /// or pauses for a review.
    ///
    /// Each batch is dispatched concurrently and fully committed to the task
    /// graph before readiness is evaluated again.
    async fn drive(&self, handle: Arc<WorkflowHandle>) -> Result<(), WorkflowError> {
        {
            let mut slot = handle.slot.lock().await;
            if slot.driving || slot.state.phase != WorkflowPhase::Executing {
                return Ok(());
            }
            slot.driving = true;
        }

        loop {
            let batch = {
                let mut slot = handle.slot.lock().await;
                match self.next_batch(&handle, &mut slot.state) {
                    Some(batch) => batch,
                    None => {
                        let saved = self.store.save(&slot.state).await;
                        slot.driving = false;
                        saved?;
                        return Ok(());
                    }
                }
            };

            let results = self.dispatch(batch).await;

            let mut slot = handle.slot.lock().await;
            self.commit(&mut slot.state, results);
            if let Err(e) = self.store.save(&slot.state).await {
                slot.driving = false;
                return Err(e.into());
            }
        }
    }

    /// Marks the next ready tasks running, or settles the workflow and returns `None`
    fn next_batch(&self, handle: &WorkflowHandle, state: &mut AgentState) -> Option<Batch> {
        if state.phase != WorkflowPhase::Executing {
            return None;
        }
        if handle.cancel_requested.load(Ordering::SeqCst) {
            self.finish_cancelled(handle, state);
            return None;
        }
        if let Some(reason) = state.failure.clone() {
            self.finish_failed(handle, state, reason);
            return None;
        }

        let (held, runnable): (Vec<u64>, Vec<u64>) =
            state.plan.ready_tasks().into_iter().partition(|id| {
                state.plan.get(*id).is_some_and(|t| t.requires_review)
                    && !state.reviewed_tasks.contains(id)
            });

        if runnable.is_empty() {
            if state.plan.is_complete() {
                self.finish_completed(handle, state);
            } else if let Some(&task_id) = held.first() {
                state.pending_review = Some(task_id);
                let note = match state.plan.get(task_id) {
                    Some(task) => format!("Task {} needs review before it runs: {}", task_id, task.description),
                    None => format!("Task {} needs review before it runs", task_id),
                };
                self.record_message(state, "orchestrator", note);
                self.transition(handle, state, WorkflowPhase::AwaitingHumanReview);
            } else {
                self.finish_failed(handle, state, "no runnable tasks left".to_string());
            }
            return None;
        }

        let mut batch = Vec::with_capacity(runnable.len());
        for id in runnable {
            if let Err(e) = state.plan.mark_running(id) {
                warn!("Task {} could not start: {}", id, e);
                continue;
            }
            let Some(task) = state.plan.get(id).cloned() else {
                continue;
            };
            let ctx = ExecutionContext {
                thread_id: state.thread_id.clone(),
                user_request: state.user_request.clone(),
                dependency_results: task
                    .dependencies
                    .iter()
                    .filter_map(|dep| state.task_results.get(dep).map(|r| (*dep, r.clone())))
                    .collect(),
            };
            self.record_message(
                state,
                "orchestrator",
                format!("Dispatching task {} ({}): {}", id, task.task_type, task.description),
            );
            self.emit(Event::TaskStarted {
                thread_id: state.thread_id.clone(),
                task_id: id,
                description: task.description.clone(),
            });
            batch.push((task, ctx));
        }
        debug!("Workflow {}: dispatching batch of {}", state.thread_id, batch.len());
        Some(batch)
    }

    async fn dispatch(&self, batch: Batch) -> BatchResults {
        let mut results: BatchResults = stream::iter(batch.into_iter().map(|(task, ctx)| {
            let executor = self.executors.resolve(&task.task_type);
            async move {
                let outcome = match executor {
                    Ok(executor) => executor.execute(&task, &ctx).await,
                    Err(e) => Err(e),
                };
                (task, outcome)
            }
        }))
        .buffer_unordered(self.settings.max_concurrency)
        .collect()
        .await;
        // Commit in id order so the log does not depend on completion order.
        results.sort_by_key(|(task, _)| task.id);
        results
    }

    /// Writes a finished batch into the graph and results map
    fn commit(&self, state: &mut AgentState, results: BatchResults) {
        for (task, outcome) in results {
            let id = task.id;
            let (status, note) = match outcome {
                Ok(output) => {
                    let via = output
                        .backend
                        .as_deref()
                        .map(|b| format!(" via {}", b))
                        .unwrap_or_default();
                    let recorded = state
                        .plan
                        .mark_result(id, TaskStatus::Succeeded, Some(output.output.clone()));
                    if let Err(e) = recorded {
                        error!("Could not record result of task {}: {}", id, e);
                        continue;
                    }
                    state.task_results.insert(id, output.output);
                    (TaskStatus::Succeeded, format!("Task {} succeeded{}", id, via))
                }
                Err(e) if task.required => {
                    let reason = e.to_string();
                    warn!("Required task {} failed: {}", id, reason);
                    if let Err(e) = state.plan.mark_result(id, TaskStatus::Failed, Some(reason.clone())) {
                        error!("Could not record failure of task {}: {}", id, e);
                    }
                    state
                        .failure
                        .get_or_insert_with(|| format!("task {} failed: {}", id, reason));
                    (TaskStatus::Failed, format!("Task {} failed: {}", id, reason))
                }
                Err(e) => {
                    let reason = format!("skipped: {}", e);
                    info!("Optional task {} {}", id, reason);
                    match state.plan.mark_result(id, TaskStatus::Skipped, Some(reason.clone())) {
                        Ok(cascaded) if !cascaded.is_empty() => {
                            info!("Skipped dependents of task {}: {:?}", id, cascaded)
                        }
                        Ok(_) => {}
                        Err(e) => error!("Could not record skip of task {}: {}", id, e),
                    }
                    (TaskStatus::Skipped, format!("Task {} {}", id, reason))
                }
            };
            self.record_message(state, &format!("task:{}", id), note);
            self.emit(Event::TaskFinished {
                thread_id: state.thread_id.clone(),
                task_id: id,
                status,
            });
        }
    }

    fn finish_completed(&self, handle: &WorkflowHandle, state: &mut AgentState) {
        let succeeded = state.plan.count(TaskStatus::Succeeded);
        let skipped = state.plan.count(TaskStatus::Skipped);
        self.transition(handle, state, WorkflowPhase::Completed);
        state.final_report = Some(synthesize_report(state));
        self.record_message(
            state,
            "orchestrator",
            format!(
                "Workflow completed: {} task(s) succeeded, {} skipped",
                succeeded, skipped
            ),
        );
    }

    pub(super) fn finish_failed(&self, handle: &WorkflowHandle, state: &mut AgentState, reason: String) {
        let skipped = state.plan.skip_remaining("skipped: workflow failed");
        if !skipped.is_empty() {
            debug!("Skipped {:?} after failure", skipped);
        }
        error!("Workflow {} failed: {}", state.thread_id, reason);
        state.failure = Some(reason.clone());
        self.transition(handle, state, WorkflowPhase::Failed);
        state.final_report = Some(synthesize_report(state));
        self.record_message(state, "orchestrator", format!("Workflow failed: {}", reason));
    }

    pub(super) fn finish_cancelled(&self, handle: &WorkflowHandle, state: &mut AgentState) {
        state.plan.skip_remaining("skipped: workflow cancelled");
        state.failure = Some("cancelled".to_string());
        state.pending_review = None;
        self.transition(handle, state, WorkflowPhase::Cancelled);
        state.final_report = Some(synthesize_report(state));
        self.record_message(state, "orchestrator", "Workflow cancelled");
    }
}
