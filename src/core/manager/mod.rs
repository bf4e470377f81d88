mod approval;
mod report;
mod run;

use super::executor::ExecutorRegistry;
use super::planner::Planner;
use super::state::{AgentState, WorkflowPhase};
use super::task::NewTask;
use crate::config::OrchestratorConfig;
use crate::db::WorkflowStore;
use crate::errors::WorkflowError;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

pub use report::synthesize_report;

/// Decision on a proposed plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
    /// Re-plan using the feedback, then ask again
    Amend,
}

/// Decision on a task held for mid-run review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Tunables for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Tasks dispatched at once within a batch
    pub max_concurrency: usize,
    pub auto_approve: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            auto_approve: false,
        }
    }
}

impl ManagerSettings {
    /// Concurrency defaults to the number of configured backends
    pub fn from_config(config: &OrchestratorConfig, backend_count: usize) -> Self {
        Self {
            max_concurrency: config.max_concurrency.unwrap_or(backend_count).max(1),
            auto_approve: config.auto_approve,
        }
    }
}

#[derive(Debug)]
struct Slot {
    state: AgentState,
    /// Whether an executing loop currently owns this workflow
    driving: bool,
}

/// One live workflow. The state is only touched under `slot`.
#[derive(Debug)]
struct WorkflowHandle {
    slot: Mutex<Slot>,
    cancel_requested: AtomicBool,
    phase_tx: watch::Sender<WorkflowPhase>,
}

impl WorkflowHandle {
    fn new(state: AgentState) -> Arc<Self> {
        let (phase_tx, _) = watch::channel(state.phase);
        Arc::new(Self {
            slot: Mutex::new(Slot {
                state,
                driving: false,
            }),
            cancel_requested: AtomicBool::new(false),
            phase_tx,
        })
    }

    /// Handle for a state read back from the store
    fn restore(mut state: AgentState) -> Arc<Self> {
        if !state.phase.is_terminal() {
            let requeued = state.plan.requeue_running();
            if !requeued.is_empty() {
                warn!(
                    "Workflow {}: requeued interrupted tasks {:?}",
                    state.thread_id, requeued
                );
            }
        }
        Self::new(state)
    }
}

/// Owns every workflow of this process and exposes the workflow interface
#[derive(Debug)]
pub struct WorkflowManager {
    workflows: RwLock<HashMap<String, Arc<WorkflowHandle>>>,
    planner: Arc<dyn Planner>,
    executors: ExecutorRegistry,
    store: Arc<dyn WorkflowStore>,
    settings: ManagerSettings,
    events: Option<UnboundedSender<Event>>,
}

impl WorkflowManager {
    pub fn new(
        planner: Arc<dyn Planner>,
        executors: ExecutorRegistry,
        store: Arc<dyn WorkflowStore>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            planner,
            executors,
            store,
            settings,
            events: None,
        }
    }

    /// Sends progress events to `tx`
    pub fn with_events(mut self, tx: UnboundedSender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn settings(&self) -> ManagerSettings {
        self.settings
    }

    /// Starts a workflow: plans the request and stops at the approval gate
    /// (or starts executing straight away when auto-approval is on).
    pub async fn create_workflow(self: &Arc<Self>, user_request: &str) -> Result<String, WorkflowError> {
        let thread_id = Uuid::new_v4().to_string();
        let mut state = AgentState::new(thread_id.clone(), user_request.to_string());
        state.push_message("user", user_request);
        self.store.save(&state).await?;

        let handle = WorkflowHandle::new(state);
        self.workflows
            .write()
            .await
            .insert(thread_id.clone(), Arc::clone(&handle));
        info!("Workflow {} created", thread_id);

        self.plan_workflow(&handle, None).await?;
        Ok(thread_id)
    }

    /// Returns a copy of the current state, falling back to the checkpoint store
    pub async fn get_state(&self, thread_id: &str) -> Result<AgentState, WorkflowError> {
        let handle = self.workflows.read().await.get(thread_id).cloned();
        if let Some(handle) = handle {
            return Ok(handle.slot.lock().await.state.clone());
        }
        self.store
            .load(thread_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(thread_id.to_string()))
    }

    /// Checkpoints of every known workflow, oldest first
    pub async fn list_workflows(&self) -> Result<Vec<AgentState>, WorkflowError> {
        Ok(self.store.list().await?)
    }

    /// Inserts new tasks into a live plan, allocating their ids
    pub async fn add_tasks(
        &self,
        thread_id: &str,
        tasks: Vec<NewTask>,
    ) -> Result<Vec<u64>, WorkflowError> {
        let handle = self.handle(thread_id).await?;
        let mut slot = handle.slot.lock().await;
        let phase = slot.state.phase;
        if !matches!(
            phase,
            WorkflowPhase::AwaitingApproval
                | WorkflowPhase::Executing
                | WorkflowPhase::AwaitingHumanReview
        ) {
            return Err(invalid_state(
                thread_id,
                "awaiting_approval, executing or awaiting_human_review",
                phase,
            ));
        }
        let ids = slot.state.inject_tasks(tasks)?;
        self.record_message(&mut slot.state, "human", format!("Added task(s) {:?}", ids));
        if slot.driving {
            // The in-flight batch is not committed yet, so it is stored as pending.
            let mut checkpoint = slot.state.clone();
            checkpoint.plan.requeue_running();
            self.store.save(&checkpoint).await?;
        } else {
            self.store.save(&slot.state).await?;
        }
        info!("Workflow {}: injected tasks {:?}", thread_id, ids);
        Ok(ids)
    }

    /// Stops scheduling new work. In-flight tasks finish and keep their results.
    pub async fn cancel(&self, thread_id: &str) -> Result<(), WorkflowError> {
        let handle = self.handle(thread_id).await?;
        let mut slot = handle.slot.lock().await;
        let phase = slot.state.phase;
        if phase.is_terminal() {
            return Err(invalid_state(thread_id, "a non-terminal phase", phase));
        }
        handle.cancel_requested.store(true, Ordering::SeqCst);
        self.record_message(&mut slot.state, "human", "Cancellation requested");
        if phase == WorkflowPhase::Executing && slot.driving {
            // The loop finalizes after its current batch.
            info!("Workflow {}: cancellation requested", thread_id);
            return Ok(());
        }
        self.finish_cancelled(&handle, &mut slot.state);
        self.store.save(&slot.state).await?;
        Ok(())
    }

    /// Reloads unfinished workflows from the store and resumes the ones that
    /// were executing or planning. Returns how many were restored.
    pub async fn recover(self: &Arc<Self>) -> Result<usize, WorkflowError> {
        let mut restored = 0;
        for state in self.store.list().await? {
            if state.phase.is_terminal() {
                continue;
            }
            let thread_id = state.thread_id.clone();
            let phase = state.phase;
            // An amendment interrupted mid-planning still has its feedback.
            let feedback = if state.plan.is_empty() {
                None
            } else {
                state.user_feedback.clone()
            };
            let handle = {
                let mut workflows = self.workflows.write().await;
                if workflows.contains_key(&thread_id) {
                    continue;
                }
                let handle = WorkflowHandle::restore(state);
                workflows.insert(thread_id.clone(), Arc::clone(&handle));
                handle
            };
            restored += 1;
            info!("Recovered workflow {} in phase {}", thread_id, phase);

            match phase {
                WorkflowPhase::Executing => self.spawn_execution(handle),
                WorkflowPhase::Planning => {
                    let manager = Arc::clone(self);
                    tokio::spawn(async move {
                        if let Err(e) = manager.plan_workflow(&handle, feedback).await {
                            error!("Re-planning recovered workflow failed: {}", e);
                        }
                    });
                }
                _ => {}
            }
        }
        Ok(restored)
    }

    /// Waits until the workflow is neither planning nor executing and returns its state
    pub async fn wait_until_settled(&self, thread_id: &str) -> Result<AgentState, WorkflowError> {
        let handle = self.workflows.read().await.get(thread_id).cloned();
        if let Some(handle) = handle {
            let mut rx = handle.phase_tx.subscribe();
            // The sender lives in the handle we hold, so this cannot close early.
            let _ = rx
                .wait_for(|p| !matches!(p, WorkflowPhase::Planning | WorkflowPhase::Executing))
                .await;
        }
        self.get_state(thread_id).await
    }

    /// Drops terminal workflows from the in-memory registry
    pub async fn evict(&self, thread_ids: &[String]) -> usize {
        let mut workflows = self.workflows.write().await;
        let mut evicted = 0;
        for id in thread_ids {
            let terminal = match workflows.get(id) {
                Some(handle) => handle.slot.lock().await.state.phase.is_terminal(),
                None => false,
            };
            if terminal {
                workflows.remove(id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Live handle for `thread_id`, loading it from the store when needed
    async fn handle(&self, thread_id: &str) -> Result<Arc<WorkflowHandle>, WorkflowError> {
        if let Some(handle) = self.workflows.read().await.get(thread_id) {
            return Ok(Arc::clone(handle));
        }
        let state = self
            .store
            .load(thread_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(thread_id.to_string()))?;
        let mut workflows = self.workflows.write().await;
        let handle = workflows
            .entry(thread_id.to_string())
            .or_insert_with(|| WorkflowHandle::restore(state));
        Ok(Arc::clone(handle))
    }

    /// Appends to the workflow log and mirrors the entry as an event
    fn record_message(&self, state: &mut AgentState, role: &str, content: impl Into<String>) {
        let message = state.push_message(role, content).clone();
        self.emit(Event::NewMessage {
            thread_id: state.thread_id.clone(),
            message,
        });
    }

    fn transition(&self, handle: &WorkflowHandle, state: &mut AgentState, to: WorkflowPhase) {
        let from = state.phase;
        if from == to {
            return;
        }
        state.set_phase(to);
        info!("Workflow {} phase {} -> {}", state.thread_id, from, to);
        handle.phase_tx.send_replace(to);
        self.emit(Event::PhaseChanged {
            thread_id: state.thread_id.clone(),
            from,
            to,
        });
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                warn!("Event receiver dropped");
            }
        }
    }
}

fn invalid_state(thread_id: &str, expected: &str, actual: WorkflowPhase) -> WorkflowError {
    WorkflowError::InvalidState {
        thread_id: thread_id.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
