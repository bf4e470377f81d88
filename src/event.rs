use crate::core::{TaskStatus, WorkflowMessage, WorkflowPhase};

/// Represents different events emitted while workflows progress
#[derive(Debug, Clone)]
pub enum Event {
    /// A workflow moved from one phase to another
    PhaseChanged {
        thread_id: String,
        from: WorkflowPhase,
        to: WorkflowPhase,
    },

    /// A task was dispatched to its executor
    TaskStarted {
        thread_id: String,
        task_id: u64,
        description: String,
    },

    /// A dispatched task reached a terminal status
    TaskFinished {
        thread_id: String,
        task_id: u64,
        status: TaskStatus,
    },

    /// A new entry was appended to a workflow's message log
    NewMessage {
        thread_id: String,
        message: WorkflowMessage,
    },
}

impl Event {
    pub fn thread_id(&self) -> &str {
        match self {
            Event::PhaseChanged { thread_id, .. }
            | Event::TaskStarted { thread_id, .. }
            | Event::TaskFinished { thread_id, .. }
            | Event::NewMessage { thread_id, .. } => thread_id,
        }
    }
}
