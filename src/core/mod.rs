//! Core of the orchestrator
//!
//! This module contains:
//! - The task graph and its sub-tasks
//! - Durable workflow state
//! - Planners and task executors
//! - The workflow manager driving each workflow through its phases

mod cleanup;
mod executor;
mod manager;
mod planner;
mod state;
mod task;
mod task_graph;

pub use cleanup::*;
pub use executor::*;
pub use manager::*;
pub use planner::*;
pub use state::*;
pub use task::*;
pub use task_graph::*;
