//! API routes configuration module

use crate::api::handlers::{
    add_tasks, cancel_workflow, create_workflow, get_health, get_workflow, list_workflows,
    submit_approval, submit_review,
};
use crate::core::WorkflowManager;
use crate::health::HealthHandle;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

/// Creates the API router over a workflow manager and the health snapshot
pub fn app(manager: Arc<WorkflowManager>, health: HealthHandle) -> Router {
    Router::new()
        .route("/workflows", post(create_workflow).get(list_workflows))
        .route("/workflows/:id", get(get_workflow))
        .route("/workflows/:id/approval", post(submit_approval))
        .route("/workflows/:id/review", post(submit_review))
        .route("/workflows/:id/tasks", post(add_tasks))
        .route("/workflows/:id/cancel", post(cancel_workflow))
        .route("/health", get(get_health))
        .layer(Extension(manager))
        .layer(Extension(health))
}
