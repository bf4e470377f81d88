use crate::api::errors::ApiError;
use crate::core::{AgentState, ApprovalDecision, NewTask, ReviewDecision, WorkflowManager};
use crate::health::{HealthHandle, HealthSnapshot};
use axum::http::StatusCode;
use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request payload for creating a workflow
#[derive(Deserialize)]
pub struct CreateWorkflowRequest {
    pub request: String,
}

#[derive(Serialize)]
pub struct CreateWorkflowResponse {
    pub thread_id: String,
    pub phase: String,
}

#[derive(Deserialize)]
pub struct ApprovalRequest {
    pub decision: ApprovalDecision,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Deserialize)]
pub struct AddTasksRequest {
    pub tasks: Vec<NewTask>,
}

#[derive(Serialize)]
pub struct AddTasksResponse {
    pub task_ids: Vec<u64>,
}

/// Creates a workflow and returns once its plan awaits approval
#[axum::debug_handler]
pub async fn create_workflow(
    Extension(manager): Extension<Arc<WorkflowManager>>,
    Json(payload): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<CreateWorkflowResponse>), ApiError> {
    let thread_id = manager.create_workflow(&payload.request).await?;
    let state = manager.get_state(&thread_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateWorkflowResponse {
            thread_id,
            phase: state.phase.to_string(),
        }),
    ))
}

#[axum::debug_handler]
pub async fn get_workflow(
    Path(thread_id): Path<String>,
    Extension(manager): Extension<Arc<WorkflowManager>>,
) -> Result<Json<AgentState>, ApiError> {
    Ok(Json(manager.get_state(&thread_id).await?))
}

#[axum::debug_handler]
pub async fn list_workflows(
    Extension(manager): Extension<Arc<WorkflowManager>>,
) -> Result<Json<Vec<AgentState>>, ApiError> {
    Ok(Json(manager.list_workflows().await?))
}

#[axum::debug_handler]
pub async fn submit_approval(
    Path(thread_id): Path<String>,
    Extension(manager): Extension<Arc<WorkflowManager>>,
    Json(payload): Json<ApprovalRequest>,
) -> Result<StatusCode, ApiError> {
    manager
        .submit_approval(&thread_id, payload.decision, payload.feedback)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
pub async fn submit_review(
    Path(thread_id): Path<String>,
    Extension(manager): Extension<Arc<WorkflowManager>>,
    Json(payload): Json<ReviewRequest>,
) -> Result<StatusCode, ApiError> {
    manager
        .submit_review(&thread_id, payload.decision, payload.feedback)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
pub async fn add_tasks(
    Path(thread_id): Path<String>,
    Extension(manager): Extension<Arc<WorkflowManager>>,
    Json(payload): Json<AddTasksRequest>,
) -> Result<Json<AddTasksResponse>, ApiError> {
    let task_ids = manager.add_tasks(&thread_id, payload.tasks).await?;
    Ok(Json(AddTasksResponse { task_ids }))
}

#[axum::debug_handler]
pub async fn cancel_workflow(
    Path(thread_id): Path<String>,
    Extension(manager): Extension<Arc<WorkflowManager>>,
) -> Result<StatusCode, ApiError> {
    manager.cancel(&thread_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Latest backend health snapshot
#[axum::debug_handler]
pub async fn get_health(Extension(health): Extension<HealthHandle>) -> Json<HealthSnapshot> {
    Json((*health.snapshot()).clone())
}
