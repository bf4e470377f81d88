use crate::errors::WorkflowError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub code: u16,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiError({}, {})", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::Json(self);
        (status, body).into_response()
    }
}

/// Unknown workflows are 404, caller mistakes 400, everything else 500
impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = match &err {
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::InvalidState { .. } | WorkflowError::Graph(_) => StatusCode::BAD_REQUEST,
            WorkflowError::Plan(_) | WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, &err.to_string())
    }
}

/// Helper function to create API errors
pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    ApiError {
        message: message.to_string(),
        code: status.as_u16(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GraphError;

    #[test]
    fn workflow_errors_map_to_status_codes() {
        let not_found = ApiError::from(WorkflowError::NotFound("t-1".into()));
        assert_eq!(not_found.code, 404);
        assert!(not_found.message.contains("t-1"));

        let wrong_phase = ApiError::from(WorkflowError::InvalidState {
            thread_id: "t-1".into(),
            expected: "awaiting_approval".into(),
            actual: "executing".into(),
        });
        assert_eq!(wrong_phase.code, 400);

        let bad_graph = ApiError::from(WorkflowError::Graph(GraphError::TaskNotFound(9)));
        assert_eq!(bad_graph.code, 400);
    }

    #[test]
    fn response_carries_the_status() {
        let response = ApiError::from(WorkflowError::NotFound("t-1".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
