use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ExpenseStatus;

/// Failures raised by a storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("expense {id} is already {status}")]
    NotPending { id: Uuid, status: ExpenseStatus },

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} is still referenced")]
    InUse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Failures raised by the approval workflow engine.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("expense {id} is {status}; only Pending expenses can be decided")]
    InvalidState { id: Uuid, status: ExpenseStatus },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => WorkflowError::NotFound(format!("{} {}", entity, id)),
            StoreError::NotPending { id, status } => WorkflowError::InvalidState { id, status },
            StoreError::Conflict(what) => WorkflowError::Validation(format!("{} already exists", what)),
            StoreError::InUse(what) => WorkflowError::Conflict(format!("{} is still referenced", what)),
            other => WorkflowError::Store(other),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Error surfaced by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Workflow(err) => match err {
                WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                WorkflowError::InvalidState { .. } => StatusCode::CONFLICT,
                WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
                WorkflowError::Conflict(_) => StatusCode::CONFLICT,
                WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            log::error!("request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_pending_becomes_invalid_state() {
        let id = Uuid::new_v4();
        let err: WorkflowError = StoreError::NotPending { id, status: ExpenseStatus::Approved }.into();
        assert!(matches!(err, WorkflowError::InvalidState { status: ExpenseStatus::Approved, .. }));
    }

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        let id = Uuid::new_v4();
        let cases = vec![
            (WorkflowError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::NotFound("expense".into()), StatusCode::NOT_FOUND),
            (WorkflowError::InvalidState { id, status: ExpenseStatus::Rejected }, StatusCode::CONFLICT),
            (WorkflowError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (WorkflowError::from(StoreError::InUse("user".into())), StatusCode::CONFLICT),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }
}
