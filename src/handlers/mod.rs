pub mod auth;
pub mod expenses;
pub mod team;
pub mod dashboard;

use axum::{
    extract::{rejection::PathRejection, Path},
    response::Json,
};
use uuid::Uuid;

use crate::error::ApiError;

pub use dashboard::dashboard;

/// Unwraps an id path segment, answering malformed ids with the JSON error body.
pub(crate) fn path_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(id)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
