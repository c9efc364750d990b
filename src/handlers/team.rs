use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::path_id;
use crate::{
    error::ApiError,
    middleware::CurrentUser,
    models::{CreateUser, User},
    AppState,
};

pub async fn users_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.engine.team(current_user.id).await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    payload: Result<Json<CreateUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(new_user) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user = state.engine.create_user(current_user.id, new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateUser>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let user_id = path_id(path)?;
    let Json(changes) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user = state.engine.update_user(current_user.id, user_id, changes).await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let user_id = path_id(path)?;
    state.engine.delete_user(current_user.id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
