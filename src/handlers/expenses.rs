use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::path_id;
use crate::{
    error::ApiError,
    middleware::CurrentUser,
    models::{Decision, Expense, ExpenseDraft, ExpenseStatus},
    AppState,
};

// Empty strings are treated as "no filter" so dashboard forms can submit
// every field unconditionally.
#[derive(Deserialize)]
pub struct ExpenseFilters {
    status: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DecisionRequest {
    comment: Option<String>,
}

impl DecisionRequest {
    // Empty body: no comment. Any other body must parse, whatever its Content-Type.
    fn from_body(body: &Bytes) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid decision body: {}", e)))
    }
}

pub async fn expenses_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filters): Query<ExpenseFilters>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let status = match filters.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(s.parse::<ExpenseStatus>().map_err(ApiError::BadRequest)?),
    };

    let user_id = match filters.user_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(
            Uuid::parse_str(s).map_err(|_| ApiError::BadRequest(format!("invalid user_id '{}'", s)))?,
        ),
    };

    let expenses = state.engine.list(current_user.id, status, user_id).await?;
    Ok(Json(expenses))
}

pub async fn create_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    payload: Result<Json<ExpenseDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let Json(draft) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let expense = state.engine.submit(draft, current_user.id).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn expense_detail(
    State(state): State<AppState>,
    current_user: CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Expense>, ApiError> {
    let expense_id = path_id(path)?;
    let expense = state.engine.get(expense_id, current_user.id).await?;
    Ok(Json(expense))
}

pub async fn approve_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> Result<Json<Expense>, ApiError> {
    decide(state, current_user, path_id(path)?, Decision::Approved, &body).await
}

pub async fn reject_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> Result<Json<Expense>, ApiError> {
    decide(state, current_user, path_id(path)?, Decision::Rejected, &body).await
}

async fn decide(
    state: AppState,
    current_user: CurrentUser,
    expense_id: Uuid,
    decision: Decision,
    body: &Bytes,
) -> Result<Json<Expense>, ApiError> {
    let request = DecisionRequest::from_body(body)?;
    let expense = state
        .engine
        .decide(expense_id, current_user.id, decision, request.comment)
        .await?;
    Ok(Json(expense))
}
