use axum::{
    extract::State,
    response::Json,
};
use chrono::Utc;

use crate::{
    error::ApiError,
    middleware::CurrentUser,
    workflow::DashboardSummary,
    AppState,
};

pub async fn dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<DashboardSummary>, ApiError> {
    let today = Utc::now().date_naive();
    let summary = state.engine.dashboard(current_user.id, today).await?;
    Ok(Json(summary))
}
