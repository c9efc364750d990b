use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::{ApiError, WorkflowError},
    models::{Role, User},
    utils::verify_token,
    workflow::policy::can_manage_team,
    AppState,
};

pub const AUTH_COOKIE: &str = "auth_token";

/// The authenticated caller, resolved from a bearer token or the
/// `auth_token` cookie.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub company_id: Uuid,
    // Helper flags for clients deciding what to show
    pub has_expense_approval: bool,
    pub has_team_manage: bool,
}

impl CurrentUser {
    pub fn from_user(user: User) -> Self {
        let has_expense_approval = user.role.can_approve();
        let has_team_manage = can_manage_team(&user);

        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            company_id: user.company_id,
            has_expense_approval,
            has_team_manage,
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts) {
            Some(token) => token,
            None => Cookies::from_request_parts(parts, state)
                .await
                .ok()
                .and_then(|cookies| cookies.get(AUTH_COOKIE).map(|c| c.value().to_string()))
                .ok_or(ApiError::Unauthorized)?,
        };

        let claims = verify_token(&state.auth.jwt_secret, &token).map_err(|e| {
            log::debug!("Rejected token: {}", e);
            ApiError::Unauthorized
        })?;
        let user_id = claims.user_id().ok_or(ApiError::Unauthorized)?;

        match state.engine.user(user_id).await {
            Ok(user) => Ok(CurrentUser::from_user(user)),
            Err(WorkflowError::NotFound(_)) => Err(ApiError::Unauthorized),
            Err(err) => Err(err.into()),
        }
    }
}
