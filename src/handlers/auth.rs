use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::ApiError,
    middleware::{CurrentUser, AUTH_COOKIE},
    models::{Company, LoginRequest, Signup, User},
    utils::create_token,
    AppState,
};

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
}

fn issue_token(state: &AppState, cookies: &Cookies, user: &User) -> Result<String, ApiError> {
    let token = create_token(
        &state.auth.jwt_secret,
        user.id,
        user.email.clone(),
        state.auth.token_ttl_hours,
    )?;

    // Set secure HTTP-only cookie with JWT token
    let cookie = Cookie::build((AUTH_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(state.auth.token_ttl_hours))
        .build();

    cookies.add(cookie);
    Ok(token)
}

pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: Result<Json<Signup>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(signup) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (company, user) = state.engine.signup(signup).await?;
    let token = issue_token(&state, &cookies, &user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user, company: Some(company) })))
}

/// Identity is asserted by email alone; there are no credentials to check.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user = state
        .engine
        .find_by_email(&request.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let token = issue_token(&state, &cookies, &user)?;
    log::info!("User {} logged in", user.id);

    Ok(Json(AuthResponse { token, user, company: None }))
}

pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
    StatusCode::NO_CONTENT
}

pub async fn me(current_user: CurrentUser) -> Json<CurrentUser> {
    Json(current_user)
}
