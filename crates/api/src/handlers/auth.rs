//! Handlers for the `/auth` resource (sign-up, sign-in, refresh, logout).
//!
//! The refresh token travels in an HTTP-only `refreshToken` cookie. Sign-in
//! and refresh also return both tokens in the JSON body.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use listkeep_core::error::CoreError;
use listkeep_core::session::Tokens;
use listkeep_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Path the refresh cookie is scoped to.
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/sign-up`.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Response body for `POST /auth/sign-up`.
#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub id: DbId,
}

/// Request body for `POST /auth/sign-in`.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// Successful authentication response returned by sign-in and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Response body for `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: DbId,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/sign-up
///
/// Create an account. Returns 201 with the new user id, 409 if the username
/// is taken.
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SignUpResponse>)> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let id = state
        .auth
        .sign_up(&input.name, &input.username, &input.password)
        .await?;

    Ok((StatusCode::CREATED, Json(SignUpResponse { id })))
}

/// POST /api/v1/auth/sign-in
///
/// Authenticate with username + password. Returns access and refresh tokens
/// and sets the refresh cookie.
pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let tokens = state.auth.sign_in(&input.username, &input.password).await?;

    Ok(token_response(&state, tokens))
}

/// POST /api/v1/auth/refresh
///
/// Exchange the refresh cookie for new access + refresh tokens. The old
/// refresh token stops working immediately.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let refresh_token = refresh_cookie(&headers)?;
    let tokens = state.auth.refresh(&refresh_token).await?;
    Ok(token_response(&state, tokens))
}

/// POST /api/v1/auth/logout
///
/// End the session behind the refresh cookie. Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let refresh_token = refresh_cookie(&headers)?;
    state.auth.logout(&refresh_token).await?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, clear_cookie())]))
}

/// POST /api/v1/auth/logout-all
///
/// End every session of the user owning the refresh cookie. Returns 204.
pub async fn logout_all(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let refresh_token = refresh_cookie(&headers)?;
    state.auth.logout_all(&refresh_token).await?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, clear_cookie())]))
}

/// GET /api/v1/auth/me
///
/// Echo the user id behind the bearer token.
pub async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn token_response(state: &AppState, tokens: Tokens) -> impl IntoResponse {
    let cookie = session_cookie(&tokens.refresh_token);
    let body = AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: state.config.jwt.access_token_expiry_secs(),
    };
    ([(SET_COOKIE, cookie)], Json(body))
}

fn session_cookie(refresh_token: &str) -> String {
    format!("{REFRESH_COOKIE}={refresh_token}; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict")
}

fn clear_cookie() -> String {
    format!("{REFRESH_COOKIE}=; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict; Max-Age=0")
}

/// Pull the refresh token out of the request's `Cookie` headers.
fn refresh_cookie(headers: &HeaderMap) -> AppResult<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == REFRESH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Missing refresh token".into())))
}
