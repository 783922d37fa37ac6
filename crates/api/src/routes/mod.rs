pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/sign-up                                    create account (public)
/// /auth/sign-in                                    sign in (public)
/// /auth/refresh                                    rotate refresh token (cookie)
/// /auth/logout                                     end current session (cookie)
/// /auth/logout-all                                 end all sessions (cookie)
/// /auth/me                                         current user (bearer)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication routes.
        .nest("/auth", auth::router())
}
