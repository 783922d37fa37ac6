use std::time::Duration;

use listkeep_core::session::{
    SessionPolicy, DEFAULT_MAX_SESSIONS_PER_USER, DEFAULT_SESSION_TTL_DAYS,
};

use crate::auth::jwt::JwtConfig;

/// Default bound on any single backend call made by the auth service.
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 5;

/// Longest accepted `SESSION_TTL_DAYS` (ten years).
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// Backend calls a sign-in makes on top of one eviction per stored session:
/// credential lookup, session count, session listing, session create.
const SIGN_IN_FIXED_BACKEND_CALLS: u64 = 4;

/// Parse `SESSION_TTL_DAYS`: a whole number of days in
/// `1..=MAX_SESSION_TTL_DAYS`.
pub fn parse_session_ttl_days(raw: &str) -> Result<i64, String> {
    let days: i64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("SESSION_TTL_DAYS must be a valid i64: {e}"))?;
    if !(1..=MAX_SESSION_TTL_DAYS).contains(&days) {
        return Err(format!(
            "SESSION_TTL_DAYS must be between 1 and {MAX_SESSION_TTL_DAYS}, got {days}"
        ));
    }
    Ok(days)
}

/// Session and credential settings for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Fixed salt mixed into every password hash.
    pub password_salt: String,
    /// Refresh session lifetime in days (default: 30).
    pub session_ttl_days: i64,
    /// Soft cap on live sessions per user (default: 5).
    pub max_sessions_per_user: usize,
    /// Upper bound on each session-store / user-store call, in seconds.
    pub backend_timeout_secs: u64,
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// | Env Var                 | Required | Default |
    /// |-------------------------|----------|---------|
    /// | `PASSWORD_SALT`         | **yes**  | --      |
    /// | `SESSION_TTL_DAYS`      | no       | `30` (max `3650`) |
    /// | `MAX_SESSIONS_PER_USER` | no       | `5`     |
    /// | `BACKEND_TIMEOUT_SECS`  | no       | `5`     |
    ///
    /// # Panics
    ///
    /// Panics if `PASSWORD_SALT` is missing, a numeric value fails to parse, or
    /// `SESSION_TTL_DAYS` is outside `1..=3650`.
    pub fn from_env() -> Self {
        let password_salt =
            std::env::var("PASSWORD_SALT").expect("PASSWORD_SALT must be set in the environment");

        let session_ttl_days = parse_session_ttl_days(
            &std::env::var("SESSION_TTL_DAYS")
                .unwrap_or_else(|_| DEFAULT_SESSION_TTL_DAYS.to_string()),
        )
        .unwrap_or_else(|e| panic!("{e}"));

        let max_sessions_per_user: usize = std::env::var("MAX_SESSIONS_PER_USER")
            .unwrap_or_else(|_| DEFAULT_MAX_SESSIONS_PER_USER.to_string())
            .parse()
            .expect("MAX_SESSIONS_PER_USER must be a valid usize");

        let backend_timeout_secs: u64 = std::env::var("BACKEND_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_BACKEND_TIMEOUT_SECS.to_string())
            .parse()
            .expect("BACKEND_TIMEOUT_SECS must be a valid u64");

        Self {
            password_salt,
            session_ttl_days,
            max_sessions_per_user,
            backend_timeout_secs,
        }
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            ttl: chrono::Duration::days(self.session_ttl_days.clamp(1, MAX_SESSION_TTL_DAYS)),
            max_per_user: self.max_sessions_per_user,
        }
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have sensible defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Password salt and session limits.
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            auth: AuthConfig::from_env(),
        }
    }

    /// Deadline for a whole HTTP request.
    ///
    /// Never shorter than a worst-case sign-in: every backend call it can make
    /// (one eviction per stored session plus the fixed calls) running to the
    /// backend timeout.
    pub fn request_timeout(&self) -> Duration {
        let calls = self.auth.max_sessions_per_user as u64 + SIGN_IN_FIXED_BACKEND_CALLS;
        let backend_budget = self.auth.backend_timeout_secs.saturating_mul(calls);
        Duration::from_secs(self.request_timeout_secs.max(backend_budget))
    }
}
