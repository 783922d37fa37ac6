use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use listkeep_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `listkeep_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Status code, machine-readable code and client-facing message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid username or password".to_string(),
                ),
                CoreError::SessionExpiredOrInvalid => (
                    StatusCode::UNAUTHORIZED,
                    "SESSION_EXPIRED_OR_INVALID",
                    "Session expired or invalid".to_string(),
                ),
                CoreError::TokenExpired => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_EXPIRED",
                    "Token is expired".to_string(),
                ),
                CoreError::InvalidTokenSignature => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN_SIGNATURE",
                    "Invalid token signature".to_string(),
                ),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::UsernameConflict(_) => (
                    StatusCode::CONFLICT,
                    "USERNAME_CONFLICT",
                    "Username already in use".to_string(),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if matches!(&self, AppError::Core(core) if core.is_auth_failure()) {
            tracing::debug!(code, "Rejected request: {message}");
        }

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_kinds_map_to_401() {
        for err in [
            CoreError::InvalidCredentials,
            CoreError::SessionExpiredOrInvalid,
            CoreError::TokenExpired,
            CoreError::InvalidTokenSignature,
            CoreError::Unauthorized("x".into()),
        ] {
            assert_eq!(AppError::from(err).parts().0, StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn conflict_and_validation_statuses() {
        let conflict = AppError::from(CoreError::UsernameConflict("bob".into()));
        assert_eq!(conflict.parts().0, StatusCode::CONFLICT);

        let invalid = AppError::from(CoreError::Validation("missing".into()));
        assert_eq!(invalid.parts().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = AppError::from(CoreError::Internal("redis: connection refused".into()));
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("redis"));
    }
}
