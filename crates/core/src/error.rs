/// Error kinds surfaced by the authentication core.
///
/// Store-level failures are translated into these at the orchestrator
/// boundary; raw backend errors never escape past it.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already in use: {0}")]
    UsernameConflict(String),

    #[error("Session expired or invalid")]
    SessionExpiredOrInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token signature")]
    InvalidTokenSignature,

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The request carried no usable credential (e.g. malformed bearer header).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// True for the kinds that mean "the caller is not authenticated".
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidCredentials
                | CoreError::SessionExpiredOrInvalid
                | CoreError::TokenExpired
                | CoreError::InvalidTokenSignature
                | CoreError::Unauthorized(_)
        )
    }
}
