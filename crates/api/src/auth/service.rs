//! Sign-in, refresh rotation, logout and logout-all.
//!
//! [`AuthService`] composes the password hasher, the token issuer, the user
//! store and the session repository. Every backend call is bounded by
//! `backend_timeout`; an elapsed call is reported as
//! [`CoreError::Internal`]. Each multi-key write is a single atomic batch in
//! the session store, so a timed-out call leaves that unit either applied or
//! untouched.
//!
//! The per-user session bound is a check-then-act sequence with no lock
//! around it. Two concurrent sign-ins for the same user can both pass the
//! count check before either writes, so the bound is a soft target.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use listkeep_core::error::CoreError;
use listkeep_core::session::{plan_eviction, Session, SessionPolicy, Tokens};
use listkeep_core::types::DbId;
use listkeep_core::user::NewUser;
use listkeep_db::kv::KvStore;
use listkeep_db::repositories::{SessionRepo, UserStore};

use crate::auth::jwt::{generate_refresh_token, TokenIssuer};
use crate::auth::password::PasswordHasher;

/// Reachability of the two backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendHealth {
    pub sessions: bool,
    pub users: bool,
}

/// Authentication orchestrator.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: SessionRepo,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenIssuer,
    policy: SessionPolicy,
    backend_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        kv: Arc<dyn KvStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: TokenIssuer,
        policy: SessionPolicy,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            users,
            sessions: SessionRepo::new(kv),
            hasher,
            tokens,
            policy,
            backend_timeout,
        }
    }

    pub fn sessions(&self) -> &SessionRepo {
        &self.sessions
    }

    /// Run one backend call under the configured deadline.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        match tokio::time::timeout(self.backend_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(op, timeout = ?self.backend_timeout, "Backend call timed out");
                Err(CoreError::Internal(format!("{op} timed out")))
            }
        }
    }

    /// Register a new user. Returns the new user's id.
    pub async fn sign_up(
        &self,
        name: &str,
        username: &str,
        password: &str,
    ) -> Result<DbId, CoreError> {
        if name.trim().is_empty() || username.trim().is_empty() || password.is_empty() {
            return Err(CoreError::Validation(
                "name, username and password are required".into(),
            ));
        }

        let input = NewUser {
            name: name.to_string(),
            username: username.to_string(),
            password_hash: self.hasher.hash(password),
        };
        let user_id = self
            .bounded("create_user", async {
                self.users.create(&input).await.map_err(CoreError::from)
            })
            .await?;

        tracing::info!(user_id, username, "User created");
        Ok(user_id)
    }

    /// Verify credentials and open a new session, evicting the oldest ones
    /// if the user is at the session bound.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Tokens, CoreError> {
        let password_hash = self.hasher.hash(password);
        let user = self
            .bounded("verify_credentials", async {
                self.users
                    .find_by_credentials(username, &password_hash)
                    .await
                    .map_err(CoreError::from)
            })
            .await?
            .ok_or(CoreError::InvalidCredentials)?;

        let access_token = self.tokens.issue(user.id)?;
        let refresh_token = generate_refresh_token();

        self.enforce_session_bound(user.id).await?;
        self.open_session(user.id, &refresh_token).await?;

        tracing::info!(user_id = user.id, "User signed in");
        Ok(Tokens {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new token pair. The presented token is
    /// dead afterwards.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens, CoreError> {
        let session = self.resolve(refresh_token).await?;

        let access_token = self.tokens.issue(session.user_id)?;

        self.bounded("delete_user_session", async {
            self.sessions
                .delete_user_session(session.user_id, refresh_token)
                .await
                .map_err(CoreError::from)
        })
        .await?;

        let new_refresh_token = generate_refresh_token();
        self.open_session(session.user_id, &new_refresh_token).await?;

        tracing::info!(user_id = session.user_id, "Refresh token rotated");
        Ok(Tokens {
            access_token,
            refresh_token: new_refresh_token,
        })
    }

    /// End the session identified by `refresh_token`.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), CoreError> {
        let session = self.resolve(refresh_token).await?;
        self.bounded("delete_user_session", async {
            self.sessions
                .delete_user_session(session.user_id, refresh_token)
                .await
                .map_err(CoreError::from)
        })
        .await?;

        tracing::info!(user_id = session.user_id, "Session logged out");
        Ok(())
    }

    /// End every session of the user owning `refresh_token`.
    pub async fn logout_all(&self, refresh_token: &str) -> Result<(), CoreError> {
        let session = self.resolve(refresh_token).await?;
        let removed = self
            .bounded("delete_all_user_sessions", async {
                self.sessions
                    .delete_all_user_sessions(session.user_id)
                    .await
                    .map_err(CoreError::from)
            })
            .await?;

        tracing::info!(user_id = session.user_id, removed, "All sessions logged out");
        Ok(())
    }

    /// Validate an access token and return its user id.
    pub fn parse_access_token(&self, token: &str) -> Result<DbId, CoreError> {
        self.tokens.parse(token)
    }

    /// Authenticate an `Authorization` header value of the form
    /// `Bearer <token>`.
    pub fn authenticate(&self, header: Option<&str>) -> Result<DbId, CoreError> {
        let header = header
            .ok_or_else(|| CoreError::Unauthorized("Missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                CoreError::Unauthorized(
                    "Invalid Authorization format. Expected: Bearer <token>".into(),
                )
            })?;

        self.parse_access_token(token)
    }

    pub async fn backend_health(&self) -> BackendHealth {
        let sessions = self.sessions.store().ping();
        let users = self.users.ping();
        let (sessions, users) = tokio::join!(
            tokio::time::timeout(self.backend_timeout, sessions),
            tokio::time::timeout(self.backend_timeout, users),
        );
        BackendHealth {
            sessions: matches!(sessions, Ok(Ok(()))),
            users: matches!(users, Ok(Ok(()))),
        }
    }

    async fn resolve(&self, refresh_token: &str) -> Result<Session, CoreError> {
        self.bounded("get_session", async {
            self.sessions.get_session(refresh_token).await.map_err(CoreError::from)
        })
        .await
    }

    /// Delete sessions until the new one fits under the bound.
    async fn enforce_session_bound(&self, user_id: DbId) -> Result<(), CoreError> {
        let count = self
            .bounded("get_cnt_sessions", async {
                self.sessions.get_cnt_sessions(user_id).await.map_err(CoreError::from)
            })
            .await?;

        let max = self.policy.max_per_user;
        if count < max as u64 {
            return Ok(());
        }

        let sessions = self
            .bounded("get_all_sessions", async {
                self.sessions.get_all_sessions(user_id).await.map_err(CoreError::from)
            })
            .await?;

        for session in plan_eviction(sessions, max, Utc::now()) {
            self.bounded("delete_user_session", async {
                self.sessions
                    .delete_user_session(user_id, &session.id)
                    .await
                    .map_err(CoreError::from)
            })
            .await?;
            tracing::info!(
                user_id,
                expires_at = %session.expires_at,
                "Evicted session to stay within per-user bound"
            );
        }
        Ok(())
    }

    async fn open_session(&self, user_id: DbId, refresh_token: &str) -> Result<(), CoreError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.policy.ttl)
            .ok_or_else(|| CoreError::Internal("session TTL out of range".into()))?;
        let session = Session {
            id: refresh_token.to_string(),
            user_id,
            expires_at,
        };
        self.bounded("create_session", async {
            self.sessions.create_session(&session).await.map_err(CoreError::from)
        })
        .await
    }
}
