//! Repository for the `users` table.
//!
//! The authentication core only needs to create users and to look one up
//! by username plus password hash, so that is all [`UserStore`] exposes.

use async_trait::async_trait;
use listkeep_core::error::CoreError;
use listkeep_core::types::DbId;
use listkeep_core::user::{NewUser, User};
use sqlx::{FromRow, PgPool};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, username, password_hash";

/// PostgreSQL unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("Username already in use: {0}")]
    UsernameTaken(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<UserStoreError> for CoreError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::UsernameTaken(username) => CoreError::UsernameConflict(username),
            UserStoreError::Database(e) => {
                tracing::error!(error = %e, "User store failure");
                CoreError::Internal(format!("user store: {e}"))
            }
        }
    }
}

/// Credential lookup and sign-up persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, returning its id.
    async fn create(&self, input: &NewUser) -> Result<DbId, UserStoreError>;

    /// Find the user whose username and stored hash both match.
    async fn find_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<User>, UserStoreError>;

    async fn ping(&self) -> Result<(), UserStoreError>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: DbId,
    name: String,
    username: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            username: row.username,
            password_hash: row.password_hash,
        }
    }
}

/// [`UserStore`] on PostgreSQL.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, input: &NewUser) -> Result<DbId, UserStoreError> {
        let result = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO users (name, username, password_hash)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(&input.name)
        .bind(&input.username)
        .bind(&input.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Err(UserStoreError::UsernameTaken(input.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<User>, UserStoreError> {
        let query =
            format!("SELECT {COLUMNS} FROM users WHERE username = $1 AND password_hash = $2");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
