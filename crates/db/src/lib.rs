//! Persistence for the authentication core.
//!
//! - [`kv`] -- the key-value backend surface (hash records, TTLs, sorted
//!   indexes, atomic batches) with in-memory and Redis implementations.
//! - [`repositories`] -- the refresh-session store and the user store.

use sqlx::postgres::PgPoolOptions;

pub mod kv;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
