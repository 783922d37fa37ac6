//! Listkeep API server library.
//!
//! Exposes the authentication core (password hashing, access tokens, the
//! session orchestrator) together with config, state, error handling and
//! routes, so integration tests and the binary entrypoint can both use them.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
