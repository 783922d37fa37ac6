//! Domain types shared by the persistence and API crates.
//!
//! This crate has no I/O. It holds the error kinds every layer translates
//! into, the session and user models, and the pure eviction rule applied at
//! sign-in.

pub mod error;
pub mod session;
pub mod types;
pub mod user;
