//! Authentication primitives and the session orchestrator.
//!
//! - [`password`] -- the pluggable password hasher.
//! - [`jwt`] -- access-token issuance/validation and refresh-token generation.
//! - [`service`] -- sign-in, refresh rotation, logout and logout-all.

pub mod jwt;
pub mod password;
pub mod service;
