//! Password hashing behind the [`PasswordHasher`] trait.
//!
//! Credentials are verified by hashing the presented password and asking the
//! user store for a row with the same username and digest, so a hasher must
//! be deterministic. [`SaltedSha1Hasher`] reproduces the stored format of
//! existing accounts: a single fixed salt and one SHA-1 pass. It is fast and
//! has no per-user salt, which makes it weak against offline guessing. A
//! replacement (per-user salt, adaptive cost) only needs to implement this
//! trait, plus a migration of stored hashes.

use sha1::{Digest, Sha1};

/// Deterministic one-way transform of a plaintext password.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
}

/// Hex of `salt || sha1(password)`.
#[derive(Debug, Clone)]
pub struct SaltedSha1Hasher {
    salt: String,
}

impl SaltedSha1Hasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl PasswordHasher for SaltedSha1Hasher {
    fn hash(&self, password: &str) -> String {
        let digest = Sha1::digest(password.as_bytes());
        let mut material = Vec::with_capacity(self.salt.len() + digest.len());
        material.extend_from_slice(self.salt.as_bytes());
        material.extend_from_slice(&digest);
        hex::encode(material)
    }
}
