//! Key-value backend used for refresh sessions.
//!
//! The session store needs hash records with per-key expiry, sorted
//! per-user indexes, bulk deletion, and a way to apply several writes as one
//! all-or-nothing unit. [`KvStore`] is that surface; writes are queued on a
//! [`KvBatch`] and handed to [`KvStore::atomic`].
//!
//! - [`MemoryKv`] -- single-process store, used in tests and local runs.
//! - [`RedisKv`] -- Redis, with batches sent as `MULTI`/`EXEC` pipelines.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

mod memory;
mod redis_store;

pub use memory::MemoryKv;
pub use redis_store::RedisKv;

/// Errors raised by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// Connection, protocol or transaction failure reported by Redis.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An operation addressed a key holding a different kind of value.
    #[error("Wrong value type at key {0}")]
    WrongType(String),
}

pub type KvResult<T> = Result<T, KvError>;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (or has already expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires after this much time.
    Remaining(Duration),
}

/// A single queued write.
#[derive(Debug, Clone, PartialEq)]
pub enum KvOp {
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },
    ZRem {
        key: String,
        members: Vec<String>,
    },
    /// Remove every member scored at or below `max`.
    ZRemUpTo {
        key: String,
        max: f64,
    },
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
    Del {
        keys: Vec<String>,
    },
}

/// An ordered list of writes applied as one unit by [`KvStore::atomic`].
#[derive(Debug, Clone, Default)]
pub struct KvBatch {
    ops: Vec<KvOp>,
}

impl KvBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zadd(mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> Self {
        self.ops.push(KvOp::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn zrem<I, S>(mut self, key: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        if !members.is_empty() {
            self.ops.push(KvOp::ZRem {
                key: key.into(),
                members,
            });
        }
        self
    }

    pub fn zrem_up_to(mut self, key: impl Into<String>, max: f64) -> Self {
        self.ops.push(KvOp::ZRemUpTo {
            key: key.into(),
            max,
        });
        self
    }

    pub fn hset<I, F, V>(mut self, key: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<String>,
    {
        self.ops.push(KvOp::HSet {
            key: key.into(),
            fields: fields
                .into_iter()
                .map(|(f, v)| (f.into(), v.into()))
                .collect(),
        });
        self
    }

    pub fn expire(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.ops.push(KvOp::Expire {
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn del<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if !keys.is_empty() {
            self.ops.push(KvOp::Del { keys });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[KvOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<KvOp> {
        self.ops
    }
}

/// The operations a key-value backend must offer.
///
/// Reads are individual calls. Every write goes through [`KvStore::atomic`]
/// (apart from [`KvStore::del`]) so multi-key changes either all apply or
/// none do.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// All fields of the hash at `key`; empty if the key is missing.
    async fn hgetall(&self, key: &str) -> KvResult<HashMap<String, String>>;

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl>;

    /// Members of the sorted set at `key`, lowest score first.
    async fn zmembers(&self, key: &str) -> KvResult<Vec<String>>;

    async fn zcard(&self, key: &str) -> KvResult<u64>;

    /// Number of members of the sorted set at `key` whose score is strictly
    /// greater than `min`.
    async fn zcount_above(&self, key: &str, min: f64) -> KvResult<u64>;

    /// Delete the given keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> KvResult<u64>;

    /// Apply every queued write, or none of them.
    async fn atomic(&self, batch: KvBatch) -> KvResult<()>;

    async fn ping(&self) -> KvResult<()>;
}
