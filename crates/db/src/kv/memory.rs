//! In-process [`KvStore`] backed by a single mutex-guarded map.
//!
//! Expiry is lazy: a lapsed key is dropped the next time anything touches
//! it. Batches are applied to a staged copy and swapped in only if every
//! operation succeeds.
//!
//! Key expiry runs on the tokio clock, so paused-clock tests can advance it.
//! Sorted-set scores are opaque numbers chosen by the caller; the session
//! repository scores by wall-clock expiry (`Utc::now()`), which a paused
//! tokio clock does not move. Tests that rely on index scores lapsing must
//! wait in real time.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{KeyTtl, KvBatch, KvError, KvOp, KvResult, KvStore};

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    SortedSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

type Entries = HashMap<String, Entry>;

/// Single-process key-value store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<Entries>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drop `key` if it has expired, then return whatever is left.
fn live<'a>(entries: &'a mut Entries, key: &str, now: Instant) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn live_or_insert<'a>(
    entries: &'a mut Entries,
    key: &str,
    now: Instant,
    empty: fn() -> Value,
) -> &'a mut Entry {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
    entries.entry(key.to_string()).or_insert_with(|| Entry {
        value: empty(),
        expires_at: None,
    })
}

fn apply(entries: &mut Entries, op: KvOp, now: Instant) -> KvResult<()> {
    match op {
        KvOp::ZAdd { key, member, score } => {
            let entry = live_or_insert(entries, &key, now, || Value::SortedSet(HashMap::new()));
            match &mut entry.value {
                Value::SortedSet(set) => {
                    set.insert(member, score);
                }
                Value::Hash(_) => return Err(KvError::WrongType(key)),
            }
        }
        KvOp::ZRem { key, members } => {
            let Some(entry) = live(entries, &key, now) else {
                return Ok(());
            };
            let now_empty = match &mut entry.value {
                Value::SortedSet(set) => {
                    for member in &members {
                        set.remove(member);
                    }
                    set.is_empty()
                }
                Value::Hash(_) => return Err(KvError::WrongType(key)),
            };
            if now_empty {
                entries.remove(&key);
            }
        }
        KvOp::ZRemUpTo { key, max } => {
            let Some(entry) = live(entries, &key, now) else {
                return Ok(());
            };
            let now_empty = match &mut entry.value {
                Value::SortedSet(set) => {
                    set.retain(|_, score| *score > max);
                    set.is_empty()
                }
                Value::Hash(_) => return Err(KvError::WrongType(key)),
            };
            if now_empty {
                entries.remove(&key);
            }
        }
        KvOp::HSet { key, fields } => {
            let entry = live_or_insert(entries, &key, now, || Value::Hash(HashMap::new()));
            match &mut entry.value {
                Value::Hash(hash) => hash.extend(fields),
                Value::SortedSet(_) => return Err(KvError::WrongType(key)),
            }
        }
        KvOp::Expire { key, ttl } => {
            if ttl.is_zero() {
                entries.remove(&key);
            } else if let Some(entry) = live(entries, &key, now) {
                entry.expires_at = Some(now + ttl);
            }
        }
        KvOp::Del { keys } => {
            for key in keys {
                entries.remove(&key);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn hgetall(&self, key: &str) -> KvResult<HashMap<String, String>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.clone()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(match live(&mut entries, key, now) {
            None => KeyTtl::Missing,
            Some(entry) => match entry.expires_at {
                None => KeyTtl::Persistent,
                Some(at) => KeyTtl::Remaining(at.duration_since(now)),
            },
        })
    }

    async fn zmembers(&self, key: &str) -> KvResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => {
                let mut members: Vec<(&String, &f64)> = set.iter().collect();
                members.sort_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)));
                Ok(members.into_iter().map(|(m, _)| m.clone()).collect())
            }
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    async fn zcard(&self, key: &str) -> KvResult<u64> {
        self.zcount_above(key, f64::NEG_INFINITY).await
    }

    async fn zcount_above(&self, key: &str, min: f64) -> KvResult<u64> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            None => Ok(0),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => Ok(set.values().filter(|score| **score > min).count() as u64),
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    async fn del(&self, keys: &[String]) -> KvResult<u64> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if entries.remove(key).is_some_and(|e| e.is_live(now)) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn atomic(&self, batch: KvBatch) -> KvResult<()> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let mut staged = entries.clone();
        for op in batch.into_ops() {
            apply(&mut staged, op, now)?;
        }
        *entries = staged;
        Ok(())
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}
