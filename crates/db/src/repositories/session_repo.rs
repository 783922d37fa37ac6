//! Refresh-session store on top of a [`KvStore`].
//!
//! Each session lives under two keys that are always written and removed in
//! the same atomic batch:
//!
//! - `session:{token}` -- hash record `{userId}` expiring at the session's
//!   `expires_at`;
//! - `sessions:user:{id}` -- sorted index of the user's tokens, scored by
//!   expiry so live sessions can be counted without touching each record.
//!
//! Stale records and index entries are removed lazily as they are read, and
//! lapsed index entries are trimmed whenever a session is created.
//!
//! Index scores come from `Utc::now()`. Record TTLs are enforced by the
//! backend's own clock (the tokio clock for `MemoryKv`), so a paused tokio
//! clock lapses records without lapsing index scores.

use std::sync::Arc;

use chrono::Utc;
use listkeep_core::error::CoreError;
use listkeep_core::session::Session;
use listkeep_core::types::{DbId, Timestamp};

use crate::kv::{KeyTtl, KvBatch, KvError, KvStore};

/// Hash field holding the owning user's id.
const USER_ID_FIELD: &str = "userId";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session is missing, malformed, or its TTL has elapsed.
    #[error("Session expired or invalid")]
    ExpiredOrInvalid,

    #[error(transparent)]
    Kv(#[from] KvError),
}

impl From<SessionError> for CoreError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ExpiredOrInvalid => CoreError::SessionExpiredOrInvalid,
            SessionError::Kv(e) => {
                tracing::error!(error = %e, "Session store failure");
                CoreError::Internal(format!("session store: {e}"))
            }
        }
    }
}

fn record_key(token: &str) -> String {
    format!("session:{token}")
}

fn index_key(user_id: DbId) -> String {
    format!("sessions:user:{user_id}")
}

/// Index score for a session: its expiry in fractional Unix seconds.
fn expiry_score(at: Timestamp) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// Manages per-user refresh sessions.
#[derive(Clone)]
pub struct SessionRepo {
    kv: Arc<dyn KvStore>,
}

impl SessionRepo {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// The backing store, for health checks.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Index the session under its user and write its expiring record, as
    /// one atomic unit. Index members that lapsed are dropped in the same
    /// unit, so the index stays bounded by the user's live sessions plus
    /// those that lapsed since the last write.
    pub async fn create_session(&self, session: &Session) -> Result<(), SessionError> {
        let ttl = (session.expires_at - Utc::now())
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .ok_or(SessionError::ExpiredOrInvalid)?;

        let record = record_key(&session.id);
        let index = index_key(session.user_id);
        let batch = KvBatch::new()
            .zrem_up_to(index.as_str(), expiry_score(Utc::now()))
            .zadd(
                index,
                session.id.as_str(),
                expiry_score(session.expires_at),
            )
            .hset(
                record.as_str(),
                [(USER_ID_FIELD, session.user_id.to_string())],
            )
            .expire(record, ttl);

        self.kv.atomic(batch).await?;
        Ok(())
    }

    /// Resolve a refresh token to its session.
    ///
    /// A missing, malformed or lapsed record yields
    /// [`SessionError::ExpiredOrInvalid`] and is deleted on the way out.
    pub async fn get_session(&self, token: &str) -> Result<Session, SessionError> {
        let key = record_key(token);
        let fields = self.kv.hgetall(&key).await?;
        let ttl = self.kv.ttl(&key).await?;

        let user_id = fields
            .get(USER_ID_FIELD)
            .and_then(|v| v.parse::<DbId>().ok());

        let resolved = match (user_id, ttl) {
            (Some(user_id), KeyTtl::Remaining(remaining)) if !remaining.is_zero() => {
                chrono::Duration::from_std(remaining)
                    .ok()
                    .and_then(|remaining| Utc::now().checked_add_signed(remaining))
                    .map(|expires_at| Session {
                        id: token.to_string(),
                        user_id,
                        expires_at,
                    })
            }
            _ => None,
        };

        match resolved {
            Some(session) => Ok(session),
            None => {
                self.discard_record(key, ttl).await;
                Err(SessionError::ExpiredOrInvalid)
            }
        }
    }

    /// Remove one session's record and index entry together.
    pub async fn delete_user_session(&self, user_id: DbId, token: &str) -> Result<(), SessionError> {
        let batch = KvBatch::new()
            .del([record_key(token)])
            .zrem(index_key(user_id), [token]);
        self.kv.atomic(batch).await?;
        Ok(())
    }

    /// Remove every live session of a user in a single transaction.
    ///
    /// Returns how many sessions were removed.
    pub async fn delete_all_user_sessions(&self, user_id: DbId) -> Result<usize, SessionError> {
        let sessions = self.get_all_sessions(user_id).await?;
        if sessions.is_empty() {
            return Ok(0);
        }

        let batch = KvBatch::new()
            .del(sessions.iter().map(|s| record_key(&s.id)))
            .zrem(index_key(user_id), sessions.iter().map(|s| s.id.as_str()));
        self.kv.atomic(batch).await?;
        Ok(sessions.len())
    }

    /// All still-valid sessions of a user, in index order.
    ///
    /// Index entries that no longer resolve (or resolve to another user) are
    /// pruned from the index as a side effect.
    pub async fn get_all_sessions(&self, user_id: DbId) -> Result<Vec<Session>, SessionError> {
        let members = self.kv.zmembers(&index_key(user_id)).await?;

        let mut sessions = Vec::with_capacity(members.len());
        let mut stale = Vec::new();
        for token in members {
            match self.get_session(&token).await {
                Ok(session) if session.user_id == user_id => sessions.push(session),
                Ok(_) | Err(SessionError::ExpiredOrInvalid) => stale.push(token),
                Err(e) => return Err(e),
            }
        }

        if !stale.is_empty() {
            tracing::debug!(user_id, pruned = stale.len(), "Pruning stale session index entries");
            self.kv
                .atomic(KvBatch::new().zrem(index_key(user_id), stale))
                .await?;
        }

        Ok(sessions)
    }

    /// Number of live sessions indexed for a user.
    pub async fn get_cnt_sessions(&self, user_id: DbId) -> Result<u64, SessionError> {
        let count = self
            .kv
            .zcount_above(&index_key(user_id), expiry_score(Utc::now()))
            .await?;
        Ok(count)
    }

    /// Best-effort removal of a record that failed to resolve.
    async fn discard_record(&self, key: String, ttl: KeyTtl) {
        if ttl == KeyTtl::Missing {
            return;
        }
        if let Err(e) = self.kv.del(&[key]).await {
            tracing::warn!(error = %e, "Failed to delete stale session record");
        }
    }
}
