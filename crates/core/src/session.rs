//! Refresh sessions and the per-user session bound.

use chrono::Duration;
use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// Default lifetime of a refresh session.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

/// Default maximum number of live sessions per user.
pub const DEFAULT_MAX_SESSIONS_PER_USER: usize = 5;

/// A server-side refresh session.
///
/// `id` is the refresh token itself and doubles as the lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: DbId,
    pub expires_at: Timestamp,
}

impl Session {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// The credential pair handed back on sign-in and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Lifetime and cardinality limits applied to refresh sessions.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// How long a freshly created session stays valid.
    pub ttl: Duration,
    /// Soft upper bound on live sessions per user, enforced at sign-in.
    pub max_per_user: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            max_per_user: DEFAULT_MAX_SESSIONS_PER_USER,
        }
    }
}

/// Sort sessions by `expires_at` ascending. Ties keep their retrieval order.
pub fn sort_by_expiry(sessions: &mut [Session]) {
    sessions.sort_by_key(|s| s.expires_at);
}

/// Pick the sessions a sign-in must delete before adding a new one.
///
/// Walks the sessions from the earliest expiry and evicts until fewer than
/// `max` remain. Sessions already expired at `now` are always evicted, even
/// once the count is under the bound.
pub fn plan_eviction(mut sessions: Vec<Session>, max: usize, now: Timestamp) -> Vec<Session> {
    sort_by_expiry(&mut sessions);

    let mut remaining = sessions.len();
    let mut evicted = Vec::new();
    for session in sessions {
        if remaining < max && !session.is_expired_at(now) {
            break;
        }
        evicted.push(session);
        remaining -= 1;
    }
    evicted
}
