//! Session store — explicit lifecycle for authenticated users.
//!
//! A session is opened on successful login and closed on logout. Nothing
//! else creates or destroys sessions; expired sessions are dropped when
//! they are next looked up.

use crate::models::UserRecord;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::try_hours(ttl_hours.max(1)).unwrap_or_else(|| Duration::hours(24)),
        }
    }

    /// Start a session for `user` under `token`.
    pub fn open(&self, token: String, user: UserRecord, now: DateTime<Utc>) -> Session {
        let session = Session {
            token: token.clone(),
            user,
            created_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        debug!(user = %session.user.id, expires_at = %session.expires_at, "Session opened");
        self.sessions.insert(token, session.clone());
        session
    }

    /// Live session for `token`, if any.
    pub fn lookup(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        let session = self.sessions.get(token).map(|r| r.value().clone())?;
        if session.is_expired(now) {
            self.sessions.remove(token);
            debug!(user = %session.user.id, "Session expired");
            return None;
        }
        Some(session)
    }

    /// End the session for `token`.
    pub fn close(&self, token: &str) -> Option<Session> {
        self.sessions.remove(token).map(|(_, s)| s)
    }

    /// Drop every session expired at `now`. Returns how many were removed.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, "Expired sessions pruned");
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        UserRecord {
            id: "user_123".to_string(),
            name: "Demo User".to_string(),
            email: "demo@example.com".to_string(),
            picture: "https://i.pravatar.cc/150?u=demo@example.com".to_string(),
            channel_id: Some("UCMockChannelId".to_string()),
        }
    }

    #[test]
    fn test_open_lookup_close() {
        let store = SessionStore::new(24);
        let now = Utc::now();
        store.open("tok".to_string(), user(), now);
        assert_eq!(store.lookup("tok", now).unwrap().user, user());
        assert!(store.close("tok").is_some());
        assert!(store.lookup("tok", now).is_none());
        assert!(store.close("tok").is_none());
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let store = SessionStore::new(1);
        let now = Utc::now();
        store.open("tok".to_string(), user(), now);
        assert!(store.lookup("tok", now + Duration::minutes(59)).is_some());
        assert!(store.lookup("tok", now + Duration::hours(1)).is_none());
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_prune_expired_without_lookup() {
        let store = SessionStore::new(1);
        let now = Utc::now();
        store.open("old".to_string(), user(), now);
        store.open("new".to_string(), user(), now + Duration::minutes(30));

        assert_eq!(store.prune_expired(now + Duration::minutes(61)), 1);
        assert_eq!(store.active_count(), 1);
        assert!(store.lookup("new", now + Duration::minutes(61)).is_some());
        assert_eq!(store.prune_expired(now + Duration::minutes(61)), 0);
    }

    #[test]
    fn test_unknown_token() {
        let store = SessionStore::new(24);
        assert!(store.lookup("nope", Utc::now()).is_none());
    }
}
