//! Session storage for admin bearer tokens.
//!
//! The store is an injected abstraction so the in-memory implementation can be
//! swapped for a persistent or distributed one without touching the login flow
//! or the middleware.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Where a session sits in the two-factor login flow. Only `Authenticated`
/// sessions pass the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStage {
    /// Password accepted, TOTP not yet enrolled; holds the provisional secret
    /// until the first code is verified.
    PendingSetup { temp_secret: String },
    /// Password accepted, waiting for a TOTP code against the stored secret.
    PendingVerify,
    Authenticated,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub stage: SessionStage,
    pub expires_at: DateTime<Utc>,
}

/// Setup sessions get long enough to scan a QR code and enter a code.
const SETUP_TTL_MINUTES: i64 = 15;
/// Verify sessions only need time to type a code.
const VERIFY_TTL_MINUTES: i64 = 5;
const AUTHENTICATED_TTL_MINUTES: i64 = 60;

impl Session {
    pub fn pending_setup(username: impl Into<String>, temp_secret: String) -> Self {
        Self {
            username: username.into(),
            stage: SessionStage::PendingSetup { temp_secret },
            expires_at: Utc::now() + Duration::minutes(SETUP_TTL_MINUTES),
        }
    }

    pub fn pending_verify(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            stage: SessionStage::PendingVerify,
            expires_at: Utc::now() + Duration::minutes(VERIFY_TTL_MINUTES),
        }
    }

    pub fn authenticated(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            stage: SessionStage::Authenticated,
            expires_at: Utc::now() + Duration::minutes(AUTHENTICATED_TTL_MINUTES),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Pluggable session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> Option<Session>;
    async fn insert(&self, token: String, session: Session);
    async fn remove(&self, token: &str);
    /// Drop every expired session. Called periodically from a background task.
    async fn purge_expired(&self);
}

/// In-process session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|entry| entry.clone())
    }

    async fn insert(&self, token: String, session: Session) {
        self.sessions.insert(token, session);
    }

    async fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }

    async fn purge_expired(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, session| session.expires_at >= now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemorySessionStore::default();
        store
            .insert("tok".into(), Session::authenticated("admin"))
            .await;

        let session = store.get("tok").await.expect("session should exist");
        assert_eq!(session.username, "admin");
        assert_eq!(session.stage, SessionStage::Authenticated);
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemorySessionStore::default();
        store
            .insert("tok".into(), Session::authenticated("admin"))
            .await;
        store.remove("tok").await;
        assert!(store.get("tok").await.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_sessions() {
        let store = MemorySessionStore::default();

        let mut expired = Session::authenticated("old");
        expired.expires_at = Utc::now() - Duration::minutes(1);
        store.insert("old".into(), expired).await;
        store
            .insert("live".into(), Session::authenticated("admin"))
            .await;

        store.purge_expired().await;

        assert!(store.get("old").await.is_none());
        assert!(store.get("live").await.is_some());
    }

    #[test]
    fn test_pending_setup_holds_secret() {
        let session = Session::pending_setup("admin", "JBSWY3DPEHPK3PXP".into());
        match session.stage {
            SessionStage::PendingSetup { temp_secret } => {
                assert_eq!(temp_secret, "JBSWY3DPEHPK3PXP");
            }
            other => panic!("unexpected stage: {other:?}"),
        }
    }
}
