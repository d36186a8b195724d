//! Registration session storage with TTL expiration.

use crate::error::SessionError;
use crate::types::RegistrationSession;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Storage for registration sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session behind `key`, or a new unsaved one.
    ///
    /// The returned session has `is_new` set when `key` is absent, unknown,
    /// expired, or belongs to a different kind/name.
    async fn get(
        &self,
        key: Option<&str>,
        kind: &str,
        name: &str,
    ) -> Result<RegistrationSession, SessionError>;

    /// Persist the session values. The session is no longer new afterwards.
    async fn save(&self, session: &mut RegistrationSession) -> Result<(), SessionError>;
}

/// A stored session, kept serialized like a cookie-store backend would.
struct SessionEntry {
    data: String,
    expires_at: DateTime<Utc>,
}

/// In-memory session store.
///
/// A session expires a fixed TTL after its creation, no matter how often it
/// is saved. Expired sessions are dropped by a background task.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: ChronoDuration,
}

impl MemorySessionStore {
    /// Create a new in-memory session store.
    ///
    /// Spawns a background task to periodically clean up expired sessions.
    pub fn new(ttl: Duration) -> Self {
        let store = Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::minutes(10)),
        };

        let cleanup_store = store.clone();
        tokio::spawn(async move {
            cleanup_store.cleanup_loop().await;
        });

        info!("In-memory session store initialized (ttl={:?})", ttl);

        store
    }

    async fn cleanup_loop(&self) {
        let cleanup_interval = Duration::from_secs(60);

        loop {
            tokio::time::sleep(cleanup_interval).await;

            let now = Utc::now();
            let mut sessions = self.sessions.write().await;
            let before_count = sessions.len();

            sessions.retain(|_, entry| entry.expires_at > now);

            let removed = before_count - sessions.len();
            if removed > 0 {
                debug!("Cleaned up {} expired registration sessions", removed);
            }
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        let now = Utc::now();
        sessions.values().filter(|e| e.expires_at > now).count()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    #[instrument(skip(self, key))]
    async fn get(
        &self,
        key: Option<&str>,
        kind: &str,
        name: &str,
    ) -> Result<RegistrationSession, SessionError> {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            let sessions = self.sessions.read().await;
            let now = Utc::now();
            if let Some(entry) = sessions.get(key).filter(|e| e.expires_at > now) {
                let session: RegistrationSession = serde_json::from_str(&entry.data)?;
                if session.kind == kind && session.name == name {
                    return Ok(session);
                }
            }
            debug!("Registration session missing or expired");
        }
        Ok(RegistrationSession::new(kind, name))
    }

    #[instrument(skip(self, session))]
    async fn save(&self, session: &mut RegistrationSession) -> Result<(), SessionError> {
        let data = serde_json::to_string(session)?;
        let expires_at = session.created_at + self.ttl;
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.key.clone(), SessionEntry { data, expires_at });
        session.is_new = false;
        Ok(())
    }
}
