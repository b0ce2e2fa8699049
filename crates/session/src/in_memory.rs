//! In-memory session store — the default backend, also used in tests.
//!
//! Each session lives behind its own `tokio::sync::Mutex`, so appends to one
//! session serialize while unrelated sessions proceed independently. The
//! outer map lock is only held long enough to clone the per-session handle.
//!
//! Expiry is enforced lazily on access (an expired session behaves as
//! absent) and eagerly by `sweep_expired`, which the gateway runs on an
//! interval.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use haksa_core::error::SessionError;
use haksa_core::message::{Message, SessionId};
use haksa_core::profile::UserProfile;
use haksa_core::session::{Session, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// An in-memory session store with per-session locking and TTL eviction.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    /// Create a store whose sessions expire after `ttl_hours` of inactivity.
    pub fn new(ttl_hours: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::hours(i64::from(ttl_hours)),
        }
    }

    /// Clone the handle for one session, if present.
    async fn handle(&self, id: &SessionId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id.0).cloned()
    }

    /// Remove a session from the map (used when an access finds it expired).
    async fn evict(&self, id: &SessionId) {
        self.sessions.write().await.remove(&id.0);
        debug!(session = %id, "Evicted expired session");
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(
        &self,
        profile: Option<UserProfile>,
        history: Vec<Message>,
    ) -> Result<Session, SessionError> {
        let session = Session::new(profile, history);
        let id = session.id.clone();
        self.sessions
            .write()
            .await
            .insert(id.0.clone(), Arc::new(Mutex::new(session.clone())));
        debug!(session = %id, "Created session");
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let Some(handle) = self.handle(id).await else {
            return Ok(None);
        };

        let mut session = handle.lock().await;
        if session.is_expired(self.ttl) {
            drop(session);
            self.evict(id).await;
            return Ok(None);
        }

        session.last_active_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn append_turn(
        &self,
        id: &SessionId,
        user: Message,
        assistant: Message,
    ) -> Result<(), SessionError> {
        let Some(handle) = self.handle(id).await else {
            return Err(SessionError::NotFound(id.to_string()));
        };

        // The per-session mutex serializes concurrent appends; the pair goes
        // in together or not at all.
        let mut session = handle.lock().await;
        if session.is_expired(self.ttl) {
            drop(session);
            self.evict(id).await;
            return Err(SessionError::NotFound(id.to_string()));
        }

        session.history.push(user);
        session.history.push(assistant);
        session.last_active_at = Utc::now();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: &SessionId,
        profile: UserProfile,
    ) -> Result<(), SessionError> {
        let Some(handle) = self.handle(id).await else {
            return Err(SessionError::NotFound(id.to_string()));
        };

        let mut session = handle.lock().await;
        session.profile = Some(profile);
        session.last_active_at = Utc::now();
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<usize, SessionError> {
        let handles: Vec<(String, Arc<Mutex<Session>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut expired = Vec::new();
        for (key, handle) in handles {
            if handle.lock().await.is_expired(self.ttl) {
                expired.push(key);
            }
        }

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for key in expired {
            if sessions.remove(&key).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Session sweep complete");
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().await.len())
    }
}
