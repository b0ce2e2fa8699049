//! Session domain type and the SessionStore trait.
//!
//! A session is the server-tracked side of a conversation: an opaque id,
//! the accumulated history, and an optional academic profile. The server's
//! record of history is authoritative once a session exists; client-sent
//! history only seeds a brand-new session.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::message::{Message, SessionId};
use crate::profile::UserProfile;

/// A server-tracked conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session token
    pub id: SessionId,

    /// Ordered, append-only conversation history
    pub history: Vec<Message>,

    /// Academic profile, if one has been supplied for this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// When this session was last read or written
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session, optionally seeded with a profile and a
    /// client-supplied history (bootstrap case).
    pub fn new(profile: Option<UserProfile>, history: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            history,
            profile,
            created_at: now,
            last_active_at: now,
        }
    }

    /// True if the session has been idle longer than `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() - self.last_active_at > ttl
    }
}

/// The core SessionStore trait.
///
/// Implementations: in-memory (default), SQLite. All operations touch
/// `last_active_at`; expired sessions behave as absent (fail-open — the
/// orchestrator mints a new session rather than erroring).
///
/// Concurrency contract: `append_turn` calls for the same session id must
/// serialize (at-most-one concurrent mutation per session); different
/// sessions proceed independently.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Create a new session, optionally seeded with a profile and history.
    async fn create(
        &self,
        profile: Option<UserProfile>,
        history: Vec<Message>,
    ) -> std::result::Result<Session, SessionError>;

    /// Look up a session by id, touching its activity timestamp.
    /// Returns `None` for unknown or expired ids.
    async fn get(&self, id: &SessionId) -> std::result::Result<Option<Session>, SessionError>;

    /// Atomically append one user+assistant turn to a session's history.
    /// Fails with `SessionError::NotFound` if the session is gone.
    async fn append_turn(
        &self,
        id: &SessionId,
        user: Message,
        assistant: Message,
    ) -> std::result::Result<(), SessionError>;

    /// Replace the session's stored profile.
    async fn update_profile(
        &self,
        id: &SessionId,
        profile: UserProfile,
    ) -> std::result::Result<(), SessionError>;

    /// Evict every session idle past the store's TTL. Returns how many
    /// sessions were removed.
    async fn sweep_expired(&self) -> std::result::Result<usize, SessionError>;

    /// Number of live sessions.
    async fn count(&self) -> std::result::Result<usize, SessionError>;
}
