//! SQLite session store — durable sessions across restarts.
//!
//! Two tables:
//! - `sessions` — id, profile (JSON), created/last-active timestamps
//! - `messages` — append-only history rows ordered by a rowid sequence
//!
//! A user+assistant pair is appended inside one transaction, and a keyed
//! lock table serializes appends per session id so concurrent turns on the
//! same session cannot interleave. Timestamps are stored as fixed-width
//! RFC 3339 strings so string comparison matches time order.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use haksa_core::error::SessionError;
use haksa_core::message::{Message, Role, SessionId};
use haksa_core::profile::UserProfile;
use haksa_core::session::{Session, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// A durable SQLite session store.
pub struct SqliteSessionStore {
    pool: SqlitePool,
    ttl: Duration,
    /// One mutex per live session id, serializing the append path.
    locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful for
    /// tests). A single pooled connection is used — SQLite has one writer
    /// anyway, and it keeps `:memory:` databases coherent.
    pub async fn new(path: &str, ttl_hours: u32) -> Result<Self, SessionError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SessionError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| SessionError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            ttl: Duration::hours(i64::from(ttl_hours)),
            locks: std::sync::Mutex::new(HashMap::new()),
        };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id             TEXT PRIMARY KEY,
                profile        TEXT,
                created_at     TEXT NOT NULL,
                last_active_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Fixed-width RFC 3339 so lexicographic order equals time order.
    fn fmt_ts(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Clone the append lock for one session id, creating it on first use.
    fn append_lock(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.0.clone()).or_default().clone()
    }

    fn drop_lock(&self, id: &SessionId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&id.0);
    }

    /// Fetch the session row without touching it. `None` if absent.
    async fn fetch_row(
        &self,
        id: &SessionId,
    ) -> Result<Option<(Option<UserProfile>, DateTime<Utc>, DateTime<Utc>)>, SessionError> {
        let row = sqlx::query(
            "SELECT profile, created_at, last_active_at FROM sessions WHERE id = ?1",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("SELECT session: {e}")))?;

        let Some(row) = row else { return Ok(None) };

        let profile_json: Option<String> = row
            .try_get("profile")
            .map_err(|e| SessionError::Storage(format!("profile column: {e}")))?;
        let profile = profile_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok());

        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| SessionError::Storage(format!("created_at column: {e}")))?;
        let last_active_at: String = row
            .try_get("last_active_at")
            .map_err(|e| SessionError::Storage(format!("last_active_at column: {e}")))?;

        Ok(Some((
            profile,
            Self::parse_ts(&created_at),
            Self::parse_ts(&last_active_at),
        )))
    }

    async fn fetch_history(&self, id: &SessionId) -> Result<Vec<Message>, SessionError> {
        let rows = sqlx::query(
            "SELECT role, content, timestamp FROM messages WHERE session_id = ?1 ORDER BY seq",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("SELECT messages: {e}")))?;

        rows.iter()
            .map(|row| {
                let role: String = row
                    .try_get("role")
                    .map_err(|e| SessionError::Storage(format!("role column: {e}")))?;
                let content: String = row
                    .try_get("content")
                    .map_err(|e| SessionError::Storage(format!("content column: {e}")))?;
                let timestamp: String = row
                    .try_get("timestamp")
                    .map_err(|e| SessionError::Storage(format!("timestamp column: {e}")))?;

                Ok(Message {
                    role: if role == "assistant" {
                        Role::Assistant
                    } else {
                        Role::User
                    },
                    content,
                    timestamp: Self::parse_ts(&timestamp),
                })
            })
            .collect()
    }

    async fn delete_session(&self, id: &SessionId) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("DELETE session: {e}")))?;
        self.drop_lock(id);
        Ok(result.rows_affected() > 0)
    }

    fn role_str(message: &Message) -> &'static str {
        match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(
        &self,
        profile: Option<UserProfile>,
        history: Vec<Message>,
    ) -> Result<Session, SessionError> {
        let session = Session::new(profile, history);

        let profile_json = session
            .profile
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| SessionError::Storage(format!("Profile serialization: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SessionError::Unavailable(format!("BEGIN failed: {e}")))?;

        sqlx::query(
            "INSERT INTO sessions (id, profile, created_at, last_active_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&session.id.0)
        .bind(&profile_json)
        .bind(Self::fmt_ts(session.created_at))
        .bind(Self::fmt_ts(session.last_active_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| SessionError::Storage(format!("INSERT session: {e}")))?;

        for message in &session.history {
            sqlx::query(
                "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&session.id.0)
            .bind(Self::role_str(message))
            .bind(&message.content)
            .bind(Self::fmt_ts(message.timestamp))
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Storage(format!("INSERT seed message: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| SessionError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(session = %session.id, "Created session");
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let Some((profile, created_at, last_active_at)) = self.fetch_row(id).await? else {
            return Ok(None);
        };

        if Utc::now() - last_active_at > self.ttl {
            self.delete_session(id).await?;
            debug!(session = %id, "Evicted expired session");
            return Ok(None);
        }

        let now = Utc::now();
        sqlx::query("UPDATE sessions SET last_active_at = ?1 WHERE id = ?2")
            .bind(Self::fmt_ts(now))
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("Touch failed: {e}")))?;

        let history = self.fetch_history(id).await?;
        Ok(Some(Session {
            id: id.clone(),
            history,
            profile,
            created_at,
            last_active_at: now,
        }))
    }

    async fn append_turn(
        &self,
        id: &SessionId,
        user: Message,
        assistant: Message,
    ) -> Result<(), SessionError> {
        let lock = self.append_lock(id);
        let _guard = lock.lock().await;

        let Some((_, _, last_active_at)) = self.fetch_row(id).await? else {
            return Err(SessionError::NotFound(id.to_string()));
        };
        if Utc::now() - last_active_at > self.ttl {
            self.delete_session(id).await?;
            return Err(SessionError::NotFound(id.to_string()));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SessionError::Unavailable(format!("BEGIN failed: {e}")))?;

        for message in [&user, &assistant] {
            sqlx::query(
                "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&id.0)
            .bind(Self::role_str(message))
            .bind(&message.content)
            .bind(Self::fmt_ts(message.timestamp))
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Storage(format!("INSERT message: {e}")))?;
        }

        sqlx::query("UPDATE sessions SET last_active_at = ?1 WHERE id = ?2")
            .bind(Self::fmt_ts(Utc::now()))
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Storage(format!("Touch failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| SessionError::Storage(format!("COMMIT failed: {e}")))?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: &SessionId,
        profile: UserProfile,
    ) -> Result<(), SessionError> {
        let profile_json = serde_json::to_string(&profile)
            .map_err(|e| SessionError::Storage(format!("Profile serialization: {e}")))?;

        let result = sqlx::query(
            "UPDATE sessions SET profile = ?1, last_active_at = ?2 WHERE id = ?3",
        )
        .bind(&profile_json)
        .bind(Self::fmt_ts(Utc::now()))
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("UPDATE profile: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<usize, SessionError> {
        let cutoff = Self::fmt_ts(Utc::now() - self.ttl);

        let rows = sqlx::query("SELECT id FROM sessions WHERE last_active_at < ?1")
            .bind(&cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("Sweep select: {e}")))?;

        let expired: Vec<String> = rows
            .iter()
            .map(|row| {
                row.try_get("id")
                    .map_err(|e| SessionError::Storage(format!("id column: {e}")))
            })
            .collect::<Result<_, _>>()?;

        if expired.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM sessions WHERE last_active_at < ?1")
            .bind(&cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("Sweep failed: {e}")))?;

        let removed = result.rows_affected() as usize;
        {
            // Only swept ids lose their append lock; live sessions keep theirs.
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            for id in &expired {
                locks.remove(id);
            }
        }
        debug!(removed, "Session sweep complete");
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, SessionError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("COUNT failed: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| SessionError::Storage(format!("n column: {e}")))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteSessionStore {
        SqliteSessionStore::new(":memory:", 24).await.unwrap()
    }

    #[tokio::test]
    async fn create_get_roundtrip() {
        let store = store().await;
        let profile = UserProfile {
            admission_year: 2020,
            current_semester: Some(3),
            track: "일반".into(),
            courses_taken: vec![],
        };
        let created = store
            .create(Some(profile), vec![Message::user("안녕")])
            .await
            .unwrap();

        let fetched = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.history.len(), 1);
        assert_eq!(fetched.history[0].content, "안녕");
        assert_eq!(fetched.profile.unwrap().admission_year, 2020);
    }

    #[tokio::test]
    async fn append_turn_is_ordered() {
        let store = store().await;
        let session = store.create(None, vec![]).await.unwrap();

        for i in 0..3 {
            store
                .append_turn(
                    &session.id,
                    Message::user(format!("질문 {i}")),
                    Message::assistant(format!("답변 {i}")),
                )
                .await
                .unwrap();
        }

        let history = store.get(&session.id).await.unwrap().unwrap().history;
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].content, "질문 0");
        assert_eq!(history[5].content, "답변 2");
        assert_eq!(history[5].role, Role::Assistant);
    }

    #[tokio::test]
    async fn append_to_unknown_session_fails() {
        let store = store().await;
        let result = store
            .append_turn(
                &SessionId::from("missing"),
                Message::user("?"),
                Message::assistant("!"),
            )
            .await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_profile_roundtrip() {
        let store = store().await;
        let session = store.create(None, vec![]).await.unwrap();

        let profile = UserProfile {
            admission_year: 2022,
            current_semester: None,
            track: "AI트랙".into(),
            courses_taken: vec![],
        };
        store.update_profile(&session.id, profile).await.unwrap();

        let fetched = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.profile.unwrap().track, "AI트랙");
    }

    #[tokio::test]
    async fn expired_sessions_are_swept() {
        let store = SqliteSessionStore::new(":memory:", 0).await.unwrap();
        store.create(None, vec![]).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let removed = store.sweep_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_keeps_locks_for_live_sessions() {
        let store = SqliteSessionStore::new(":memory:", 0).await.unwrap();
        let stale = store.create(None, vec![]).await.unwrap();
        let live = store.create(None, vec![]).await.unwrap();

        // Keep one session ahead of the cutoff.
        sqlx::query("UPDATE sessions SET last_active_at = ?1 WHERE id = ?2")
            .bind(SqliteSessionStore::fmt_ts(Utc::now() + Duration::hours(1)))
            .bind(&live.id.0)
            .execute(&store.pool)
            .await
            .unwrap();

        let live_lock = store.append_lock(&live.id);
        store.append_lock(&stale.id);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let removed = store.sweep_expired().await.unwrap();
        assert_eq!(removed, 1);

        let locks = store.locks.lock().unwrap();
        assert!(!locks.contains_key(&stale.id.0));
        // The live session's appenders still share the original mutex.
        assert!(Arc::ptr_eq(locks.get(&live.id.0).unwrap(), &live_lock));
    }
}
