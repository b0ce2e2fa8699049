//! The chat orchestrator — one entry point per chat turn.
//!
//! Sequence for a turn: resolve the session (fail-open on unknown or expired
//! ids), pick the effective profile, window the history, classify the
//! question, dispatch retrieval, compose the answer, and atomically append
//! the finished turn. Only a session-store fault aborts a turn; everything
//! downstream degrades into a valid reply.

use std::sync::Arc;

use haksa_core::error::{Error, SessionError};
use haksa_core::message::{Message, SessionId};
use haksa_core::profile::UserProfile;
use haksa_core::retrieval::{QueryType, SearchSource};
use haksa_core::session::{Session, SessionStore};
use haksa_retrieval::classifier::QueryClassifier;
use haksa_retrieval::engine::RetrievalEngine;
use tracing::{debug, info, warn};

use crate::composer::ResponseComposer;
use crate::history::HistoryAssembler;

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Session token from a previous response, if the client has one
    pub session_id: Option<String>,

    /// The user's message
    pub message: String,

    /// Client-side history, adopted only when it seeds a brand-new session
    pub history: Vec<Message>,

    /// Academic profile sent with this request
    pub profile: Option<UserProfile>,
}

/// The result of a completed chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Session token the client should send next time
    pub session_id: SessionId,

    /// The assistant's reply, never empty
    pub message: String,

    /// How the turn was routed
    pub query_type: QueryType,

    /// Knowledge sources backing the reply
    pub sources: Vec<SearchSource>,

    /// True when retrieval or generation ran in reduced-functionality mode
    pub degraded: bool,
}

/// Orchestrates the full chat pipeline.
pub struct ChatOrchestrator {
    store: Arc<dyn SessionStore>,
    classifier: QueryClassifier,
    retrieval: RetrievalEngine,
    composer: ResponseComposer,
    history: HistoryAssembler,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        retrieval: RetrievalEngine,
        composer: ResponseComposer,
        history: HistoryAssembler,
    ) -> Self {
        Self {
            store,
            classifier: QueryClassifier::new(),
            retrieval,
            composer,
            history,
        }
    }

    /// Run one chat turn end to end.
    pub async fn chat(&self, input: ChatInput) -> Result<ChatOutcome, Error> {
        let session = self.resolve_session(&input).await?;

        // The freshest profile wins: a profile on the request updates the
        // stored one and is used for this turn.
        let profile = match (&input.profile, &session.profile) {
            (Some(fresh), stored) => {
                if stored.as_ref() != Some(fresh) {
                    self.store.update_profile(&session.id, fresh.clone()).await?;
                }
                Some(fresh.clone())
            }
            (None, stored) => stored.clone(),
        };

        let history = self.history.window(&session.history);
        let query_type = self.classifier.classify(&input.message);
        let wants_profile = self.classifier.needs_profile(&input.message);

        debug!(
            session = %session.id,
            %query_type,
            wants_profile,
            history_len = history.len(),
            "Turn classified"
        );

        let retrieval = self
            .retrieval
            .search(&input.message, query_type, profile.as_ref())
            .await;
        let sources = retrieval.sources().to_vec();

        let composed = self
            .composer
            .compose(&input.message, history, &retrieval, profile.as_ref(), wants_profile)
            .await;

        // A profile request is not an answer; sources would only mislead.
        let sources = if composed.profile_requested {
            Vec::new()
        } else {
            sources
        };

        let session_id = self
            .persist_turn(
                session,
                Message::user(&input.message),
                Message::assistant(&composed.message),
                profile,
            )
            .await?;

        info!(
            session = %session_id,
            %query_type,
            sources = sources.len(),
            degraded = retrieval.is_degraded() || composed.generation_failed,
            "Turn complete"
        );

        Ok(ChatOutcome {
            session_id,
            message: composed.message,
            query_type,
            sources,
            degraded: retrieval.is_degraded() || composed.generation_failed,
        })
    }

    /// Resolve the session for a turn. Unknown and expired ids are treated
    /// identically: mint a fresh session rather than erroring, seeding it
    /// with whatever history the client carried.
    async fn resolve_session(&self, input: &ChatInput) -> Result<Session, Error> {
        if let Some(id) = &input.session_id {
            let session_id = SessionId::from(id);
            if let Some(session) = self.store.get(&session_id).await? {
                return Ok(session);
            }
            debug!(session = %session_id, "Unknown or expired session id, minting a new one");
        }
        let session = self
            .store
            .create(input.profile.clone(), input.history.clone())
            .await?;
        Ok(session)
    }

    /// Append the finished turn. A session that expired mid-turn is recreated
    /// with the turn as its history, so the reply is never lost.
    async fn persist_turn(
        &self,
        session: Session,
        user: Message,
        assistant: Message,
        profile: Option<UserProfile>,
    ) -> Result<SessionId, Error> {
        match self
            .store
            .append_turn(&session.id, user.clone(), assistant.clone())
            .await
        {
            Ok(()) => Ok(session.id),
            Err(SessionError::NotFound(_)) => {
                warn!(session = %session.id, "Session expired mid-turn, recreating");
                let mut history = session.history;
                history.push(user);
                history.push(assistant);
                let fresh = self.store.create(profile, history).await?;
                Ok(fresh.id)
            }
            Err(e) => Err(e.into()),
        }
    }
}
