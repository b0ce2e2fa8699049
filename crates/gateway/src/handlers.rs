//! REST handlers for the chat service.
//!
//! Endpoints:
//!
//! - `GET  /`                       — Service banner
//! - `GET  /health`                 — Liveness plus backend info
//! - `POST /chat`                   — Run one chat turn
//! - `POST /session`                — Create a session up front
//! - `GET  /session/{id}`           — Inspect a session
//! - `PUT  /session/{id}/profile`   — Replace a session's academic profile
//! - `DELETE /sessions/cleanup`     — Evict expired sessions now

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use haksa_core::error::{Error, SessionError};
use haksa_core::message::{Message, Role, SessionId};
use haksa_core::profile::UserProfile;
use haksa_core::retrieval::{QueryType, SearchSource};
use haksa_engine::ChatInput;

use crate::SharedState;

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Session token from a previous response
    #[serde(default)]
    pub session_id: Option<String>,

    /// Client-side history, used only to seed a brand-new session
    #[serde(default)]
    pub history: Vec<WireMessage>,

    /// Academic profile for personalization
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub message: String,
    pub query_type: QueryType,
    pub sources: Vec<SearchSource>,
    pub degraded: bool,
}

/// A history message as the client sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    fn into_message(self) -> Option<Message> {
        let role = match self.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => return None,
        };
        Some(Message {
            role,
            content: self.content,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageDto {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role: role.into(),
            content: message.content.clone(),
            timestamp: message.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    #[serde(default)]
    pub history: Vec<WireMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDetailResponse {
    pub session_id: String,
    pub history: Vec<MessageDto>,
    pub profile: Option<UserProfile>,
    pub created_at: String,
    pub last_active_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("No session with id '{id}'"),
        }),
    )
}

/// Session-store faults surface as 503; anything else is a 500.
fn internal(err: Error) -> ApiError {
    error!(error = %err, "Request failed");
    let status = match &err {
        Error::Session(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn store_error(err: SessionError) -> ApiError {
    internal(Error::Session(err))
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RootResponse {
    service: &'static str,
    version: &'static str,
}

pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        service: "haksa",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub session_backend: String,
    pub sessions: usize,
    pub uptime_secs: i64,
}

pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let (status, sessions) = match state.store.count().await {
        Ok(count) => ("ok", count),
        Err(_) => ("degraded", 0),
    };
    Json(HealthResponse {
        status: status.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        session_backend: state.store.name().into(),
        sessions,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let history: Vec<Message> = payload
        .history
        .into_iter()
        .filter_map(WireMessage::into_message)
        .collect();

    let input = ChatInput {
        session_id: payload.session_id,
        message: payload.message,
        history,
        profile: payload.user_profile,
    };

    let outcome = state.orchestrator.chat(input).await.map_err(internal)?;

    Ok(Json(ChatResponse {
        session_id: outcome.session_id.to_string(),
        message: outcome.message,
        query_type: outcome.query_type,
        sources: outcome.sources,
        degraded: outcome.degraded,
    }))
}

pub async fn create_session_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let history: Vec<Message> = payload
        .history
        .into_iter()
        .filter_map(WireMessage::into_message)
        .collect();

    let session = state
        .store
        .create(payload.user_profile, history)
        .await
        .map_err(store_error)?;

    info!(session = %session.id, "Session created via API");
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id.to_string(),
            created_at: session.created_at.to_rfc3339(),
        }),
    ))
}

pub async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let session = state
        .store
        .get(&SessionId::from(&id))
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found(&id))?;

    Ok(Json(SessionDetailResponse {
        session_id: session.id.to_string(),
        history: session.history.iter().map(MessageDto::from).collect(),
        profile: session.profile,
        created_at: session.created_at.to_rfc3339(),
        last_active_at: session.last_active_at.to_rfc3339(),
    }))
}

pub async fn update_profile_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(profile): Json<UserProfile>,
) -> Result<StatusCode, ApiError> {
    match state
        .store
        .update_profile(&SessionId::from(&id), profile)
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(SessionError::NotFound(_)) => Err(not_found(&id)),
        Err(e) => Err(store_error(e)),
    }
}

pub async fn cleanup_handler(
    State(state): State<SharedState>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let removed = state.store.sweep_expired().await.map_err(store_error)?;
    info!(removed, "Manual session cleanup");
    Ok(Json(CleanupResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppState, build_router};
    use axum::body::Body;
    use axum::http::Request;
    use haksa_core::profile::CourseInput;
    use haksa_engine::{ChatOrchestrator, HistoryAssembler, ResponseComposer};
    use haksa_generate::TemplateGenerator;
    use haksa_retrieval::engine::RetrievalEngine;
    use haksa_retrieval::in_memory::{InMemoryIndex, Snippet};
    use haksa_session::in_memory::InMemorySessionStore;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn snippet(content: &str, code: &str, name: &str) -> Snippet {
        let mut metadata = serde_json::Map::new();
        metadata.insert("course_code".into(), serde_json::json!(code));
        metadata.insert("course_name".into(), serde_json::json!(name));
        Snippet {
            content: content.into(),
            metadata,
        }
    }

    fn test_state() -> SharedState {
        let store = Arc::new(InMemorySessionStore::new(24));
        let index = InMemoryIndex::new();
        index.insert(snippet(
            "자료구조(CSE201)는 전공필수 과목으로, 프로그래밍 기초 이수 후 다음에 수강을 권장합니다.",
            "CSE201",
            "자료구조",
        ));
        index.insert(snippet(
            "프로그래밍기초(CSE101)는 1학년 1학기 전공필수 과목입니다.",
            "CSE101",
            "프로그래밍기초",
        ));
        let retrieval = RetrievalEngine::new(Arc::new(index), 3, 2);
        let composer = ResponseComposer::new(Arc::new(TemplateGenerator::new()), 0.3, Some(500));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            store.clone(),
            retrieval,
            composer,
            HistoryAssembler::new(10),
        ));
        Arc::new(AppState {
            orchestrator,
            store,
            started_at: Utc::now(),
        })
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_backend_and_count() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = json_body(response).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.session_backend, "in_memory");
        assert_eq!(health.sessions, 0);
        assert!(health.uptime_secs >= 0);
    }

    #[tokio::test]
    async fn root_banner() {
        let app = build_router(test_state());
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let app = build_router(test_state());
        let req = post_json("/chat", serde_json::json!({"message": "   "}));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn general_chat_turn() {
        let app = build_router(test_state());
        let req = post_json("/chat", serde_json::json!({"message": "안녕하세요"}));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat: ChatResponse = json_body(response).await;
        assert!(!chat.session_id.is_empty());
        assert!(!chat.message.trim().is_empty());
        assert_eq!(chat.query_type, QueryType::General);
        assert!(chat.sources.is_empty());
        assert!(!chat.degraded);
    }

    #[tokio::test]
    async fn curriculum_turn_carries_sources() {
        let app = build_router(test_state());
        let req = post_json("/chat", serde_json::json!({"message": "전공필수 뭐 있어?"}));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat: ChatResponse = json_body(response).await;
        assert_eq!(chat.query_type, QueryType::Curriculum);
        assert!(!chat.sources.is_empty());
    }

    #[tokio::test]
    async fn session_is_continued_across_turns() {
        let state = test_state();

        let first = build_router(state.clone())
            .oneshot(post_json("/chat", serde_json::json!({"message": "안녕하세요"})))
            .await
            .unwrap();
        let first: ChatResponse = json_body(first).await;

        let second = build_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"message": "고마워!", "session_id": first.session_id}),
            ))
            .await
            .unwrap();
        let second: ChatResponse = json_body(second).await;
        assert_eq!(second.session_id, first.session_id);

        let detail = build_router(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/session/{}", second.session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let detail: SessionDetailResponse = json_body(detail).await;
        assert_eq!(detail.history.len(), 4);
        assert_eq!(detail.history[0].role, "user");
        assert_eq!(detail.history[0].content, "안녕하세요");
    }

    #[tokio::test]
    async fn taken_course_is_never_recommended_again() {
        let app = build_router(test_state());
        let body = serde_json::json!({
            "message": "CSE101 들었는데 다음에 뭐 들어야 해?",
            "user_profile": {
                "admission_year": 2021,
                "current_semester": 3,
                "courses_taken": [{
                    "course_code": "CSE101",
                    "course_name": "프로그래밍기초",
                    "credit": 3,
                    "grade": "A+",
                    "course_area": "전공필수"
                }]
            }
        });

        let response = app.oneshot(post_json("/chat", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat: ChatResponse = json_body(response).await;
        assert!(chat.query_type.wants_retrieval());
        assert!(!chat.sources.is_empty());
        assert!(!chat.message.contains("CSE101"));
    }

    #[tokio::test]
    async fn session_create_and_fetch() {
        let state = test_state();

        let created = build_router(state.clone())
            .oneshot(post_json(
                "/session",
                serde_json::json!({"user_profile": {"admission_year": 2020}}),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let created: CreateSessionResponse = json_body(created).await;

        let detail = build_router(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/session/{}", created.session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(detail.status(), StatusCode::OK);
        let detail: SessionDetailResponse = json_body(detail).await;
        assert_eq!(detail.profile.unwrap().admission_year, 2020);
        assert!(detail.history.is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/session/nope")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_update_requires_existing_session() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method("PUT")
            .uri("/session/nope/profile")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"admission_year": 2022}"#))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cleanup_reports_removed_count() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method("DELETE")
            .uri("/sessions/cleanup")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cleanup: CleanupResponse = json_body(response).await;
        assert_eq!(cleanup.removed, 0);
    }
}
