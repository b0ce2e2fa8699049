//! End-to-end tests over the assembled HTTP service.
//!
//! Builds the real router with in-memory backends and drives it the way the
//! department chat widget does: multi-turn conversations, profile-personalized
//! curriculum questions, and session inspection.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use haksa_core::error::RetrievalError;
use haksa_core::retrieval::{KnowledgeIndex, SearchSource};
use haksa_engine::{ChatOrchestrator, HistoryAssembler, ResponseComposer};
use haksa_gateway::{AppState, SharedState, build_router};
use haksa_generate::TemplateGenerator;
use haksa_retrieval::engine::RetrievalEngine;
use haksa_retrieval::in_memory::{InMemoryIndex, Snippet};
use haksa_session::in_memory::InMemorySessionStore;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn snippet(content: &str, metadata: serde_json::Value) -> Snippet {
    let serde_json::Value::Object(metadata) = metadata else {
        panic!("metadata must be an object");
    };
    Snippet {
        content: content.into(),
        metadata,
    }
}

fn service_state() -> SharedState {
    let store = Arc::new(InMemorySessionStore::new(24));

    let index = InMemoryIndex::new();
    index.insert(snippet(
        "자료구조(CSE201)는 전공필수 과목으로, 프로그래밍 기초 이수 후 다음에 수강을 권장합니다.",
        serde_json::json!({"course_code": "CSE201", "course_name": "자료구조"}),
    ));
    index.insert(snippet(
        "프로그래밍기초(CSE101)는 1학년 1학기 전공필수 과목입니다.",
        serde_json::json!({"course_code": "CSE101", "course_name": "프로그래밍기초"}),
    ));
    index.insert(snippet(
        "2020학번 졸업 요건: 전공필수 45학점, 교양 30학점 이상을 이수해야 합니다.",
        serde_json::json!({"category": "졸업요건"}),
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
        started_at: chrono::Utc::now(),
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

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn multi_turn_conversation_keeps_one_session() {
    let state = service_state();

    let first = build_router(state.clone())
        .oneshot(post_json("/chat", serde_json::json!({"message": "안녕하세요"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = json_body(first).await;
    let session_id = first["session_id"].as_str().unwrap().to_string();
    assert_eq!(first["query_type"], "general");

    let second = build_router(state.clone())
        .oneshot(post_json(
            "/chat",
            serde_json::json!({"message": "전공필수 뭐 있어?", "session_id": session_id}),
        ))
        .await
        .unwrap();
    let second = json_body(second).await;
    assert_eq!(second["session_id"].as_str().unwrap(), session_id);
    assert_eq!(second["query_type"], "curriculum");
    assert!(!second["sources"].as_array().unwrap().is_empty());

    // The server-side history carries both turns in order.
    let detail = build_router(state)
        .oneshot(
            Request::builder()
                .uri(format!("/session/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let detail = json_body(detail).await;
    let history = detail["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0]["content"], "안녕하세요");
    assert_eq!(history[2]["content"], "전공필수 뭐 있어?");
}

#[tokio::test]
async fn personalized_answer_skips_completed_courses() {
    let state = service_state();

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

    let response = build_router(state)
        .oneshot(post_json("/chat", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat = json_body(response).await;
    let message = chat["message"].as_str().unwrap();
    assert!(!message.contains("CSE101"));
    assert!(message.contains("자료구조"));
    assert!(!chat["sources"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn personal_question_without_profile_asks_for_one() {
    let state = service_state();

    let response = build_router(state)
        .oneshot(post_json(
            "/chat",
            serde_json::json!({"message": "내가 들은 과목으로 남은 학점 계산해줘"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat = json_body(response).await;
    let message = chat["message"].as_str().unwrap();
    assert!(message.contains("학번과 수강 이력"));
}

#[tokio::test]
async fn graduation_question_routes_hybrid() {
    let state = service_state();

    let response = build_router(state)
        .oneshot(post_json(
            "/chat",
            serde_json::json!({"message": "졸업 요건이 뭐야?"}),
        ))
        .await
        .unwrap();
    let chat = json_body(response).await;
    assert_eq!(chat["query_type"], "hybrid");
}

#[tokio::test]
async fn expired_session_id_still_gets_an_answer() {
    let state = service_state();

    let response = build_router(state)
        .oneshot(post_json(
            "/chat",
            serde_json::json!({"message": "안녕하세요", "session_id": "long-gone"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat = json_body(response).await;
    assert_ne!(chat["session_id"].as_str().unwrap(), "long-gone");
    assert!(!chat["message"].as_str().unwrap().is_empty());
}

struct UnreachableIndex;

#[async_trait]
impl KnowledgeIndex for UnreachableIndex {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<SearchSource>, RetrievalError> {
        Err(RetrievalError::IndexUnreachable("connection refused".into()))
    }
}

#[tokio::test]
async fn index_outage_still_answers_with_empty_sources() {
    let store = Arc::new(InMemorySessionStore::new(24));
    let retrieval = RetrievalEngine::new(Arc::new(UnreachableIndex), 3, 2);
    let composer = ResponseComposer::new(Arc::new(TemplateGenerator::new()), 0.3, Some(500));
    let orchestrator = Arc::new(ChatOrchestrator::new(
        store.clone(),
        retrieval,
        composer,
        HistoryAssembler::new(10),
    ));
    let state = Arc::new(AppState {
        orchestrator,
        store,
        started_at: chrono::Utc::now(),
    });

    let response = build_router(state)
        .oneshot(post_json(
            "/chat",
            serde_json::json!({"message": "전공필수 뭐 있어?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat = json_body(response).await;
    assert!(!chat["message"].as_str().unwrap().is_empty());
    assert!(chat["sources"].as_array().unwrap().is_empty());
    assert_eq!(chat["degraded"], true);
}

#[tokio::test]
async fn health_is_exposed() {
    let state = service_state();
    let response = build_router(state)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["session_backend"], "in_memory");
}
