//! HTTP gateway for the haksa chat service.
//!
//! Wires the configured backends (session store, knowledge index, generator)
//! into a [`ChatOrchestrator`] and exposes it over Axum. A background task
//! sweeps expired sessions on the configured interval.

pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use haksa_config::AppConfig;
use haksa_core::error::Error;
use haksa_core::generate::Generator;
use haksa_core::retrieval::KnowledgeIndex;
use haksa_core::session::SessionStore;
use haksa_engine::{ChatOrchestrator, HistoryAssembler, ResponseComposer};
use haksa_generate::{OpenAiCompatGenerator, TemplateGenerator};
use haksa_retrieval::engine::RetrievalEngine;
use haksa_retrieval::in_memory::InMemoryIndex;
use haksa_retrieval::rest::RestIndex;
use haksa_session::in_memory::InMemorySessionStore;
use haksa_session::sqlite::SqliteSessionStore;

/// Shared application state for the gateway.
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub store: Arc<dyn SessionStore>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

pub type SharedState = Arc<AppState>;

/// Build the Axum router with all routes and layers.
pub fn build_router(state: SharedState) -> Router {
    // The chat widget is embedded in the department homepage, so CORS stays
    // open; the API carries no credentials.
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/chat", post(handlers::chat_handler))
        .route("/session", post(handlers::create_session_handler))
        .route("/session/{id}", get(handlers::get_session_handler))
        .route("/session/{id}/profile", put(handlers::update_profile_handler))
        .route("/sessions/cleanup", delete(handlers::cleanup_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the session store named in the config.
async fn build_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>, Error> {
    match config.session.backend.as_str() {
        "sqlite" => {
            let store =
                SqliteSessionStore::new(&config.session.sqlite_path, config.session.ttl_hours)
                    .await?;
            Ok(Arc::new(store))
        }
        _ => Ok(Arc::new(InMemorySessionStore::new(config.session.ttl_hours))),
    }
}

/// Build the knowledge index named in the config.
fn build_index(config: &AppConfig) -> Result<Arc<dyn KnowledgeIndex>, Error> {
    match (config.retrieval.index.as_str(), &config.retrieval.endpoint) {
        ("rest", Some(endpoint)) => Ok(Arc::new(RestIndex::new(endpoint))),
        ("rest", None) => Err(Error::Config {
            message: "retrieval.index = \"rest\" requires retrieval.endpoint".into(),
        }),
        _ => match &config.retrieval.knowledge_path {
            Some(path) => {
                let index = InMemoryIndex::from_json_file(std::path::Path::new(path))?;
                Ok(Arc::new(index))
            }
            None => {
                warn!("No knowledge_path configured — the in-memory index starts empty");
                Ok(Arc::new(InMemoryIndex::new()))
            }
        },
    }
}

/// Build the generator named in the config. Falls back to the offline
/// template backend when no API key is available.
fn build_generator(config: &AppConfig) -> Arc<dyn Generator> {
    match (config.generator.backend.as_str(), &config.generator.api_key) {
        ("openai", Some(api_key)) => Arc::new(OpenAiCompatGenerator::new(
            &config.generator.model,
            &config.generator.api_url,
            api_key,
        )),
        ("openai", None) => {
            warn!("generator.backend = \"openai\" but no API key set — using the template backend");
            Arc::new(TemplateGenerator::new())
        }
        _ => Arc::new(TemplateGenerator::new()),
    }
}

/// Start the gateway HTTP server. Runs until the process is stopped.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = build_store(&config).await?;
    let index = build_index(&config)?;
    let generator = build_generator(&config);

    info!(
        store = store.name(),
        index = index.name(),
        generator = generator.name(),
        "Backends initialized"
    );

    let retrieval = RetrievalEngine::new(
        index,
        config.retrieval.top_k,
        config.retrieval.hybrid_top_k,
    );
    let composer = ResponseComposer::new(
        generator,
        config.generator.temperature,
        Some(config.generator.max_tokens),
    );
    let orchestrator = Arc::new(ChatOrchestrator::new(
        store.clone(),
        retrieval,
        composer,
        HistoryAssembler::new(config.session.history_window),
    ));

    // Periodic eviction of idle sessions.
    let sweep_store = store.clone();
    let sweep_interval = std::time::Duration::from_secs(config.session.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            match sweep_store.sweep_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Expired sessions swept"),
                Err(e) => warn!(error = %e, "Session sweep failed"),
            }
        }
    });

    let state = Arc::new(AppState {
        orchestrator,
        store,
        started_at: chrono::Utc::now(),
    });
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
