//! REST knowledge index — vector search over an HTTP RPC endpoint.
//!
//! Speaks the `match_documents` convention: POST a query and a match count,
//! get back an array of `{content, metadata, similarity}` rows ordered by
//! similarity. Every failure maps into a `RetrievalError` so the engine can
//! degrade the turn instead of failing it.

use async_trait::async_trait;
use haksa_core::error::RetrievalError;
use haksa_core::retrieval::{KnowledgeIndex, SearchSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A knowledge index backed by a remote vector-search RPC.
pub struct RestIndex {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    query: &'a str,
    match_count: usize,
}

#[derive(Deserialize)]
struct RpcRow {
    content: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    similarity: Option<f32>,
}

impl RestIndex {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl KnowledgeIndex for RestIndex {
    fn name(&self) -> &str {
        "rest"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchSource>, RetrievalError> {
        debug!(endpoint = %self.endpoint, top_k, "Dispatching vector search");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RpcRequest {
                query,
                match_count: top_k,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrievalError::IndexUnreachable(format!("Timed out: {e}"))
                } else {
                    RetrievalError::IndexUnreachable(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::QueryFailed(format!(
                "Index returned status {status}"
            )));
        }

        let rows: Vec<RpcRow> = response
            .json()
            .await
            .map_err(|e| RetrievalError::BadResponse(format!("Invalid JSON: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| SearchSource {
                content: row.content,
                metadata: row.metadata,
                score: row.similarity,
            })
            .collect())
    }
}
