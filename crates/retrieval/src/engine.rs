//! Retrieval engine — dispatches knowledge lookups per query type.
//!
//! The engine is the partial-failure boundary: a `general` turn skips
//! retrieval entirely, and an index fault collapses into `Retrieval::Degraded`
//! so the chat turn continues with an empty source list. An unhandled fault
//! never escapes this module.

use haksa_core::profile::UserProfile;
use haksa_core::retrieval::{KnowledgeIndex, QueryType, Retrieval};
use std::sync::Arc;
use tracing::{debug, warn};

/// Dispatches retrieval against a knowledge index.
pub struct RetrievalEngine {
    index: Arc<dyn KnowledgeIndex>,
    top_k: usize,
    hybrid_top_k: usize,
}

impl RetrievalEngine {
    pub fn new(index: Arc<dyn KnowledgeIndex>, top_k: usize, hybrid_top_k: usize) -> Self {
        Self {
            index,
            top_k,
            hybrid_top_k,
        }
    }

    /// Fetch sources for one turn. Stateless per invocation.
    pub async fn search(
        &self,
        query: &str,
        query_type: QueryType,
        profile: Option<&UserProfile>,
    ) -> Retrieval {
        if !query_type.wants_retrieval() {
            return Retrieval::Skipped;
        }

        // Hybrid turns split the answer between retrieval and reasoning, so
        // they fetch fewer sources (the original backend does the same).
        let top_k = match query_type {
            QueryType::Hybrid => self.hybrid_top_k,
            _ => self.top_k,
        };

        let query = Self::augment_query(query, profile);

        match self.index.search(&query, top_k).await {
            Ok(mut sources) => {
                sources.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                sources.truncate(top_k);
                debug!(
                    index = self.index.name(),
                    count = sources.len(),
                    %query_type,
                    "Retrieval complete"
                );
                Retrieval::Fetched(sources)
            }
            Err(e) => {
                warn!(
                    index = self.index.name(),
                    error = %e,
                    "Knowledge index failed — continuing without sources"
                );
                Retrieval::Degraded
            }
        }
    }

    /// A non-default track biases retrieval toward track-specific material.
    fn augment_query(query: &str, profile: Option<&UserProfile>) -> String {
        match profile {
            Some(p) if p.track != "일반" => format!("{query} {}", p.track),
            _ => query.to_string(),
        }
    }
}
