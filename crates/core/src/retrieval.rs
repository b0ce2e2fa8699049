//! Retrieval domain types and the KnowledgeIndex trait.
//!
//! Retrieval grounds curriculum-related answers in department knowledge
//! snippets. It is deliberately best-effort: a chat answer without sources is
//! acceptable, an unhandled fault is not — which is why the engine returns
//! the explicit [`Retrieval`] outcome instead of a plain `Result`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// How a chat turn is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Answerable from profile/history/model alone — no retrieval
    General,
    /// Requires a lookup against course/curriculum knowledge
    Curriculum,
    /// Needs both retrieval and general reasoning
    Hybrid,
}

impl QueryType {
    /// Whether this query type dispatches retrieval at all.
    pub fn wants_retrieval(self) -> bool {
        !matches!(self, QueryType::General)
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryType::General => "general",
            QueryType::Curriculum => "curriculum",
            QueryType::Hybrid => "hybrid",
        };
        write!(f, "{s}")
    }
}

/// One retrieved knowledge snippet. Produced transiently by retrieval and
/// embedded in a response; never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSource {
    /// The snippet text
    pub content: String,

    /// Arbitrary metadata (title, category, course_code, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Relevance score, higher is better
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl SearchSource {
    /// Convenience accessor for a string metadata field.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Outcome of a retrieval dispatch. Callers are forced to handle the
/// reduced-functionality case at compile time.
#[derive(Debug, Clone)]
pub enum Retrieval {
    /// Sources fetched, ordered by descending score
    Fetched(Vec<SearchSource>),
    /// Retrieval not needed for this query type
    Skipped,
    /// The knowledge index failed; the turn continues without sources
    Degraded,
}

impl Retrieval {
    /// The retrieved sources (empty for `Skipped` and `Degraded`).
    pub fn sources(&self) -> &[SearchSource] {
        match self {
            Retrieval::Fetched(sources) => sources,
            Retrieval::Skipped | Retrieval::Degraded => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Retrieval::Degraded)
    }
}

/// The knowledge index seam — a pure query→snippets capability.
///
/// Implementations: in-memory keyword index, REST vector-search endpoint.
/// Stateless per invocation so it can be substituted with fakes in tests.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// The index name (e.g., "in_memory", "rest").
    fn name(&self) -> &str;

    /// Search for the `top_k` most relevant snippets.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<SearchSource>, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&QueryType::Curriculum).unwrap(),
            "\"curriculum\""
        );
        assert_eq!(QueryType::Hybrid.to_string(), "hybrid");
    }

    #[test]
    fn only_general_skips_retrieval() {
        assert!(!QueryType::General.wants_retrieval());
        assert!(QueryType::Curriculum.wants_retrieval());
        assert!(QueryType::Hybrid.wants_retrieval());
    }

    #[test]
    fn degraded_outcome_has_no_sources() {
        let outcome = Retrieval::Degraded;
        assert!(outcome.sources().is_empty());
        assert!(outcome.is_degraded());
    }

    #[test]
    fn source_metadata_accessor() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("title".into(), serde_json::json!("도서관 안내"));
        let source = SearchSource {
            content: "중앙도서관은 평일 9시부터 22시까지 운영합니다.".into(),
            metadata,
            score: Some(0.91),
        };
        assert_eq!(source.meta_str("title"), Some("도서관 안내"));
        assert_eq!(source.meta_str("category"), None);
    }
}
