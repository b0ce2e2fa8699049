//! In-memory knowledge index — keyword-overlap scoring over seeded snippets.
//!
//! Snippets come from a JSON file at startup (or `insert` in tests). Scoring
//! is term-occurrence counting normalized by snippet length; good enough for
//! department FAQ material, and fully deterministic.

use async_trait::async_trait;
use haksa_core::error::RetrievalError;
use haksa_core::retrieval::{KnowledgeIndex, SearchSource};
use serde::Deserialize;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

/// A snippet as it appears in the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct Snippet {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// An in-memory keyword index over knowledge snippets.
pub struct InMemoryIndex {
    snippets: RwLock<Vec<Snippet>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            snippets: RwLock::new(Vec::new()),
        }
    }

    /// Load snippets from a JSON file (an array of `{content, metadata}`).
    pub fn from_json_file(path: &Path) -> Result<Self, RetrievalError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::QueryFailed(format!("Cannot read {}: {e}", path.display()))
        })?;
        let snippets: Vec<Snippet> = serde_json::from_str(&content)
            .map_err(|e| RetrievalError::BadResponse(format!("Invalid snippet file: {e}")))?;

        info!(count = snippets.len(), path = %path.display(), "Knowledge snippets loaded");
        Ok(Self {
            snippets: RwLock::new(snippets),
        })
    }

    /// Add one snippet (used by tests and the seeding path).
    pub fn insert(&self, snippet: Snippet) {
        self.snippets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(snippet);
    }

    pub fn len(&self) -> usize {
        self.snippets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occurrence count of query terms, normalized per 100 chars of content.
    fn score(content: &str, terms: &[String]) -> f32 {
        let content_lower = content.to_lowercase();
        let occurrences: usize = terms
            .iter()
            .map(|t| content_lower.matches(t.as_str()).count())
            .sum();
        occurrences as f32 / (content.chars().count() as f32 / 100.0).max(1.0)
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchSource>, RetrievalError> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let snippets = self.snippets.read().unwrap_or_else(|e| e.into_inner());
        let mut results: Vec<SearchSource> = snippets
            .iter()
            .filter_map(|s| {
                let score = Self::score(&s.content, &terms);
                (score > 0.0).then(|| SearchSource {
                    content: s.content.clone(),
                    metadata: s.metadata.clone(),
                    score: Some(score),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }
}
