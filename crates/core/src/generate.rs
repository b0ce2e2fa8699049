//! Generator trait — the abstraction over answer generation backends.
//!
//! A Generator turns an assembled prompt (system guidance + history + the
//! user question) into the final answer text. Implementations: an
//! OpenAI-compatible HTTP backend and a deterministic offline template
//! backend. The composer owns the fallback policy, so a failed generation
//! never aborts a chat turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::message::Message;

/// A fully assembled generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// System guidance, including retrieved context and profile summary
    pub system: String,

    /// The truncated conversation history (oldest first)
    pub history: Vec<Message>,

    /// The latest user message
    pub user: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

/// The core Generator trait.
///
/// Pure request→response: no state is carried between invocations, so
/// implementations can be swapped for scripted fakes in tests.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "template").
    fn name(&self) -> &str;

    /// Generate the answer text for the request.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let json = r#"{"system": "안내 챗봇입니다.", "history": [], "user": "안녕"}"#;
        let req: GenerationRequest = serde_json::from_str(json).unwrap();
        assert!((req.temperature - 0.3).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }
}
