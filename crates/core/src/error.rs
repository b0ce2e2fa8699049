//! Error types for the haksa domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Note the split the orchestrator relies on: `Session` errors are fatal for
//! a chat turn, while retrieval and generation failures are absorbed into
//! degraded-but-valid replies and never reach the top-level `Error` on the
//! chat path.

use thiserror::Error;

/// The top-level error type for all haksa operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Session store errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum SessionError {
    /// The store itself cannot be reached. Fatal for the request (503-class).
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    /// No session with the given id. Recoverable — the orchestrator mints a
    /// fresh session instead of surfacing this to the client.
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Knowledge index unreachable: {0}")]
    IndexUnreachable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Malformed index response: {0}")]
    BadResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty completion")]
    EmptyCompletion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_displays_correctly() {
        let err = Error::Session(SessionError::NotFound("abc-123".into()));
        assert!(err.to_string().contains("abc-123"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn generation_error_displays_correctly() {
        let err = Error::Generation(GenerationError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }
}
