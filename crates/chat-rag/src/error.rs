//! Error types for the chat RAG pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Managed vector search failed or is unreachable (recoverable by fallback)
    #[error("Vector search error: {0}")]
    VectorSearch(String),

    /// Passage store error (scan, count or write)
    #[error("Passage store error: {0}")]
    Store(String),

    /// Every retrieval path failed
    #[error("Retrieval failed: managed search: {managed}; fallback: {fallback}")]
    Retrieval { managed: String, fallback: String },

    /// Generation call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// No generation client was configured
    #[error("Generation client is not configured")]
    GenerationUnavailable,

    /// Conversation session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Invalid request input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A turn did not complete in time
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector search error
    pub fn vector_search(message: impl Into<String>) -> Self {
        Self::VectorSearch(message.into())
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            Error::VectorSearch(_) => (StatusCode::BAD_GATEWAY, "vector_search_error"),
            Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            Error::Retrieval { .. } => (StatusCode::SERVICE_UNAVAILABLE, "retrieval_error"),
            Error::Llm(_) => (StatusCode::SERVICE_UNAVAILABLE, "llm_error"),
            Error::GenerationUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable")
            }
            Error::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_error_message_carries_both_causes() {
        let err = Error::Retrieval {
            managed: "index missing".to_string(),
            fallback: "store unreachable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("index missing"));
        assert!(msg.contains("store unreachable"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::SessionNotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::Timeout(5).into_response().status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            Error::GenerationUnavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
