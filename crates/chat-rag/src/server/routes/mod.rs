//! API routes for the chat RAG server

pub mod ask;
pub mod sessions;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Stateless question answering
        .route("/ask", post(ask::ask))
        // Conversations
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id/messages", post(sessions::send_message))
        .route("/sessions/:id/history", get(sessions::get_history))
        .route("/sessions/:id", delete(sessions::delete_session))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pipeline = state.pipeline();
    let retriever = pipeline.retriever();

    Json(serde_json::json!({
        "name": "chat-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Conversational RAG with managed/brute-force retrieval and source-tag citations",
        "backends": {
            "embeddings": retriever.embedder().name(),
            "managed_search": retriever.managed().map(|m| m.name()),
            "passage_store": retriever.store().name(),
            "generation": pipeline.generator().map(|g| g.name()),
            "generation_model": pipeline.generator().map(|g| g.model()),
        },
        "sessions": state.session_count(),
        "cache": pipeline.cache().map(|c| c.stats()),
        "endpoints": {
            "POST /api/ask": "Answer one question with citations",
            "POST /api/sessions": "Start a conversation",
            "POST /api/sessions/:id/messages": "Send a message in a conversation",
            "GET /api/sessions/:id/history": "List conversation turns",
            "DELETE /api/sessions/:id": "End a conversation",
            "GET /api/info": "This document"
        }
    }))
}
