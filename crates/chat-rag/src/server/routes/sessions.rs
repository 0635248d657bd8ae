//! Conversation session endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::conversation::{ConversationTurn, Role};
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::PipelineResult;

/// Response for a newly created session
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// One chat message
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Stored turns of a session
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub turns: Vec<ConversationTurn>,
}

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::SessionNotFound(raw.to_string()))
}

/// POST /api/sessions - Start a conversation
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.create_session();
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

/// POST /api/sessions/:id/messages - Run one chat turn
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<PipelineResult>> {
    let id = parse_session_id(&id)?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(Error::InvalidRequest("message must not be empty".to_string()));
    }

    let handle = state.session(&id)?;
    let start = Instant::now();

    // Held for the whole turn so turns of one session never interleave.
    let mut session = handle.lock().await;
    let outcome = state
        .with_timeout(state.pipeline().chat_turn(&mut session, message, request.top_k))
        .await;

    // A timed-out turn is dropped after recording the question; withdraw it.
    if matches!(outcome, Err(Error::Timeout(_))) {
        let dangling = session
            .history
            .turns()
            .last()
            .is_some_and(|t| t.role == Role::User && t.content == message);
        if dangling {
            session.history.pop_last();
        }
    }
    let result = outcome?;

    tracing::info!(
        "Session {} turn completed in {}ms ({} turns stored)",
        id,
        start.elapsed().as_millis(),
        session.history.len()
    );

    Ok(Json(result))
}

/// GET /api/sessions/:id/history - List stored turns
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>> {
    let id = parse_session_id(&id)?;
    let handle = state.session(&id)?;
    let session = handle.lock().await;

    Ok(Json(HistoryResponse {
        session_id: id,
        turns: session.history.turns().cloned().collect(),
    }))
}

/// DELETE /api/sessions/:id - Clear and drop a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_session_id(&id)?;
    let handle = state.session(&id)?;
    state.remove_session(&id)?;
    handle.lock().await.history.clear();
    Ok(StatusCode::NO_CONTENT)
}
