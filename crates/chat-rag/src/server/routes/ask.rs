//! Stateless question endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AskRequest, PipelineResult};

/// POST /api/ask - Answer one question without conversation history
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<PipelineResult>> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(Error::InvalidRequest("question must not be empty".to_string()));
    }

    let start = Instant::now();
    tracing::info!("Ask: \"{}\"", question);

    let result = state
        .with_timeout(state.pipeline().run(question, request.top_k))
        .await?;

    tracing::info!(
        "Ask completed in {}ms, {} passages, {} cited",
        start.elapsed().as_millis(),
        result.docs.len(),
        result.sources.len()
    );

    Ok(Json(result))
}
