//! Chatbot entry point

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::pipeline::{self, PipelineContext};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    /// The question or message to send to the assistant
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    /// The assistant's response content
    pub content: String,
    /// Key of the agent that owns this conversation
    pub agent_key: String,
}

/// Run the guardrail pipeline for one query and return the final response.
///
/// The caller always gets a body: the answer, the standard rejection
/// message, or a generic failure message when a stage errored (the audit
/// row carries the diagnostics either way).
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> AppResult<Json<AskResponse>> {
    req.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let pool = state.pool.clone();
    let model = state.model.clone();
    let tz = state.config.reference_timezone;
    let message = req.message;

    // The run is detached from the request: a client disconnect cannot
    // interrupt evaluation between the stage barrier and the log append.
    let handle = tokio::spawn(async move {
        let ctx = PipelineContext::load(&pool, tz).await?;
        let outcome = pipeline::run(&ctx, model.as_ref(), &message).await;
        let log_id = pipeline::persist(&pool, &outcome).await?;
        tracing::info!(
            log_id,
            status = outcome.log.status.as_str(),
            blocked_by = outcome.log.blocked_by.as_deref().unwrap_or(""),
            "query evaluated"
        );
        Ok::<_, AppError>((ctx.answer_agent.row.agent_key.clone(), outcome))
    });

    let (agent_key, outcome) = handle
        .await
        .map_err(|e| AppError::InternalError(format!("pipeline task failed: {e}")))??;

    Ok(Json(AskResponse {
        content: outcome.response_text,
        agent_key,
    }))
}
