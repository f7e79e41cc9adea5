//! Application message handlers

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::models::{AppMessage, MessageUpdate};
use crate::{AppError, AppResult, AppState};

/// List all application-level messages.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<AppMessage>>> {
    let messages = AppMessage::list(&state.pool).await?;
    Ok(Json(messages))
}

/// Fetch a single message by its key.
pub async fn get(
    State(state): State<AppState>,
    Path(message_key): Path<String>,
) -> AppResult<Json<AppMessage>> {
    let message = AppMessage::find(&state.pool, &message_key)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found.".to_string()))?;
    Ok(Json(message))
}

/// Create or update an application-level message.
pub async fn put(
    State(state): State<AppState>,
    Path(message_key): Path<String>,
    Json(payload): Json<MessageUpdate>,
) -> AppResult<Json<AppMessage>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    let message = AppMessage::upsert(&state.pool, &message_key, &payload.content).await?;
    Ok(Json(message))
}
