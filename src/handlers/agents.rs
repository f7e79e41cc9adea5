//! Agent configuration handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::models::{Agent, UpsertAgent};
use crate::{AppError, AppResult, AppState};

/// List all active agents and their instructions.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Agent>>> {
    let agents = Agent::list_active(&state.pool).await?;
    Ok(Json(agents))
}

/// Fetch a single agent configuration by its logical key.
pub async fn get(
    State(state): State<AppState>,
    Path(agent_key): Path<String>,
) -> AppResult<Json<Agent>> {
    let agent = Agent::find_by_key(&state.pool, &agent_key)
        .await?
        .ok_or_else(|| AppError::NotFound("Agent not found.".to_string()))?;
    Ok(Json(agent))
}

/// Create a new agent and its instructions.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<UpsertAgent>,
) -> AppResult<(StatusCode, Json<Agent>)> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    let agent = Agent::create(&state.pool, &payload).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// Replace an existing agent (identified by current key) and its instructions.
pub async fn update(
    State(state): State<AppState>,
    Path(agent_key): Path<String>,
    Json(payload): Json<UpsertAgent>,
) -> AppResult<Json<Agent>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    let agent = Agent::update(&state.pool, &agent_key, &payload).await?;
    Ok(Json(agent))
}

/// Delete an agent (and its instructions) by key.
pub async fn delete(
    State(state): State<AppState>,
    Path(agent_key): Path<String>,
) -> AppResult<StatusCode> {
    Agent::delete(&state.pool, &agent_key).await?;
    Ok(StatusCode::NO_CONTENT)
}
