//! Model catalogue handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::models::{LlmModel, UpsertLlmModel};
use crate::{AppError, AppResult, AppState};

/// List all configured models.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<LlmModel>>> {
    let models = LlmModel::list(&state.pool).await?;
    Ok(Json(models))
}

/// Create a new model entry.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<UpsertLlmModel>,
) -> AppResult<(StatusCode, Json<LlmModel>)> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    let model = LlmModel::create(&state.pool, &payload).await?;
    Ok((StatusCode::CREATED, Json(model)))
}

/// Replace an existing model entry identified by its current model_id.
pub async fn update(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    Json(payload): Json<UpsertLlmModel>,
) -> AppResult<Json<LlmModel>> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    let model = LlmModel::update(&state.pool, &model_id, &payload).await?;
    Ok(Json(model))
}

/// Delete a model by its model_id.
pub async fn delete(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<StatusCode> {
    LlmModel::delete(&state.pool, &model_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
