//! Training example handlers

use axum::{extract::State, Json};

use crate::models::TrainingExamples;
use crate::{AppResult, AppState};

/// Fetch the global blacklist and whitelist training examples.
pub async fn get(State(state): State<AppState>) -> AppResult<Json<TrainingExamples>> {
    let examples = TrainingExamples::load(&state.pool).await?;
    Ok(Json(examples))
}

/// Replace both example sets with the provided lists.
pub async fn put(
    State(state): State<AppState>,
    Json(payload): Json<TrainingExamples>,
) -> AppResult<Json<TrainingExamples>> {
    let saved = TrainingExamples::save(&state.pool, &payload).await?;
    Ok(Json(saved))
}
