//! Query log handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{
    AppMessage, ExampleKind, QueryLog, QueryLogDetail, QueryLogFilter, StatusFilter,
    TrainingExamples,
};
use crate::time;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct LogListParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub q: Option<String>,
    pub status_filter: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Turn raw query parameters into a resolved filter (dates as UTC instants).
pub(crate) fn resolve_filter(
    params: &LogListParams,
    tz: chrono_tz::Tz,
) -> AppResult<QueryLogFilter> {
    let start = time::parse_date_param(params.start_date.as_deref())?;
    let end = time::parse_date_param(params.end_date.as_deref())?;

    if let Some(limit) = params.limit {
        if !(1..=50_000).contains(&limit) {
            return Err(AppError::ValidationError(
                "limit must be between 1 and 50000".to_string(),
            ));
        }
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::ValidationError("offset must be >= 0".to_string()));
    }

    let status = params
        .status_filter
        .as_deref()
        .map(StatusFilter::parse)
        .transpose()?;

    Ok(QueryLogFilter {
        start_utc: start.map(|d| time::day_start_utc(d, tz)),
        // Inclusive end date: compare strictly before the next local midnight.
        end_utc: end.map(|d| time::day_range_utc(d, d, tz).1),
        text: params.q.clone().filter(|q| !q.trim().is_empty()),
        status,
        limit: params.limit,
        offset,
    })
}

/// List query logs for a date range, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<LogListParams>,
) -> AppResult<Json<Vec<QueryLog>>> {
    let filter = resolve_filter(&params, state.config.reference_timezone)?;
    let rejection = AppMessage::standard_rejection(&state.pool).await?;
    let logs = QueryLog::list(&state.pool, &filter, &rejection).await?;
    Ok(Json(logs))
}

/// Fetch a single query log and all of its per-stage metadata.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<QueryLogDetail>> {
    let detail = QueryLog::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Query log not found.".to_string()))?;
    Ok(Json(detail))
}

async fn log_message_for_flag(state: &AppState, id: i64) -> AppResult<String> {
    let message = QueryLog::find_message(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Query log not found.".to_string()))?;
    let message = message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::ValidationError(
            "Query log has no user_message to curate.".to_string(),
        ));
    }
    Ok(message)
}

/// Add this log's query to the blacklist examples. Idempotent.
pub async fn add_blacklist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let message = log_message_for_flag(&state, id).await?;
    TrainingExamples::add(&state.pool, ExampleKind::Blacklist, &message, Some(id)).await?;
    Ok(Json(json!({
        "status": "ok",
        "message": "Query added to blacklist examples.",
    })))
}

/// Remove this log's query from the blacklist examples.
pub async fn remove_blacklist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let message = log_message_for_flag(&state, id).await?;
    let removed = TrainingExamples::remove(&state.pool, ExampleKind::Blacklist, &message).await?;
    let note = if removed {
        "Query removed from blacklist examples."
    } else {
        "Query was not present in blacklist examples."
    };
    Ok(Json(json!({ "status": "ok", "message": note })))
}

/// Add this log's query to the whitelist examples. Idempotent.
///
/// Whitelist wins over blacklist in presentation; both flags may be set.
pub async fn add_whitelist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let message = log_message_for_flag(&state, id).await?;
    TrainingExamples::add(&state.pool, ExampleKind::Whitelist, &message, Some(id)).await?;
    Ok(Json(json!({
        "status": "ok",
        "message": "Query added to whitelist examples.",
    })))
}

/// Remove this log's query from the whitelist examples.
pub async fn remove_whitelist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let message = log_message_for_flag(&state, id).await?;
    let removed = TrainingExamples::remove(&state.pool, ExampleKind::Whitelist, &message).await?;
    let note = if removed {
        "Query removed from whitelist examples."
    } else {
        "Query was not present in whitelist examples."
    };
    Ok(Json(json!({ "status": "ok", "message": note })))
}
