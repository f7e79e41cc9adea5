//! Metrics handlers

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Duration;
use serde::Deserialize;

use crate::models::metrics::{fetch_rollups, percent, summarize, WeeklyMetrics};
use crate::models::AppMessage;
use crate::time;
use crate::{AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct MetricsParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Aggregated chatbot metrics for a calendar-day window.
///
/// With no dates the window is the trailing 7 days ending today; a single
/// bound collapses to a one-day window.
pub async fn weekly(
    State(state): State<AppState>,
    Query(params): Query<MetricsParams>,
) -> AppResult<Json<WeeklyMetrics>> {
    let tz = state.config.reference_timezone;

    let start = time::parse_date_param(params.start_date.as_deref())?;
    let end = time::parse_date_param(params.end_date.as_deref())?;

    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        (Some(s), None) => (s, s),
        (None, Some(e)) => (e, e),
        (None, None) => {
            let today = time::today_in(tz);
            (today - Duration::days(6), today)
        }
    };

    let (start_utc, end_utc) = time::day_range_utc(start, end, tz);

    let rejection = AppMessage::standard_rejection(&state.pool).await?;
    let rollups = fetch_rollups(&state.pool, start_utc, end_utc, &rejection).await?;
    let totals = summarize(&rollups);

    let answered_rate = percent(totals.answered, totals.total_queries);
    let blocked_rate = percent(totals.blocked, totals.total_queries);

    Ok(Json(WeeklyMetrics {
        start_date: start,
        end_date: end,
        totals,
        answered_rate,
        blocked_rate,
    }))
}
