//! Aggregated query metrics
//!
//! One SQL pass collapses each query in the window to a rollup row (status
//! plus which validators fired); a pure fold turns those rows into the
//! dashboard counts. Rates are derived at response time, never stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::models::agent;

/// Per-query rollup over the log and its stage parts.
#[derive(Debug, Clone, FromRow)]
pub struct QueryRollup {
    pub status: String,
    pub primary_blocked: bool,
    pub blacklist_blocked: bool,
    pub rejection_verbatim: bool,
}

/// Exact counts over a metrics window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsTotals {
    pub total_queries: i64,
    pub answered: i64,
    pub blocked: i64,
    pub error: i64,
    pub blocked_by_query_validator: i64,
    pub blocked_by_blacklist_validator: i64,
    pub blocked_by_both: i64,
    pub passed_guardrails: i64,
    pub no_answer_after_pass: i64,
}

/// Full metrics response for a calendar-day window.
#[derive(Debug, Serialize)]
pub struct WeeklyMetrics {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(flatten)]
    pub totals: MetricsTotals,
    pub answered_rate: f64,
    pub blocked_rate: f64,
}

/// Fold rollup rows into window totals.
///
/// `total_queries` counts every row, error rows included; `error` is broken
/// out separately.
pub fn summarize(rows: &[QueryRollup]) -> MetricsTotals {
    let mut totals = MetricsTotals::default();

    for row in rows {
        totals.total_queries += 1;
        match row.status.as_str() {
            "answered" => totals.answered += 1,
            "blocked" => totals.blocked += 1,
            "error" => totals.error += 1,
            _ => {}
        }

        if row.primary_blocked {
            totals.blocked_by_query_validator += 1;
        }
        if row.blacklist_blocked {
            totals.blocked_by_blacklist_validator += 1;
        }
        if row.primary_blocked && row.blacklist_blocked {
            totals.blocked_by_both += 1;
        }
        if !row.primary_blocked && !row.blacklist_blocked {
            totals.passed_guardrails += 1;
            if row.status == "answered" && row.rejection_verbatim {
                totals.no_answer_after_pass += 1;
            }
        }
    }

    totals
}

/// Percentage of `numerator` over `denominator`, one decimal place.
/// Reports 0 for an empty window instead of dividing by zero.
pub fn percent(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    let pct = numerator as f64 / denominator as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Fetch one rollup row per query in `[start_utc, end_utc)`.
pub async fn fetch_rollups(
    pool: &PgPool,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
    rejection_message: &str,
) -> Result<Vec<QueryRollup>, sqlx::Error> {
    sqlx::query_as::<_, QueryRollup>(
        r#"
        SELECT
            q.status,
            COALESCE(BOOL_OR(p.stage = $3 AND p.blocked), false) AS primary_blocked,
            COALESCE(BOOL_OR(p.stage = $4 AND p.blocked), false) AS blacklist_blocked,
            COALESCE(q.status = 'answered' AND q.final_answer = $5, false) AS rejection_verbatim
        FROM query_logs AS q
        LEFT JOIN query_log_parts AS p ON p.query_log_id = q.id
        WHERE q.created_at >= $1 AND q.created_at < $2
        GROUP BY q.id, q.status, q.final_answer
        "#,
    )
    .bind(start_utc)
    .bind(end_utc)
    .bind(agent::VALIDATION_PRIMARY)
    .bind(agent::VALIDATION_BLACKLIST)
    .bind(rejection_message)
    .fetch_all(pool)
    .await
}
