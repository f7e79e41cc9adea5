//! CSV export handler
//!
//! Streams the filtered log set as CSV in keyset-paged batches so large
//! ranges never sit fully in memory.

use std::collections::HashMap;
use std::io;

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::stream;
use sqlx::PgPool;

use super::query_logs::{resolve_filter, LogListParams};
use crate::models::{agent, AppMessage, QueryLog, QueryLogFilter, QueryLogPart};
use crate::time;
use crate::{AppResult, AppState};

const PAGE_SIZE: i64 = 500;

/// Longest Q/A text emitted per cell.
const TEXT_LIMIT: usize = 1000;

const HEADER_COLUMNS: &[&str] = &[
    "ID",
    "Created At",
    "Status",
    "Blocked By",
    "Is Blacklist Example",
    "Is Whitelist Example",
    "Error Message",
    "User Message",
    "Final Answer",
    "Query Validator - Model",
    "Query Validator - Agent",
    "Query Validator - Blocked",
    "Query Validator - Is Legitimate",
    "Query Validator - Reasoning",
    "Blacklist Validator - Model",
    "Blacklist Validator - Agent",
    "Blacklist Validator - Blocked",
    "Blacklist Validator - Is Legitimate",
    "Blacklist Validator - Reasoning",
    "Runtime - Model",
    "Runtime - Agent",
];

/// Quote a CSV field when it needs quoting; embedded quotes are doubled.
pub(crate) fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub(crate) fn csv_row(fields: &[String]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

/// Truncate on a character boundary, marking elided text.
pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

fn yes_no(value: bool) -> String {
    if value { "Yes" } else { "No" }.to_string()
}

fn validator_columns(part: Option<&QueryLogPart>) -> [String; 5] {
    let Some(part) = part else {
        return Default::default();
    };
    let verdict = part
        .result
        .get("is_legitimate_query")
        .and_then(|v| v.as_bool())
        .map(yes_no)
        .unwrap_or_default();
    let reasoning = part
        .result
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    [
        part.model_id.clone().unwrap_or_default(),
        part.agent_name.clone().unwrap_or_default(),
        part.blocked.map(yes_no).unwrap_or_default(),
        verdict,
        reasoning,
    ]
}

fn render_row(log: &QueryLog, parts: &[QueryLogPart], tz: chrono_tz::Tz) -> String {
    let by_stage: HashMap<&str, &QueryLogPart> =
        parts.iter().map(|p| (p.stage.as_str(), p)).collect();

    let primary = validator_columns(by_stage.get(agent::VALIDATION_PRIMARY).copied());
    let blacklist = validator_columns(by_stage.get(agent::VALIDATION_BLACKLIST).copied());
    let runtime = by_stage.get(agent::RUNTIME_RAG);

    let mut fields = vec![
        log.id.to_string(),
        time::format_local(log.created_at, tz),
        log.status.clone(),
        log.blocked_by.clone().unwrap_or_default(),
        yes_no(log.is_blacklist_example),
        yes_no(log.is_whitelist_example),
        log.error_message.clone().unwrap_or_default(),
        truncate_text(&log.user_message, TEXT_LIMIT),
        truncate_text(log.final_answer.as_deref().unwrap_or_default(), TEXT_LIMIT),
    ];
    fields.extend(primary);
    fields.extend(blacklist);
    fields.push(
        runtime
            .and_then(|p| p.model_id.clone())
            .unwrap_or_default(),
    );
    fields.push(
        runtime
            .and_then(|p| p.agent_name.clone())
            .unwrap_or_default(),
    );

    csv_row(&fields)
}

async fn render_page(
    pool: &PgPool,
    filter: &QueryLogFilter,
    rejection: &str,
    cursor: Option<(DateTime<Utc>, i64)>,
    tz: chrono_tz::Tz,
) -> Result<Option<(String, (DateTime<Utc>, i64))>, sqlx::Error> {
    let logs = QueryLog::export_page(pool, filter, rejection, cursor, PAGE_SIZE).await?;
    let Some(last) = logs.last() else {
        return Ok(None);
    };
    let next_cursor = (last.created_at, last.id);

    let ids: Vec<i64> = logs.iter().map(|l| l.id).collect();
    let mut parts_by_log: HashMap<i64, Vec<QueryLogPart>> = HashMap::new();
    for (log_id, part) in QueryLog::parts_for(pool, &ids).await? {
        parts_by_log.entry(log_id).or_default().push(part);
    }

    let mut chunk = String::new();
    for log in &logs {
        let parts = parts_by_log.remove(&log.id).unwrap_or_default();
        chunk.push_str(&render_row(log, &parts, tz));
    }

    Ok(Some((chunk, next_cursor)))
}

enum ExportStep {
    Header,
    Page(Option<(DateTime<Utc>, i64)>),
    Done,
}

/// Export query logs as CSV with the same filters as the list endpoint.
pub async fn csv(
    State(state): State<AppState>,
    Query(params): Query<LogListParams>,
) -> AppResult<Response> {
    let tz = state.config.reference_timezone;
    let mut filter = resolve_filter(&params, tz)?;
    // The export always covers the full filtered set.
    filter.limit = None;
    filter.offset = 0;

    let rejection = AppMessage::standard_rejection(&state.pool).await?;
    let pool = state.pool.clone();

    let body_stream = stream::unfold(ExportStep::Header, move |step| {
        let pool = pool.clone();
        let filter = filter.clone();
        let rejection = rejection.clone();
        async move {
            match step {
                ExportStep::Header => {
                    let header = csv_row(
                        &HEADER_COLUMNS
                            .iter()
                            .map(|c| c.to_string())
                            .collect::<Vec<_>>(),
                    );
                    Some((Ok::<String, io::Error>(header), ExportStep::Page(None)))
                }
                ExportStep::Page(cursor) => {
                    match render_page(&pool, &filter, &rejection, cursor, tz).await {
                        Ok(Some((chunk, next_cursor))) => {
                            Some((Ok(chunk), ExportStep::Page(Some(next_cursor))))
                        }
                        Ok(None) => None,
                        Err(err) => {
                            tracing::error!("csv export page failed: {}", err);
                            Some((
                                Err(io::Error::other(err.to_string())),
                                ExportStep::Done,
                            ))
                        }
                    }
                }
                ExportStep::Done => None,
            }
        }
    });

    let filename = format!(
        "chatbot_logs_{}.csv",
        Utc::now().with_timezone(&tz).format("%Y%m%d_%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        Body::from_stream(body_stream),
    )
        .into_response())
}
