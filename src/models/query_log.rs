//! Query log model
//!
//! One `QueryLog` row per chatbot interaction, plus ordered `QueryLogPart`
//! rows recording what every pipeline stage decided. Blacklist/whitelist
//! flags are derived from the curation store by matching `user_message`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::error::{AppError, AppResult};
use crate::models::agent;

/// Final disposition of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Answered,
    Blocked,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Answered => "answered",
            QueryStatus::Blocked => "blocked",
            QueryStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "answered" => Some(QueryStatus::Answered),
            "blocked" => Some(QueryStatus::Blocked),
            "error" => Some(QueryStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueryLog {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_message: String,
    pub final_answer: Option<String>,
    pub status: String,
    pub blocked_by: Option<String>,
    pub error_message: Option<String>,
    pub is_blacklist_example: bool,
    pub is_whitelist_example: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueryLogPart {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub stage: String,
    pub model_id: Option<String>,
    pub agent_name: Option<String>,
    pub blocked: Option<bool>,
    pub result: serde_json::Value,
}

/// Full log detail: the log row plus its ordered stage parts.
#[derive(Debug, Serialize)]
pub struct QueryLogDetail {
    #[serde(flatten)]
    pub log: QueryLog,
    pub parts: Vec<QueryLogPart>,
}

/// A log row waiting to be appended.
#[derive(Debug, Clone)]
pub struct NewQueryLog {
    pub user_message: String,
    pub final_answer: Option<String>,
    pub status: QueryStatus,
    pub blocked_by: Option<String>,
    pub error_message: Option<String>,
}

/// A stage part waiting to be appended under its log.
#[derive(Debug, Clone)]
pub struct NewLogPart {
    pub stage: String,
    pub model_id: Option<String>,
    pub agent_name: Option<String>,
    pub blocked: Option<bool>,
    pub result: serde_json::Value,
}

/// Status filter vocabulary accepted by list/export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Status(QueryStatus),
    Blacklisted,
    Whitelisted,
    BlockedByBlacklistValidator,
    BlockedByQueryValidator,
    StandardRejectionAnswered,
}

impl StatusFilter {
    pub const ALLOWED: &'static [&'static str] = &[
        "answered",
        "blacklisted",
        "blocked",
        "blocked_by_blacklist_validator",
        "blocked_by_query_validator",
        "error",
        "standard_rejection_answered",
        "whitelisted",
    ];

    pub fn parse(value: &str) -> AppResult<Self> {
        if let Some(status) = QueryStatus::parse(value) {
            return Ok(StatusFilter::Status(status));
        }
        match value {
            "blacklisted" => Ok(StatusFilter::Blacklisted),
            "whitelisted" => Ok(StatusFilter::Whitelisted),
            "blocked_by_blacklist_validator" => Ok(StatusFilter::BlockedByBlacklistValidator),
            "blocked_by_query_validator" => Ok(StatusFilter::BlockedByQueryValidator),
            "standard_rejection_answered" => Ok(StatusFilter::StandardRejectionAnswered),
            _ => Err(AppError::ValidationError(format!(
                "Invalid status filter {value:?}. Expected one of {:?}.",
                Self::ALLOWED
            ))),
        }
    }
}

/// Resolved filter over the log store (dates already converted to UTC).
#[derive(Debug, Clone, Default)]
pub struct QueryLogFilter {
    pub start_utc: Option<DateTime<Utc>>,
    pub end_utc: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub status: Option<StatusFilter>,
    pub limit: Option<i64>,
    pub offset: i64,
}

const SELECT_WITH_FLAGS: &str = r#"
SELECT
    q.id,
    q.created_at,
    q.user_message,
    q.final_answer,
    q.status,
    q.blocked_by,
    q.error_message,
    EXISTS (
        SELECT 1 FROM query_examples e
        WHERE e.kind = 'blacklist' AND e.query_text = q.user_message
    ) AS is_blacklist_example,
    EXISTS (
        SELECT 1 FROM query_examples e2
        WHERE e2.kind = 'whitelist' AND e2.query_text = q.user_message
    ) AS is_whitelist_example
FROM query_logs AS q
"#;

fn push_filter_clauses<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    filter: &'a QueryLogFilter,
    rejection_message: &'a str,
) {
    builder.push(" WHERE 1 = 1");

    if let Some(start) = filter.start_utc {
        builder.push(" AND q.created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.end_utc {
        builder.push(" AND q.created_at < ").push_bind(end);
    }
    if let Some(text) = &filter.text {
        let like = format!("%{text}%");
        builder
            .push(" AND (q.user_message ILIKE ")
            .push_bind(like.clone())
            .push(" OR q.final_answer ILIKE ")
            .push_bind(like)
            .push(")");
    }

    match filter.status {
        None => {}
        Some(StatusFilter::Status(status)) => {
            builder.push(" AND q.status = ").push_bind(status.as_str());
        }
        Some(StatusFilter::Blacklisted) => {
            builder.push(
                " AND EXISTS (SELECT 1 FROM query_examples e \
                 WHERE e.kind = 'blacklist' AND e.query_text = q.user_message)",
            );
        }
        Some(StatusFilter::Whitelisted) => {
            builder.push(
                " AND EXISTS (SELECT 1 FROM query_examples e \
                 WHERE e.kind = 'whitelist' AND e.query_text = q.user_message)",
            );
        }
        Some(StatusFilter::BlockedByBlacklistValidator) => {
            builder
                .push(" AND q.status = 'blocked' AND q.blocked_by = ")
                .push_bind(agent::VALIDATION_BLACKLIST);
        }
        Some(StatusFilter::BlockedByQueryValidator) => {
            builder
                .push(" AND q.status = 'blocked' AND q.blocked_by = ")
                .push_bind(agent::VALIDATION_PRIMARY);
        }
        Some(StatusFilter::StandardRejectionAnswered) => {
            builder
                .push(" AND q.status = 'answered' AND q.final_answer = ")
                .push_bind(rejection_message);
        }
    }
}

impl QueryLog {
    /// Atomically append one log row with all of its stage parts.
    ///
    /// Either the whole record commits or nothing does; readers never see a
    /// log without its parts.
    pub async fn append(
        pool: &PgPool,
        log: &NewQueryLog,
        parts: &[NewLogPart],
    ) -> Result<i64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let log_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO query_logs (user_message, final_answer, status, blocked_by, error_message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&log.user_message)
        .bind(&log.final_answer)
        .bind(log.status.as_str())
        .bind(&log.blocked_by)
        .bind(&log.error_message)
        .fetch_one(&mut *tx)
        .await?;

        for part in parts {
            sqlx::query(
                r#"
                INSERT INTO query_log_parts (query_log_id, stage, model_id, agent_name, blocked, result)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(log_id)
            .bind(&part.stage)
            .bind(&part.model_id)
            .bind(&part.agent_name)
            .bind(part.blocked)
            .bind(&part.result)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(log_id)
    }

    /// Append with a single retry for transient storage failures.
    pub async fn append_with_retry(
        pool: &PgPool,
        log: &NewQueryLog,
        parts: &[NewLogPart],
    ) -> AppResult<i64> {
        match Self::append(pool, log, parts).await {
            Ok(id) => Ok(id),
            Err(first) => {
                tracing::warn!("query log append failed, retrying once: {}", first);
                Self::append(pool, log, parts)
                    .await
                    .map_err(|err| AppError::DatabaseError(err.to_string()))
            }
        }
    }

    /// Fetch one log with its ordered parts.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<QueryLogDetail>, sqlx::Error> {
        let mut builder = QueryBuilder::new(SELECT_WITH_FLAGS);
        builder.push(" WHERE q.id = ").push_bind(id);

        let Some(log) = builder
            .build_query_as::<QueryLog>()
            .fetch_optional(pool)
            .await?
        else {
            return Ok(None);
        };

        let parts = sqlx::query_as::<_, QueryLogPart>(
            r#"
            SELECT id, created_at, stage, model_id, agent_name, blocked, result
            FROM query_log_parts
            WHERE query_log_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(Some(QueryLogDetail { log, parts }))
    }

    /// Fetch just the user message, for curation shortcuts.
    pub async fn find_message(pool: &PgPool, id: i64) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_message FROM query_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List logs matching the filter, newest first.
    pub async fn list(
        pool: &PgPool,
        filter: &QueryLogFilter,
        rejection_message: &str,
    ) -> Result<Vec<QueryLog>, sqlx::Error> {
        let mut builder = QueryBuilder::new(SELECT_WITH_FLAGS);
        push_filter_clauses(&mut builder, filter, rejection_message);
        builder.push(" ORDER BY q.created_at DESC, q.id DESC");

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }
        if filter.offset > 0 {
            builder.push(" OFFSET ").push_bind(filter.offset);
        }

        builder.build_query_as::<QueryLog>().fetch_all(pool).await
    }

    /// One keyset page for the CSV export, newest first.
    ///
    /// `after` is the `(created_at, id)` cursor of the last row already
    /// emitted; pages never require the full result set in memory.
    pub async fn export_page(
        pool: &PgPool,
        filter: &QueryLogFilter,
        rejection_message: &str,
        after: Option<(DateTime<Utc>, i64)>,
        page_size: i64,
    ) -> Result<Vec<QueryLog>, sqlx::Error> {
        let mut builder = QueryBuilder::new(SELECT_WITH_FLAGS);
        push_filter_clauses(&mut builder, filter, rejection_message);

        if let Some((created_at, id)) = after {
            builder
                .push(" AND (q.created_at, q.id) < (")
                .push_bind(created_at)
                .push(", ")
                .push_bind(id)
                .push(")");
        }

        builder
            .push(" ORDER BY q.created_at DESC, q.id DESC LIMIT ")
            .push_bind(page_size);

        builder.build_query_as::<QueryLog>().fetch_all(pool).await
    }

    /// Ordered parts for a batch of logs, keyed by parent id.
    pub async fn parts_for(
        pool: &PgPool,
        log_ids: &[i64],
    ) -> Result<Vec<(i64, QueryLogPart)>, sqlx::Error> {
        if log_ids.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(FromRow)]
        struct PartRow {
            query_log_id: i64,
            id: i64,
            created_at: DateTime<Utc>,
            stage: String,
            model_id: Option<String>,
            agent_name: Option<String>,
            blocked: Option<bool>,
            result: serde_json::Value,
        }

        let rows = sqlx::query_as::<_, PartRow>(
            r#"
            SELECT query_log_id, id, created_at, stage, model_id, agent_name, blocked, result
            FROM query_log_parts
            WHERE query_log_id = ANY($1)
            ORDER BY query_log_id, created_at ASC, id ASC
            "#,
        )
        .bind(log_ids)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.query_log_id,
                    QueryLogPart {
                        id: r.id,
                        created_at: r.created_at,
                        stage: r.stage,
                        model_id: r.model_id,
                        agent_name: r.agent_name,
                        blocked: r.blocked,
                        result: r.result,
                    },
                )
            })
            .collect())
    }
}
