//! Curation store: blacklist/whitelist training examples
//!
//! Two named sets of query strings consumed by the validator stages. Saves
//! replace a set wholesale; per-log toggles are idempotent.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

/// Which example set a query string belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleKind {
    Blacklist,
    Whitelist,
}

impl ExampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExampleKind::Blacklist => "blacklist",
            ExampleKind::Whitelist => "whitelist",
        }
    }
}

/// Both curation sets, as loaded by the pipeline and the admin UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingExamples {
    #[serde(default)]
    pub blacklist_queries: Vec<String>,
    #[serde(default)]
    pub whitelist_queries: Vec<String>,
}

/// Trim, drop empties, de-duplicate exact matches, sort ascending.
pub fn normalize_examples(queries: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = queries
        .iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

impl TrainingExamples {
    /// Load both sets, each sorted ascending.
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT kind, query_text
            FROM query_examples
            WHERE kind IN ('blacklist', 'whitelist')
            ORDER BY kind ASC, query_text ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut examples = TrainingExamples::default();
        for (kind, text) in rows {
            if text.trim().is_empty() {
                continue;
            }
            match kind.as_str() {
                "blacklist" => examples.blacklist_queries.push(text),
                "whitelist" => examples.whitelist_queries.push(text),
                _ => {}
            }
        }
        Ok(examples)
    }

    /// Replace both sets wholesale inside one transaction.
    ///
    /// Saving the same payload twice persists the same state; duplicates in
    /// the payload collapse to one row.
    pub async fn save(pool: &PgPool, payload: &TrainingExamples) -> AppResult<Self> {
        let blacklist = normalize_examples(&payload.blacklist_queries);
        let whitelist = normalize_examples(&payload.whitelist_queries);

        let mut tx = pool.begin().await.map_err(AppError::from)?;

        sqlx::query("DELETE FROM query_examples WHERE kind IN ('blacklist', 'whitelist')")
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        for text in &blacklist {
            sqlx::query("INSERT INTO query_examples (kind, query_text) VALUES ('blacklist', $1)")
                .bind(text)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from)?;
        }
        for text in &whitelist {
            sqlx::query("INSERT INTO query_examples (kind, query_text) VALUES ('whitelist', $1)")
                .bind(text)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from)?;
        }

        tx.commit().await.map_err(AppError::from)?;

        Ok(TrainingExamples {
            blacklist_queries: blacklist,
            whitelist_queries: whitelist,
        })
    }

    /// Add one query string to a set. Idempotent.
    pub async fn add(
        pool: &PgPool,
        kind: ExampleKind,
        query_text: &str,
        source_log_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO query_examples (kind, query_text, source_log_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (kind, query_text) DO NOTHING
            "#,
        )
        .bind(kind.as_str())
        .bind(query_text)
        .bind(source_log_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove one query string from a set. Returns whether a row existed.
    pub async fn remove(
        pool: &PgPool,
        kind: ExampleKind,
        query_text: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM query_examples WHERE kind = $1 AND query_text = $2")
            .bind(kind.as_str())
            .bind(query_text)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
