//! Application messages model
//!
//! Key/value configuration text. The standard rejection message lives under
//! the `standard_rejection_message` key and has a compiled-in fallback so
//! the pipeline works before any admin edit.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

/// Well-known key for the rejection text.
pub const STANDARD_REJECTION_KEY: &str = "standard_rejection_message";

/// Fallback when no row has been configured yet.
pub const DEFAULT_REJECTION_MESSAGE: &str = "This question falls outside of my knowledge of campus information. Please re-ask your question within a campus context.";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppMessage {
    pub message_key: String,
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageUpdate {
    #[validate(length(min = 1))]
    pub content: String,
}

impl AppMessage {
    pub async fn list(pool: &PgPool) -> Result<Vec<AppMessage>, sqlx::Error> {
        sqlx::query_as::<_, AppMessage>(
            "SELECT message_key, content FROM app_messages ORDER BY message_key ASC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, message_key: &str) -> Result<Option<AppMessage>, sqlx::Error> {
        sqlx::query_as::<_, AppMessage>(
            "SELECT message_key, content FROM app_messages WHERE message_key = $1",
        )
        .bind(message_key)
        .fetch_optional(pool)
        .await
    }

    /// Create or update a message by key.
    pub async fn upsert(
        pool: &PgPool,
        message_key: &str,
        content: &str,
    ) -> Result<AppMessage, sqlx::Error> {
        sqlx::query_as::<_, AppMessage>(
            r#"
            INSERT INTO app_messages (message_key, content)
            VALUES ($1, $2)
            ON CONFLICT (message_key) DO UPDATE SET content = EXCLUDED.content
            RETURNING message_key, content
            "#,
        )
        .bind(message_key)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    /// Current standard rejection text, falling back to the default.
    pub async fn standard_rejection(pool: &PgPool) -> Result<String, sqlx::Error> {
        Ok(Self::find(pool, STANDARD_REJECTION_KEY)
            .await?
            .map(|m| m.content)
            .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string()))
    }
}
