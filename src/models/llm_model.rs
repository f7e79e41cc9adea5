//! Model catalogue
//!
//! Provider model identifiers the agents can be pointed at.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LlmModel {
    pub id: i32,
    pub model_id: String,
    pub provider: String,
    pub display_name: String,
    pub is_active: bool,
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertLlmModel {
    #[validate(length(min = 1, max = 255))]
    pub model_id: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_true() -> bool {
    true
}

impl LlmModel {
    pub async fn list(pool: &PgPool) -> Result<Vec<LlmModel>, sqlx::Error> {
        sqlx::query_as::<_, LlmModel>(
            r#"
            SELECT id, model_id, provider, display_name, is_active, is_default
            FROM llm_models
            ORDER BY display_name ASC, model_id ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &PgPool, payload: &UpsertLlmModel) -> AppResult<LlmModel> {
        let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM llm_models WHERE model_id = $1")
            .bind(&payload.model_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
        if existing.is_some() {
            return Err(AppError::AlreadyExists(
                "A model with this model_id already exists.".to_string(),
            ));
        }

        sqlx::query_as::<_, LlmModel>(
            r#"
            INSERT INTO llm_models (model_id, provider, display_name, is_active, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, model_id, provider, display_name, is_active, is_default
            "#,
        )
        .bind(&payload.model_id)
        .bind(&payload.provider)
        .bind(&payload.display_name)
        .bind(payload.is_active)
        .bind(payload.is_default)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)
    }

    /// Replace a model entry identified by its current model_id.
    pub async fn update(pool: &PgPool, model_id: &str, payload: &UpsertLlmModel) -> AppResult<LlmModel> {
        sqlx::query_as::<_, LlmModel>(
            r#"
            UPDATE llm_models
            SET model_id = $1, provider = $2, display_name = $3, is_active = $4, is_default = $5
            WHERE model_id = $6
            RETURNING id, model_id, provider, display_name, is_active, is_default
            "#,
        )
        .bind(&payload.model_id)
        .bind(&payload.provider)
        .bind(&payload.display_name)
        .bind(payload.is_active)
        .bind(payload.is_default)
        .bind(model_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("Model not found.".to_string()))
    }

    pub async fn delete(pool: &PgPool, model_id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM llm_models WHERE model_id = $1")
            .bind(model_id)
            .execute(pool)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Model not found.".to_string()));
        }
        Ok(())
    }
}
