//! Agent configuration model
//!
//! Logical agents are keyed by `agent_key`; validators run as pre-hooks of
//! the answer agent. Instructions are ordered rows concatenated into the
//! effective prompt.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Answer-generation agent key.
pub const RUNTIME_RAG: &str = "runtime_rag";
/// General query validator key.
pub const VALIDATION_PRIMARY: &str = "validation_primary";
/// Blacklist validator key.
pub const VALIDATION_BLACKLIST: &str = "validation_blacklist";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentRow {
    pub id: i32,
    pub agent_key: String,
    pub name: String,
    pub description_template: Option<String>,
    pub model_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentInstruction {
    pub id: i32,
    pub position: i32,
    pub content: String,
}

/// Agent plus its ordered instructions, as exposed over the API and consumed
/// by the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    #[serde(flatten)]
    pub row: AgentRow,
    pub instructions: Vec<AgentInstruction>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InstructionPayload {
    pub position: i32,
    #[validate(length(min = 1))]
    pub content: String,
}

/// Create/replace payload; instructions are replaced wholesale.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertAgent {
    #[validate(length(min = 1, max = 64))]
    pub agent_key: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description_template: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub model_id: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub instructions: Vec<InstructionPayload>,
}

fn default_true() -> bool {
    true
}

impl Agent {
    async fn load_instructions(pool: &PgPool, agent_id: i32) -> Result<Vec<AgentInstruction>, sqlx::Error> {
        sqlx::query_as::<_, AgentInstruction>(
            r#"
            SELECT id, position, content
            FROM agent_instructions
            WHERE agent_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(agent_id)
        .fetch_all(pool)
        .await
    }

    /// All active agents with their instructions, ordered by key.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Agent>, sqlx::Error> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, agent_key, name, description_template, model_id, is_active
            FROM llm_agents
            WHERE is_active = true
            ORDER BY agent_key ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let instructions = Self::load_instructions(pool, row.id).await?;
            agents.push(Agent { row, instructions });
        }
        Ok(agents)
    }

    pub async fn find_by_key(pool: &PgPool, agent_key: &str) -> Result<Option<Agent>, sqlx::Error> {
        let Some(row) = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, agent_key, name, description_template, model_id, is_active
            FROM llm_agents
            WHERE agent_key = $1
            "#,
        )
        .bind(agent_key)
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let instructions = Self::load_instructions(pool, row.id).await?;
        Ok(Some(Agent { row, instructions }))
    }

    pub async fn create(pool: &PgPool, payload: &UpsertAgent) -> AppResult<Agent> {
        let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM llm_agents WHERE agent_key = $1")
            .bind(&payload.agent_key)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
        if existing.is_some() {
            return Err(AppError::AlreadyExists(
                "An agent with this agent_key already exists.".to_string(),
            ));
        }

        let mut tx = pool.begin().await.map_err(AppError::from)?;

        let agent_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO llm_agents (agent_key, name, description_template, model_id, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&payload.agent_key)
        .bind(&payload.name)
        .bind(&payload.description_template)
        .bind(&payload.model_id)
        .bind(payload.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        insert_instructions(&mut tx, agent_id, &payload.instructions).await?;
        tx.commit().await.map_err(AppError::from)?;

        Self::find_by_key(pool, &payload.agent_key)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::InternalError("Failed to load created agent".to_string()))
    }

    /// Replace an agent (identified by its current key) and its instructions.
    pub async fn update(pool: &PgPool, agent_key: &str, payload: &UpsertAgent) -> AppResult<Agent> {
        let agent_id: Option<i32> =
            sqlx::query_scalar("SELECT id FROM llm_agents WHERE agent_key = $1")
                .bind(agent_key)
                .fetch_optional(pool)
                .await
                .map_err(AppError::from)?;
        let Some(agent_id) = agent_id else {
            return Err(AppError::NotFound("Agent not found.".to_string()));
        };

        let mut tx = pool.begin().await.map_err(AppError::from)?;

        sqlx::query(
            r#"
            UPDATE llm_agents
            SET agent_key = $1, name = $2, description_template = $3, model_id = $4, is_active = $5
            WHERE id = $6
            "#,
        )
        .bind(&payload.agent_key)
        .bind(&payload.name)
        .bind(&payload.description_template)
        .bind(&payload.model_id)
        .bind(payload.is_active)
        .bind(agent_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        // Instructions are replaced wholesale.
        sqlx::query("DELETE FROM agent_instructions WHERE agent_id = $1")
            .bind(agent_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        insert_instructions(&mut tx, agent_id, &payload.instructions).await?;

        tx.commit().await.map_err(AppError::from)?;

        Self::find_by_key(pool, &payload.agent_key)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::InternalError("Failed to load updated agent".to_string()))
    }

    pub async fn delete(pool: &PgPool, agent_key: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM llm_agents WHERE agent_key = $1")
            .bind(agent_key)
            .execute(pool)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Agent not found.".to_string()));
        }
        Ok(())
    }
}

async fn insert_instructions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    agent_id: i32,
    instructions: &[InstructionPayload],
) -> AppResult<()> {
    for inst in instructions {
        sqlx::query(
            r#"
            INSERT INTO agent_instructions (agent_id, position, content)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(agent_id)
        .bind(inst.position)
        .bind(&inst.content)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;
    }
    Ok(())
}
