//! Guardrail pipeline
//!
//! Every incoming query runs through the configured validator agents before
//! the answer agent. All validators always run, even after one blocks, so
//! the dashboard can distinguish "blocked by both" from a single veto; the
//! first blocking stage (in configured order) becomes `blocked_by`. The full
//! per-stage record is appended to the log store in one transaction after
//! the run completes.

pub mod openai;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::agent::{self, Agent};
use crate::models::example::TrainingExamples;
use crate::models::message::AppMessage;
use crate::models::query_log::{NewLogPart, NewQueryLog, QueryLog, QueryStatus};

/// Response body when the pipeline itself fails; internals go to the log.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Something went wrong while answering your question. Please try again in a moment.";

/// Failure of a single stage invocation.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("model request failed: {0}")]
    Network(String),
    #[error("model returned an unusable response: {0}")]
    BadResponse(String),
}

/// Structured verdict produced by a validator stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_legitimate_query: bool,
    #[serde(default)]
    pub reasoning: String,
}

/// Seam to the model provider; the pipeline assembles prompts, the client
/// only executes them.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn validate(
        &self,
        model_id: &str,
        system_prompt: &str,
        query: &str,
    ) -> Result<ValidationVerdict, StageError>;

    async fn answer(
        &self,
        model_id: &str,
        system_prompt: &str,
        query: &str,
    ) -> Result<String, StageError>;
}

/// Configuration snapshot for one pipeline run.
///
/// Loaded fresh per query and passed in, so runs are testable with fixed
/// snapshots and an admin edit is picked up by the next evaluation.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub pre_hooks: Vec<Agent>,
    pub answer_agent: Agent,
    pub examples: TrainingExamples,
    pub rejection_message: String,
    pub current_date: String,
}

impl PipelineContext {
    pub async fn load(pool: &PgPool, reference_tz: chrono_tz::Tz) -> AppResult<Self> {
        let agents = Agent::list_active(pool).await.map_err(AppError::from)?;

        let mut pre_hooks = Vec::new();
        let mut answer_agent = None;
        for a in agents {
            if a.row.agent_key == agent::RUNTIME_RAG {
                answer_agent = Some(a);
            } else if a.row.agent_key.starts_with("validation_") {
                pre_hooks.push(a);
            }
        }
        // list_active orders by agent_key, so validation_blacklist precedes
        // validation_primary.
        let answer_agent = answer_agent.ok_or_else(|| {
            AppError::InternalError("No active answer agent configured".to_string())
        })?;

        let examples = TrainingExamples::load(pool).await.map_err(AppError::from)?;
        let rejection_message = AppMessage::standard_rejection(pool)
            .await
            .map_err(AppError::from)?;
        let current_date = chrono::Utc::now()
            .with_timezone(&reference_tz)
            .format("%b %d, %Y")
            .to_string();

        Ok(Self {
            pre_hooks,
            answer_agent,
            examples,
            rejection_message,
            current_date,
        })
    }
}

/// Everything a completed run produces: the log record to append and the
/// text the chatbot caller should receive.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub log: NewQueryLog,
    pub parts: Vec<NewLogPart>,
    pub response_text: String,
}

/// Concatenate an agent's configured prompt, substituting the placeholders
/// its description template may carry and appending the curated examples.
pub fn assemble_validator_prompt(agent: &Agent, ctx: &PipelineContext) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(template) = &agent.row.description_template {
        sections.push(
            template
                .replace("{current_date}", &ctx.current_date)
                .replace("{standard_rejection_message}", &ctx.rejection_message),
        );
    }
    for inst in &agent.instructions {
        sections.push(inst.content.clone());
    }
    for example in &ctx.examples.blacklist_queries {
        sections.push(format!("BLACKLISTED_QUERY_EXAMPLE: {example}"));
    }
    for example in &ctx.examples.whitelist_queries {
        sections.push(format!("WHITELISTED_QUERY_EXAMPLE: {example}"));
    }

    sections.join("\n")
}

/// System prompt for the answer agent.
pub fn assemble_answer_prompt(agent: &Agent, ctx: &PipelineContext) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(template) = &agent.row.description_template {
        sections.push(
            template
                .replace("{current_date}", &ctx.current_date)
                .replace("{standard_rejection_message}", &ctx.rejection_message),
        );
    }
    for inst in &agent.instructions {
        sections.push(inst.content.clone());
    }

    sections.join("\n")
}

/// Evaluate one query through every configured stage.
///
/// Validators run concurrently; the answer stage only runs when none of them
/// blocked and none of them failed. The returned outcome is complete before
/// anything is persisted.
pub async fn run(
    ctx: &PipelineContext,
    model: &dyn ModelClient,
    user_message: &str,
) -> PipelineOutcome {
    let mut parts: Vec<NewLogPart> = Vec::new();

    let validations = join_all(ctx.pre_hooks.iter().map(|agent| {
        let prompt = assemble_validator_prompt(agent, ctx);
        async move {
            model
                .validate(&agent.row.model_id, &prompt, user_message)
                .await
        }
    }))
    .await;

    let mut blocked_by: Option<String> = None;
    let mut stage_failure: Option<String> = None;

    for (agent, result) in ctx.pre_hooks.iter().zip(validations) {
        match result {
            Ok(verdict) => {
                let blocked = !verdict.is_legitimate_query;
                parts.push(NewLogPart {
                    stage: agent.row.agent_key.clone(),
                    model_id: Some(agent.row.model_id.clone()),
                    agent_name: Some(agent.row.name.clone()),
                    blocked: Some(blocked),
                    result: json!({
                        "is_legitimate_query": verdict.is_legitimate_query,
                        "reasoning": verdict.reasoning,
                    }),
                });
                if blocked && blocked_by.is_none() {
                    blocked_by = Some(agent.row.agent_key.clone());
                }
            }
            Err(err) => {
                tracing::error!("validator {} failed: {}", agent.row.agent_key, err);
                if stage_failure.is_none() {
                    stage_failure = Some(format!("{}: {}", agent.row.agent_key, err));
                }
            }
        }
    }

    if let Some(error_message) = stage_failure {
        return PipelineOutcome {
            log: NewQueryLog {
                user_message: user_message.to_string(),
                final_answer: None,
                status: QueryStatus::Error,
                blocked_by,
                error_message: Some(error_message),
            },
            parts,
            response_text: GENERIC_FAILURE_MESSAGE.to_string(),
        };
    }

    if let Some(blocked_by) = blocked_by {
        return PipelineOutcome {
            log: NewQueryLog {
                user_message: user_message.to_string(),
                final_answer: Some(ctx.rejection_message.clone()),
                status: QueryStatus::Blocked,
                blocked_by: Some(blocked_by),
                error_message: None,
            },
            parts,
            response_text: ctx.rejection_message.clone(),
        };
    }

    let answer_prompt = assemble_answer_prompt(&ctx.answer_agent, ctx);
    match model
        .answer(&ctx.answer_agent.row.model_id, &answer_prompt, user_message)
        .await
    {
        Ok(content) => {
            parts.push(NewLogPart {
                stage: ctx.answer_agent.row.agent_key.clone(),
                model_id: Some(ctx.answer_agent.row.model_id.clone()),
                agent_name: Some(ctx.answer_agent.row.name.clone()),
                blocked: Some(false),
                result: json!({ "content": content }),
            });
            // A rejection-verbatim answer still counts as answered; the
            // metrics layer breaks it out as no_answer_after_pass.
            PipelineOutcome {
                log: NewQueryLog {
                    user_message: user_message.to_string(),
                    final_answer: Some(content.clone()),
                    status: QueryStatus::Answered,
                    blocked_by: None,
                    error_message: None,
                },
                parts,
                response_text: content,
            }
        }
        Err(err) => {
            tracing::error!("answer stage failed: {}", err);
            PipelineOutcome {
                log: NewQueryLog {
                    user_message: user_message.to_string(),
                    final_answer: None,
                    status: QueryStatus::Error,
                    blocked_by: None,
                    error_message: Some(format!("{}: {}", ctx.answer_agent.row.agent_key, err)),
                },
                parts,
                response_text: GENERIC_FAILURE_MESSAGE.to_string(),
            }
        }
    }
}

/// Append the completed run to the log store. Exactly one atomic write per
/// query; transient failures are retried once by the store.
pub async fn persist(pool: &PgPool, outcome: &PipelineOutcome) -> AppResult<i64> {
    QueryLog::append_with_retry(pool, &outcome.log, &outcome.parts).await
}
