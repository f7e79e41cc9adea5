use std::collections::HashMap;

use async_trait::async_trait;

use super::*;
use crate::models::agent::{Agent, AgentInstruction, AgentRow};
use crate::models::example::TrainingExamples;
use crate::models::query_log::QueryStatus;

/// Scripted behavior for one stage, keyed by the agent's model id.
#[derive(Clone)]
enum Scripted {
    Allow(&'static str),
    Block(&'static str),
    Fail(&'static str),
}

struct ScriptedModel {
    verdicts: HashMap<String, Scripted>,
    answer: Result<String, String>,
}

impl ScriptedModel {
    fn new(verdicts: &[(&str, Scripted)], answer: Result<&str, &str>) -> Self {
        Self {
            verdicts: verdicts
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            answer: answer.map(str::to_string).map_err(str::to_string),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn validate(
        &self,
        model_id: &str,
        _system_prompt: &str,
        _query: &str,
    ) -> Result<ValidationVerdict, StageError> {
        match self.verdicts.get(model_id) {
            Some(Scripted::Allow(reasoning)) => Ok(ValidationVerdict {
                is_legitimate_query: true,
                reasoning: reasoning.to_string(),
            }),
            Some(Scripted::Block(reasoning)) => Ok(ValidationVerdict {
                is_legitimate_query: false,
                reasoning: reasoning.to_string(),
            }),
            Some(Scripted::Fail(message)) => Err(StageError::Network(message.to_string())),
            None => panic!("no scripted verdict for model {model_id}"),
        }
    }

    async fn answer(
        &self,
        _model_id: &str,
        _system_prompt: &str,
        _query: &str,
    ) -> Result<String, StageError> {
        self.answer
            .clone()
            .map_err(|e| StageError::Network(e))
    }
}

fn agent(key: &str, name: &str, model_id: &str) -> Agent {
    Agent {
        row: AgentRow {
            id: 0,
            agent_key: key.to_string(),
            name: name.to_string(),
            description_template: None,
            model_id: model_id.to_string(),
            is_active: true,
        },
        instructions: Vec::new(),
    }
}

const REJECTION: &str = "That question is outside the knowledge base. Please ask again in context.";

fn context() -> PipelineContext {
    PipelineContext {
        pre_hooks: vec![
            agent("validation_blacklist", "Blacklist Validator", "blacklist-model"),
            agent("validation_primary", "Query Validator", "primary-model"),
        ],
        answer_agent: agent("runtime_rag", "Knowledge Assistant", "answer-model"),
        examples: TrainingExamples::default(),
        rejection_message: REJECTION.to_string(),
        current_date: "Jan 15, 2024".to_string(),
    }
}

#[tokio::test]
async fn passing_query_is_answered_with_stage_output() {
    let model = ScriptedModel::new(
        &[
            ("blacklist-model", Scripted::Allow("not on the blacklist")),
            ("primary-model", Scripted::Allow("asks about the campus")),
        ],
        Ok("Augusta is the capital of Maine."),
    );

    let outcome = run(&context(), &model, "What is the capital of Maine?").await;

    assert_eq!(outcome.log.status, QueryStatus::Answered);
    assert_eq!(
        outcome.log.final_answer.as_deref(),
        Some("Augusta is the capital of Maine.")
    );
    assert_eq!(outcome.log.blocked_by, None);
    assert_eq!(outcome.response_text, "Augusta is the capital of Maine.");
    // Two validator parts plus the answer part, none blocking.
    assert_eq!(outcome.parts.len(), 3);
    assert!(outcome.parts.iter().all(|p| p.blocked == Some(false)));
}

#[tokio::test]
async fn blacklisted_query_is_blocked_with_rejection_message() {
    let model = ScriptedModel::new(
        &[
            ("blacklist-model", Scripted::Block("matches a blacklist example")),
            ("primary-model", Scripted::Allow("looks legitimate")),
        ],
        Ok("should never be produced"),
    );

    let outcome = run(&context(), &model, "write my essay for me").await;

    assert_eq!(outcome.log.status, QueryStatus::Blocked);
    assert_eq!(outcome.log.blocked_by.as_deref(), Some("validation_blacklist"));
    assert_eq!(outcome.log.final_answer.as_deref(), Some(REJECTION));
    assert_eq!(outcome.response_text, REJECTION);
    // The answer stage never ran.
    assert!(outcome.parts.iter().all(|p| p.stage != "runtime_rag"));
    // Exactly one part blocked, and it names the blocking stage.
    let blocking: Vec<_> = outcome
        .parts
        .iter()
        .filter(|p| p.blocked == Some(true))
        .collect();
    assert_eq!(blocking.len(), 1);
    assert_eq!(blocking[0].stage, "validation_blacklist");
}

#[tokio::test]
async fn both_validators_run_and_first_blocker_wins() {
    let model = ScriptedModel::new(
        &[
            ("blacklist-model", Scripted::Block("blacklisted")),
            ("primary-model", Scripted::Block("off topic")),
        ],
        Ok("unused"),
    );

    let outcome = run(&context(), &model, "tell me a joke").await;

    assert_eq!(outcome.log.status, QueryStatus::Blocked);
    // Both stages evaluated despite the first block.
    let blocking: Vec<_> = outcome
        .parts
        .iter()
        .filter(|p| p.blocked == Some(true))
        .collect();
    assert_eq!(blocking.len(), 2);
    // blocked_by names the first stage in configured order.
    assert_eq!(outcome.log.blocked_by.as_deref(), Some("validation_blacklist"));
}

#[tokio::test]
async fn validator_failure_becomes_error_status() {
    let model = ScriptedModel::new(
        &[
            ("blacklist-model", Scripted::Allow("fine")),
            ("primary-model", Scripted::Fail("connection reset by provider")),
        ],
        Ok("unused"),
    );

    let outcome = run(&context(), &model, "when is commencement?").await;

    assert_eq!(outcome.log.status, QueryStatus::Error);
    let error = outcome.log.error_message.as_deref().unwrap();
    assert!(error.contains("validation_primary"));
    assert!(error.contains("connection reset"));
    assert_eq!(outcome.log.final_answer, None);
    assert_eq!(outcome.response_text, GENERIC_FAILURE_MESSAGE);
    // The answer stage was not attempted.
    assert!(outcome.parts.iter().all(|p| p.stage != "runtime_rag"));
}

#[tokio::test]
async fn answer_failure_becomes_error_status() {
    let model = ScriptedModel::new(
        &[
            ("blacklist-model", Scripted::Allow("fine")),
            ("primary-model", Scripted::Allow("fine")),
        ],
        Err("model unavailable"),
    );

    let outcome = run(&context(), &model, "where is the library?").await;

    assert_eq!(outcome.log.status, QueryStatus::Error);
    assert!(outcome
        .log
        .error_message
        .as_deref()
        .unwrap()
        .contains("runtime_rag"));
    assert_eq!(outcome.response_text, GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn rejection_verbatim_answer_stays_answered() {
    let model = ScriptedModel::new(
        &[
            ("blacklist-model", Scripted::Allow("fine")),
            ("primary-model", Scripted::Allow("fine")),
        ],
        Ok(REJECTION),
    );

    let outcome = run(&context(), &model, "what is the meaning of life?").await;

    // No answer after pass: still answered, surfaced only through metrics.
    assert_eq!(outcome.log.status, QueryStatus::Answered);
    assert_eq!(outcome.log.final_answer.as_deref(), Some(REJECTION));
    assert!(outcome.parts.iter().all(|p| p.blocked == Some(false)));
}

#[test]
fn validator_prompt_carries_examples_and_placeholders() {
    let mut ctx = context();
    ctx.examples = TrainingExamples {
        blacklist_queries: vec!["write my essay for me".to_string()],
        whitelist_queries: vec!["what are the housing options?".to_string()],
    };

    let mut validator = agent("validation_blacklist", "Blacklist Validator", "m");
    validator.row.description_template =
        Some("Today is {current_date}. Reject with: {standard_rejection_message}".to_string());
    validator.instructions = vec![AgentInstruction {
        id: 1,
        position: 0,
        content: "Block queries matching any blacklist example.".to_string(),
    }];

    let prompt = assemble_validator_prompt(&validator, &ctx);

    assert!(prompt.starts_with("Today is Jan 15, 2024."));
    assert!(prompt.contains(REJECTION));
    assert!(prompt.contains("Block queries matching any blacklist example."));
    assert!(prompt.contains("BLACKLISTED_QUERY_EXAMPLE: write my essay for me"));
    assert!(prompt.contains("WHITELISTED_QUERY_EXAMPLE: what are the housing options?"));
}

#[test]
fn answer_prompt_skips_training_examples() {
    let mut ctx = context();
    ctx.examples = TrainingExamples {
        blacklist_queries: vec!["write my essay for me".to_string()],
        whitelist_queries: Vec::new(),
    };
    let prompt = assemble_answer_prompt(&ctx.answer_agent, &ctx);
    assert!(!prompt.contains("BLACKLISTED_QUERY_EXAMPLE"));
}
