//! OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ModelClient, StageError, ValidationVerdict};
use crate::config::Config;

/// HTTP client for the configured chat-completions provider.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.stage_timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: config.model_api_base.trim_end_matches('/').to_string(),
            api_key: config.model_api_key.clone(),
        }
    }

    async fn chat(
        &self,
        model_id: &str,
        system_prompt: &str,
        user_content: &str,
        json_mode: bool,
    ) -> Result<String, StageError> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages = vec![
            ChatMessage { role: "system", content: system_prompt },
            ChatMessage { role: "user", content: user_content },
        ];
        let mut body = json!({
            "model": model_id,
            "messages": messages,
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(StageError::Network(format!(
                "provider returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| StageError::BadResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StageError::BadResponse("empty completion".to_string()))
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn validate(
        &self,
        model_id: &str,
        system_prompt: &str,
        query: &str,
    ) -> Result<ValidationVerdict, StageError> {
        let user_content = format!(
            "Is this a legitimate query for the knowledge base? \
             Respond as JSON with is_legitimate_query and reasoning. Query: '{query}'"
        );
        let content = self.chat(model_id, system_prompt, &user_content, true).await?;

        serde_json::from_str(&content)
            .map_err(|e| StageError::BadResponse(format!("invalid verdict payload: {e}")))
    }

    async fn answer(
        &self,
        model_id: &str,
        system_prompt: &str,
        query: &str,
    ) -> Result<String, StageError> {
        self.chat(model_id, system_prompt, query, false).await
    }
}
