//! OpenAI-compatible chat-completions narrator
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{build_prompt, Narrative, NarrativeGenerator, NarrativeRequest, LLM_RATIONALE};
use crate::config::Secret;
use crate::error::OrchestrationError;
use crate::http::pooled_client;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const TEMPERATURE: f32 = 0.2;

pub struct OpenAiNarrator {
    client: Client,
    api_key: Secret,
    base_url: String,
    model: String,
}

impl OpenAiNarrator {
    pub fn new(api_key: Secret, base_url: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: pooled_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait::async_trait]
impl NarrativeGenerator for OpenAiNarrator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn recommend(&self, request: &NarrativeRequest) -> Result<Narrative> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(request),
            }],
            temperature: TEMPERATURE,
        };

        info!(model = %self.model, "Calling chat completions");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Chat completions request failed: {}", e);
                OrchestrationError::NarrativeError(format!("chat completions error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Chat completions error response: {}", error_text);
            return Err(OrchestrationError::NarrativeError(format!(
                "chat completions returned {}",
                status
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            OrchestrationError::NarrativeError(format!("chat completions parse error: {}", e))
        })?;

        Ok(Narrative {
            recommendation: first_choice(parsed)?,
            rationale: LLM_RATIONALE.to_string(),
        })
    }
}

fn first_choice(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| OrchestrationError::NarrativeError("empty completion".to_string()))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}
