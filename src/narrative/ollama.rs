//! Ollama narrator
//!
//! Prefers `/api/chat`; older servers without it answer 404 and get
//! `/api/generate` instead. Transport failures fall back to heuristic text.

use super::{build_prompt, heuristic, Narrative, NarrativeGenerator, NarrativeRequest, LLM_RATIONALE};
use crate::error::OrchestrationError;
use crate::http::pooled_client;
use crate::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub struct OllamaNarrator {
    client: Client,
    base_url: String,
    model: String,
}

/// Either endpoint's reply; chat fills `message`, generate fills `response`.
#[derive(Debug, Default, Deserialize)]
struct OllamaReply {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl OllamaReply {
    fn text(self) -> String {
        match self.message {
            Some(message) => message.content.trim().to_string(),
            None => self.response.unwrap_or_default().trim().to_string(),
        }
    }
}

impl OllamaNarrator {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: pooled_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn call(&self, prompt: &str) -> std::result::Result<OllamaReply, reqwest::Error> {
        let chat = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        let mut response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&chat)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Ollama /api/chat unavailable, using /api/generate");
            let generate = json!({ "model": self.model, "prompt": prompt, "stream": false });
            response = self
                .client
                .post(format!("{}/api/generate", self.base_url))
                .json(&generate)
                .send()
                .await?;
        }

        response.error_for_status()?.json::<OllamaReply>().await
    }
}

#[async_trait::async_trait]
impl NarrativeGenerator for OllamaNarrator {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn recommend(&self, request: &NarrativeRequest) -> Result<Narrative> {
        match self.call(&build_prompt(request)).await {
            Ok(reply) => Ok(Narrative {
                recommendation: reply.text(),
                rationale: LLM_RATIONALE.to_string(),
            }),
            Err(e) if e.is_decode() => Err(OrchestrationError::NarrativeError(format!(
                "ollama parse error: {}",
                e
            ))),
            Err(e) => {
                warn!(error = %e, "Ollama unavailable, using heuristic fallback");
                Ok(heuristic("Heuristic fallback", &request.signals))
            }
        }
    }
}
