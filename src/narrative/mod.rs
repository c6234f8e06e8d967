//! Narrative generation
//!
//! Optional prose on top of the advisor's numbers. Callers treat every
//! failure here as best-effort and carry on without the narrative.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaNarrator;
pub use openai::OpenAiNarrator;

use crate::config::{NarrativeProvider, NarrativeSettings};
use crate::models::{Allocation, RiskProfile};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const CONSERVATIVE_TEXT: &str =
    "Use a conservative, diversified basket with strict stop-loss rules.";
pub const LLM_RATIONALE: &str = "LLM-generated rationale";
const HEURISTIC_SIGNALS: usize = 3;

/// Everything a generator may draw on.
#[derive(Debug, Clone)]
pub struct NarrativeRequest {
    pub profile: RiskProfile,
    pub objective: String,
    pub signals: Vec<String>,
    pub risk_score: f64,
    pub allocation: Allocation,
    pub user_context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub recommendation: String,
    pub rationale: String,
}

#[async_trait::async_trait]
pub trait NarrativeGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recommend(&self, request: &NarrativeRequest) -> Result<Narrative>;
}

/// Fixed conservative text; used when no model is configured.
pub struct HeuristicNarrator;

#[async_trait::async_trait]
impl NarrativeGenerator for HeuristicNarrator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn recommend(&self, request: &NarrativeRequest) -> Result<Narrative> {
        Ok(heuristic("Heuristic mode", &request.signals))
    }
}

pub(crate) fn heuristic(label: &str, signals: &[String]) -> Narrative {
    let shown: Vec<&str> = signals.iter().take(HEURISTIC_SIGNALS).map(String::as_str).collect();
    Narrative {
        recommendation: CONSERVATIVE_TEXT.to_string(),
        rationale: format!("{}; signals: {}.", label, shown.join(", ")),
    }
}

pub(crate) fn build_prompt(request: &NarrativeRequest) -> String {
    let context_line = request
        .user_context
        .as_deref()
        .map(|c| format!("User context: {}.\n", c))
        .unwrap_or_default();

    format!(
        "You are an investment advisor. Return a concise recommendation and rationale.\n\
         Risk tolerance: {}. Horizon: {} days. Max drawdown: {}. Objective: {}.\n\
         {}Signals: {}. Risk score: {}. Allocation hint: {}.",
        request.profile.risk_tolerance,
        request.profile.horizon_days,
        request.profile.max_drawdown,
        request.objective,
        context_line,
        request.signals.join(", "),
        request.risk_score,
        request.allocation,
    )
}

/// `openai` without an API key degrades to the heuristic narrator.
pub fn narrator_from_settings(
    settings: &NarrativeSettings,
    timeout: Duration,
) -> Result<Arc<dyn NarrativeGenerator>> {
    let narrator: Arc<dyn NarrativeGenerator> = match (settings.provider, &settings.api_key) {
        (NarrativeProvider::OpenAi, Some(key)) => Arc::new(OpenAiNarrator::new(
            key.clone(),
            settings.api_base.clone(),
            settings.model.clone(),
            timeout,
        )?),
        (NarrativeProvider::Ollama, _) => Arc::new(OllamaNarrator::new(
            settings.ollama_base.clone(),
            settings.model.clone(),
            timeout,
        )?),
        _ => Arc::new(HeuristicNarrator),
    };

    info!(narrator = narrator.name(), "Narrative generator selected");
    Ok(narrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn request() -> NarrativeRequest {
        NarrativeRequest {
            profile: RiskProfile { risk_tolerance: 0.4, horizon_days: 90, max_drawdown: 0.25 },
            objective: "steady growth".into(),
            signals: vec!["swap:4".into(), "router:3".into(), "cake:2".into(), "lp:1".into()],
            risk_score: 0.55,
            allocation: Allocation { blue_chip: 45, yield_: 20, growth: 25, speculative: 10 },
            user_context: Some("30d trades=4".into()),
        }
    }

    fn settings(provider: NarrativeProvider, api_key: Option<&str>) -> NarrativeSettings {
        NarrativeSettings {
            provider,
            api_key: api_key.map(Secret::new),
            api_base: "http://localhost:1/v1".into(),
            model: "test-model".into(),
            ollama_base: "http://localhost:1".into(),
        }
    }

    #[tokio::test]
    async fn test_heuristic_uses_first_three_signals() {
        let narrative = HeuristicNarrator.recommend(&request()).await.unwrap();
        assert_eq!(narrative.recommendation, CONSERVATIVE_TEXT);
        assert_eq!(narrative.rationale, "Heuristic mode; signals: swap:4, router:3, cake:2.");
    }

    #[test]
    fn test_prompt_includes_context_line() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("Objective: steady growth.\nUser context: 30d trades=4.\nSignals:"));
        assert!(prompt.contains("Allocation hint: blue_chip=45 yield=20 growth=25 speculative=10."));

        let anonymous = NarrativeRequest { user_context: None, ..request() };
        assert!(!build_prompt(&anonymous).contains("User context"));
    }

    #[test]
    fn test_provider_selection() {
        let timeout = Duration::from_secs(1);
        let pick = |p, key| narrator_from_settings(&settings(p, key), timeout).unwrap().name();

        assert_eq!(pick(NarrativeProvider::None, Some("k")), "heuristic");
        assert_eq!(pick(NarrativeProvider::OpenAi, None), "heuristic");
        assert_eq!(pick(NarrativeProvider::OpenAi, Some("k")), "openai");
        assert_eq!(pick(NarrativeProvider::Ollama, None), "ollama");
    }
}
