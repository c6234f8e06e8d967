//! Readiness scorecard
//!
//! Rates each subsystem 0-10 from what is stored and how the process is
//! configured. Informational only; nothing in the decision path reads it.

use crate::advisor::signals::round2;
use crate::config::{NarrativeProvider, PolicyMode, Settings};
use crate::state::{EventStats, EventStore, TradeHistoryCounts, TradeHistoryStore};
use crate::Result;
use serde::{Deserialize, Serialize};

const BASE_SCORE: f64 = 5.0;
const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCategory {
    pub score: f64,
    pub confidence: f64,
    pub notes: Vec<String>,
}

impl ScoreCategory {
    fn new(score: f64, confidence: f64, notes: Vec<String>) -> Self {
        Self {
            score: round2(score.min(MAX_SCORE)),
            confidence: round2(confidence),
            notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub data: ScoreCategory,
    pub advisor: ScoreCategory,
    pub execution: ScoreCategory,
    pub overall_score: f64,
    pub overall_confidence: f64,
}

impl Scorecard {
    pub fn evaluate(settings: &Settings, events: EventStats, history: TradeHistoryCounts) -> Self {
        let data = data_category(events);
        let advisor = advisor_category(settings, events, history);
        let execution = execution_category(settings);

        let overall_score = round2((data.score + advisor.score + execution.score) / 3.0);
        let overall_confidence =
            round2((data.confidence + advisor.confidence + execution.confidence) / 3.0);

        Self {
            data,
            advisor,
            execution,
            overall_score,
            overall_confidence,
        }
    }

    /// Read current counts from the stores and evaluate.
    pub async fn collect(
        settings: &Settings,
        events: &dyn EventStore,
        history: &dyn TradeHistoryStore,
    ) -> Result<Self> {
        let event_stats = events.stats().await?;
        let counts = history.counts().await?;
        Ok(Self::evaluate(settings, event_stats, counts))
    }
}

fn data_category(stats: EventStats) -> ScoreCategory {
    let mut score = BASE_SCORE;
    let mut notes = Vec::new();

    if stats.total > 0 {
        score += 2.0;
    } else {
        notes.push("No on-chain events ingested yet.".to_string());
    }
    if stats.tagged > 0 {
        score += 1.0;
    } else {
        notes.push("Tag extraction needs real transactions for richer insights.".to_string());
    }
    // Every configurable data provider is a supported one.
    score += 1.0;
    if stats.structured > 0 {
        score += 1.0;
    }

    let confidence = if stats.total > 0 {
        (stats.total as f64 / 60.0).min(1.0)
    } else {
        0.2
    };
    ScoreCategory::new(score, confidence, notes)
}

fn advisor_category(
    settings: &Settings,
    stats: EventStats,
    history: TradeHistoryCounts,
) -> ScoreCategory {
    let mut score = BASE_SCORE;
    let mut notes = Vec::new();

    if stats.total >= 20 {
        score += 2.0;
    } else {
        notes.push("Advisor confidence improves with more historical events.".to_string());
    }
    if history.trades > 0 || history.holdings > 0 {
        score += 1.0;
    } else {
        notes.push("Add user trade history/holdings to enable personalization.".to_string());
    }
    if settings.narrative.provider != NarrativeProvider::None {
        score += 2.0;
    } else {
        notes.push("Enable LLM_PROVIDER for richer strategy rationale.".to_string());
    }
    score += 1.0;

    let confidence = if stats.total > 0 {
        (stats.total as f64 / 50.0).min(1.0)
    } else {
        0.3
    };
    ScoreCategory::new(score, confidence, notes)
}

fn execution_category(settings: &Settings) -> ScoreCategory {
    let mut score = BASE_SCORE;
    let mut notes = Vec::new();

    match settings.policy.mode {
        PolicyMode::ReadOnly => {
            notes.push("Execution policy is read_only; live execution disabled.".to_string())
        }
        PolicyMode::PaperTrade => {
            notes.push("Execution policy is paper_trade; live execution disabled.".to_string())
        }
        PolicyMode::ExecuteEnabled => {}
    }

    let has_rpc = settings.execution.rpc_url.is_some();
    if has_rpc {
        score += 2.0;
    } else {
        notes.push("Set RPC_URL to validate execution path against BNB Chain.".to_string());
    }
    if settings.execution.execute_live {
        score += 1.0;
    } else {
        notes.push("Execution currently runs in dry-run mode.".to_string());
    }
    // Limits are validated positive at startup.
    score += 2.0;
    if !settings.policy.allowed_assets.is_empty() && !settings.policy.allowed_actions.is_empty() {
        score += 1.0;
    }

    let confidence = if has_rpc { 0.6 } else { 0.4 };
    ScoreCategory::new(score, confidence, notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let owned: Vec<(String, String)> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| {
            owned.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn test_fresh_install() {
        let card = Scorecard::evaluate(&settings(&[]), EventStats::default(), TradeHistoryCounts::default());

        assert_eq!(card.data.score, 6.0);
        assert_eq!(card.data.confidence, 0.2);
        assert_eq!(card.advisor.score, 6.0);
        assert_eq!(card.advisor.notes.len(), 3);
        assert_eq!(card.execution.score, 8.0);
        assert_eq!(card.execution.confidence, 0.4);
        assert_eq!(card.overall_score, 6.67);
        assert_eq!(card.overall_confidence, 0.3);
    }

    #[test]
    fn test_fully_configured() {
        let settings = settings(&[
            ("POLICY_MODE", "execute_enabled"),
            ("RPC_URL", "http://localhost:8545"),
            ("EXECUTE_LIVE", "true"),
            ("LLM_PROVIDER", "ollama"),
        ]);
        let events = EventStats { total: 60, structured: 60, tagged: 60 };
        let history = TradeHistoryCounts { trades: 3, holdings: 1 };
        let card = Scorecard::evaluate(&settings, events, history);

        assert_eq!(card.data.score, 10.0);
        assert_eq!(card.data.confidence, 1.0);
        assert_eq!(card.advisor.score, 10.0);
        assert!(card.advisor.notes.is_empty());
        assert_eq!(card.execution.score, 10.0);
        assert!(card.execution.notes.is_empty());
        assert_eq!(card.overall_score, 10.0);
    }
}
