//! Decision orchestrator
//!
//! One request in, one decision out:
//! ROUTE → POLICY → DISPATCH → AUDIT
//!
//! Every call, accepted or not, appends exactly one decision record before
//! the response is returned. Policy and planning run before any side effect.

mod execute;

pub use execute::{decode_call_data, ExecutionReport};

use crate::advisor::RiskAdvisor;
use crate::audit::{DecisionLog, InMemoryDecisionLog};
use crate::config::{PolicyMode, Settings};
use crate::error::OrchestrationError;
use crate::ingest::{source_from_settings, IngestionSource};
use crate::models::{
    AdvisorOutput, DecisionRecord, DecisionRequest, DecisionResponse, DecisionStatus, RiskProfile,
    Route, TradeIntent,
};
use crate::narrative::{narrator_from_settings, NarrativeGenerator, NarrativeRequest};
use crate::planner::ExecutionPlanner;
use crate::policy::{PolicyEngine, PolicyVerdict};
use crate::state::{
    EventStore, InMemoryEventStore, InMemoryTradeHistory, PgStore, TradeHistoryStore,
};
use crate::submit::{ChainSubmitter, Submitter};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const READ_ONLY: &str = "read-only";
pub const UNKNOWN_ROUTE: &str = "unknown-route";
pub const MISSING_PROFILE: &str = "missing-profile";
pub const MISSING_TRADE: &str = "missing-trade";
pub const MISSING_ADDRESS: &str = "missing-address";
pub const INGEST_PROVIDER_MISSING: &str = "ingest-provider-missing";
pub const DEFAULT_OBJECTIVE: &str = "balanced";

/// External collaborators, injected so tests can swap any of them.
pub struct Collaborators {
    pub events: Arc<dyn EventStore>,
    pub history: Arc<dyn TradeHistoryStore>,
    pub decisions: Arc<dyn DecisionLog>,
    /// `None` when the configured provider has no credentials.
    pub ingestion: Option<Arc<dyn IngestionSource>>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    pub submitter: Arc<dyn Submitter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub stored: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceReport {
    #[serde(flatten)]
    pub advice: AdvisorOutput,
    pub llm_recommendation: Option<String>,
    pub llm_rationale: Option<String>,
}

/// Terminal outcome of one call, before it is recorded.
struct Outcome {
    status: DecisionStatus,
    reason: String,
    detail: String,
    data: Value,
}

impl Outcome {
    fn rejected(reason: &str) -> Self {
        Self {
            status: DecisionStatus::Rejected,
            reason: reason.to_string(),
            detail: reason.to_string(),
            data: Value::Null,
        }
    }

    fn accepted<T: Serialize>(reason: &str, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                status: DecisionStatus::Accepted,
                reason: reason.to_string(),
                detail: reason.to_string(),
                data,
            },
            Err(e) => Self::from_error(e.into()),
        }
    }

    /// Malformed input is a rejection; anything else is a collaborator failure.
    fn from_error(err: OrchestrationError) -> Self {
        let status = match err {
            OrchestrationError::InvalidInput(_) => DecisionStatus::Rejected,
            _ => DecisionStatus::Failed,
        };
        Self {
            status,
            reason: err.code().to_string(),
            detail: err.to_string(),
            data: Value::Null,
        }
    }
}

pub struct DecisionOrchestrator {
    policy: PolicyEngine,
    planner: ExecutionPlanner,
    advisor: RiskAdvisor,
    mode: PolicyMode,
    max_gas: u64,
    max_slippage_bps: u32,
    execute_live: bool,
    timeout: Duration,
    events: Arc<dyn EventStore>,
    history: Arc<dyn TradeHistoryStore>,
    decisions: Arc<dyn DecisionLog>,
    ingestion: Option<Arc<dyn IngestionSource>>,
    narrator: Arc<dyn NarrativeGenerator>,
    submitter: Arc<dyn Submitter>,
}

impl DecisionOrchestrator {
    pub fn new(settings: &Settings, collaborators: Collaborators) -> Self {
        Self {
            policy: PolicyEngine::from_settings(&settings.policy),
            planner: ExecutionPlanner::new(),
            advisor: RiskAdvisor::new(collaborators.events.clone(), collaborators.history.clone()),
            mode: settings.policy.mode,
            max_gas: settings.policy.max_gas,
            max_slippage_bps: settings.policy.max_slippage_bps,
            execute_live: settings.execution.execute_live,
            timeout: settings.collaborator_timeout,
            events: collaborators.events,
            history: collaborators.history,
            decisions: collaborators.decisions,
            ingestion: collaborators.ingestion,
            narrator: collaborators.narrator,
            submitter: collaborators.submitter,
        }
    }

    /// Wire up stores and providers from configuration.
    ///
    /// Postgres is used when `DATABASE_URL` is set, in-memory stores otherwise.
    /// A data provider without credentials leaves ingestion disabled rather
    /// than failing startup.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = settings.collaborator_timeout;

        let events: Arc<dyn EventStore>;
        let history: Arc<dyn TradeHistoryStore>;
        let decisions: Arc<dyn DecisionLog>;
        match settings.database_url.as_deref() {
            Some(url) => {
                let store = Arc::new(PgStore::connect_lazy(url)?);
                events = store.clone();
                history = store.clone();
                decisions = store;
            }
            None => {
                info!("Storage backend: in-memory");
                events = Arc::new(InMemoryEventStore::new());
                history = Arc::new(InMemoryTradeHistory::new());
                decisions = Arc::new(InMemoryDecisionLog::new());
            }
        }

        let ingestion = match source_from_settings(&settings.data, timeout) {
            Ok(source) => {
                info!(source = source.name(), "Ingestion source ready");
                Some(source)
            }
            Err(OrchestrationError::ProviderUnavailable(reason)) => {
                warn!(%reason, "Ingestion source unavailable");
                None
            }
            Err(e) => return Err(e),
        };

        let collaborators = Collaborators {
            events,
            history,
            decisions,
            ingestion,
            narrator: narrator_from_settings(&settings.narrative, timeout)?,
            submitter: Arc::new(ChainSubmitter::new(&settings.execution, timeout)),
        };

        Ok(Self::new(settings, collaborators))
    }

    pub fn advisor(&self) -> &RiskAdvisor {
        &self.advisor
    }

    pub fn planner(&self) -> &ExecutionPlanner {
        &self.planner
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn events(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    pub fn history(&self) -> &dyn TradeHistoryStore {
        self.history.as_ref()
    }

    pub fn decisions(&self) -> &dyn DecisionLog {
        self.decisions.as_ref()
    }

    /// Decide, record, respond.
    ///
    /// Errors only when the decision record itself cannot be written.
    pub async fn route(&self, request: DecisionRequest) -> Result<DecisionResponse> {
        let outcome = self.decide(&request).await;

        let payload = serde_json::to_string(&request).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to serialize decision payload");
            String::from("{}")
        });
        let record = DecisionRecord::new(&request.route, outcome.status, &outcome.reason, payload);
        bounded(self.timeout, "decision log", self.decisions.append(record)).await?;

        info!(
            route = %request.route,
            status = %outcome.status,
            reason = %outcome.reason,
            "Decision recorded"
        );

        Ok(DecisionResponse {
            status: outcome.status,
            detail: outcome.detail,
            data: outcome.data,
        })
    }

    async fn decide(&self, request: &DecisionRequest) -> Outcome {
        let route = Route::parse(&request.route);

        // Read-only short-circuits before anything else is consulted.
        if route == Some(Route::Execute) && self.mode == PolicyMode::ReadOnly {
            return Outcome::rejected(READ_ONLY);
        }

        let verdict = self.check_policy(request.profile.as_ref(), request.trade.as_ref());
        if !verdict.allowed {
            return Outcome::rejected(verdict.reason_code());
        }

        match route {
            Some(Route::Ingest) => self.decide_ingest(request).await,
            Some(Route::Advise) => self.decide_advise(request).await,
            Some(Route::Execute) => self.decide_execute(request.trade.as_ref()).await,
            None => Outcome::rejected(UNKNOWN_ROUTE),
        }
    }

    /// Trade first, then profile.
    fn check_policy(&self, profile: Option<&RiskProfile>, trade: Option<&TradeIntent>) -> PolicyVerdict {
        if let Some(trade) = trade {
            let verdict = self.policy.validate_trade(&trade.asset, &trade.action, trade.size);
            if !verdict.allowed {
                return verdict;
            }
        }
        if let Some(profile) = profile {
            let verdict = self.policy.validate_profile(profile);
            if !verdict.allowed {
                return verdict;
            }
        }
        PolicyVerdict::allow()
    }

    async fn decide_ingest(&self, request: &DecisionRequest) -> Outcome {
        let Some(source) = self.ingestion.as_ref() else {
            return Outcome::rejected(INGEST_PROVIDER_MISSING);
        };
        let address = request
            .payload
            .get("address")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty());
        let Some(address) = address else {
            return Outcome::rejected(MISSING_ADDRESS);
        };

        match self.ingest(source.as_ref(), address).await {
            Ok(report) => Outcome::accepted("ingested", &report),
            Err(e) => Outcome::from_error(e),
        }
    }

    async fn decide_advise(&self, request: &DecisionRequest) -> Outcome {
        let Some(profile) = request.profile.as_ref() else {
            return Outcome::rejected(MISSING_PROFILE);
        };
        if let Err(e) = profile.validate() {
            return Outcome::from_error(e);
        }
        let objective = request
            .payload
            .get("objective")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_OBJECTIVE);

        match self.advise(profile, objective, request.user_id.as_deref()).await {
            Ok(report) => Outcome::accepted("advised", &report),
            Err(e) => Outcome::from_error(e),
        }
    }

    async fn decide_execute(&self, trade: Option<&TradeIntent>) -> Outcome {
        let Some(trade) = trade else {
            return Outcome::rejected(MISSING_TRADE);
        };

        let report = match self.execute(trade).await {
            Ok(report) => report,
            Err(e) => return Outcome::from_error(e),
        };
        let data = match serde_json::to_value(&report) {
            Ok(data) => data,
            Err(e) => return Outcome::from_error(e.into()),
        };

        match report.reason {
            Some(reason) => Outcome {
                status: DecisionStatus::Rejected,
                detail: reason.clone(),
                reason,
                data,
            },
            None => Outcome {
                status: report.status,
                reason: "executed".to_string(),
                detail: "executed".to_string(),
                data,
            },
        }
    }

    async fn ingest(&self, source: &dyn IngestionSource, address: &str) -> Result<IngestReport> {
        let events = bounded(self.timeout, source.name(), source.fetch_wallet_activity(address)).await?;

        let mut stored = Vec::with_capacity(events.len());
        for event in events {
            if event.tx_hash.trim().is_empty() {
                continue;
            }
            let saved = bounded(self.timeout, "event store", self.events.store_event(event)).await?;
            stored.push(saved.tx_hash);
        }

        info!(address = %address, count = stored.len(), "Ingested wallet activity");
        Ok(IngestReport {
            count: stored.len(),
            stored,
        })
    }

    async fn advise(
        &self,
        profile: &RiskProfile,
        objective: &str,
        user_id: Option<&str>,
    ) -> Result<AdviceReport> {
        let advice = bounded(
            self.timeout,
            "advisor",
            self.advisor.recommend(profile, objective, user_id),
        )
        .await?;

        let narrative_request = NarrativeRequest {
            profile: *profile,
            objective: objective.to_string(),
            signals: advice.signals.clone(),
            risk_score: advice.risk_score,
            allocation: advice.allocation,
            user_context: advice
                .personalization
                .as_ref()
                .and_then(|p| p.summary.clone()),
        };

        // Best-effort: the advice stands without the narrative.
        let (llm_recommendation, llm_rationale) = match bounded(
            self.timeout,
            self.narrator.name(),
            self.narrator.recommend(&narrative_request),
        )
        .await
        {
            Ok(narrative) => (Some(narrative.recommendation), Some(narrative.rationale)),
            Err(e) => {
                warn!(narrator = self.narrator.name(), error = %e, "Narrative generation failed");
                (None, None)
            }
        };

        Ok(AdviceReport {
            advice,
            llm_recommendation,
            llm_rationale,
        })
    }
}

/// Apply the caller-imposed collaborator timeout.
pub(crate) async fn bounded<T, F>(timeout: Duration, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, call).await.map_err(|_| {
        OrchestrationError::ProviderUnavailable(format!("{} timed out after {:?}", what, timeout))
    })?
}
