//! REST API server for the decision router
//!
//! Thin adapter: handlers unpack JSON, call the core and wrap the result.
//! No decision logic lives here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::OrchestrationError;
use crate::models::{
    DecisionRequest, RawEvent, RiskProfile, TradeIntent, UserHoldingIn, UserTradeIn,
};
use crate::orchestrator::DecisionOrchestrator;
use crate::scorecard::Scorecard;
use crate::state::EventStore;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecommendRequest {
    pub profile: RiskProfile,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// One caller-supplied market event. Stored on the default chain.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IngestEventRequest {
    pub tx_hash: String,
    pub payload: String,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub block_number: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<IngestEventRequest> for RawEvent {
    fn from(req: IngestEventRequest) -> Self {
        RawEvent {
            tx_hash: req.tx_hash.trim().to_string(),
            payload: req.payload,
            from_address: req.from_address,
            to_address: req.to_address,
            value: req.value,
            block_number: req.block_number,
            tags: req.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TradesRequest {
    pub trades: Vec<UserTradeIn>,
}

#[derive(Debug, Deserialize)]
pub struct HoldingsRequest {
    pub holdings: Vec<UserHoldingIn>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<DecisionOrchestrator>,
    pub settings: Arc<Settings>,
}

fn status_for(err: &OrchestrationError) -> StatusCode {
    match err {
        OrchestrationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        OrchestrationError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(context: &str, err: OrchestrationError) -> ApiResult {
    warn!(error = %err, code = err.code(), "{} failed", context);
    (
        status_for(&err),
        Json(ApiResponse::error(format!("{} failed: {}", context, err))),
    )
}

async fn respond<T, F>(context: &str, call: F) -> ApiResult
where
    T: Serialize,
    F: Future<Output = crate::Result<T>>,
{
    match call.await {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => failure(context, e),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Decision Routing
/// =============================

async fn route_decision(
    State(state): State<ApiState>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult {
    info!(route = %req.route, "Received decision request");
    respond("Decision routing", state.orchestrator.route(req)).await
}

/// Routed as an `advise` decision: the profile is policy-checked, one
/// decision record is written, and the body is the `DecisionResponse`
/// envelope (`status`, `detail`, advisor fields under `data`).
async fn recommend(
    State(state): State<ApiState>,
    Json(req): Json<RecommendRequest>,
) -> ApiResult {
    let mut payload = serde_json::Map::new();
    if let Some(objective) = req.objective {
        payload.insert("objective".to_string(), serde_json::json!(objective));
    }
    let decision = DecisionRequest {
        route: "advise".to_string(),
        user_id: req.user_id,
        intent: "advisor recommend".to_string(),
        profile: Some(req.profile),
        payload,
        ..Default::default()
    };
    respond("Recommendation", state.orchestrator.route(decision)).await
}

/// =============================
/// Market Events
/// =============================

/// Store one event directly, without an ingestion provider.
async fn ingest_event(
    State(state): State<ApiState>,
    Json(req): Json<IngestEventRequest>,
) -> ApiResult {
    respond("Event ingest", async {
        let event = RawEvent::from(req);
        if event.tx_hash.is_empty() {
            return Err(OrchestrationError::InvalidInput("tx_hash must not be empty".to_string()));
        }
        let stored = state.orchestrator.events().store_event(event).await?;
        info!(tx_hash = %stored.tx_hash, "Stored market event");
        Ok::<_, OrchestrationError>(serde_json::json!({ "tx_hash": stored.tx_hash }))
    })
    .await
}

/// =============================
/// Trade History
/// =============================

async fn record_trades(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Json(req): Json<TradesRequest>,
) -> ApiResult {
    respond("Trade import", async {
        let (inserted, skipped) = state.orchestrator.advisor().record_trades(&user_id, req.trades).await?;
        Ok::<_, OrchestrationError>(serde_json::json!({
            "user_id": user_id,
            "inserted": inserted,
            "skipped": skipped
        }))
    })
    .await
}

async fn record_holdings(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Json(req): Json<HoldingsRequest>,
) -> ApiResult {
    respond("Holdings import", async {
        let upserted = state.orchestrator.advisor().record_holdings(&user_id, req.holdings).await?;
        Ok::<_, OrchestrationError>(serde_json::json!({ "user_id": user_id, "upserted": upserted }))
    })
    .await
}

/// =============================
/// Plan Preview
/// =============================

/// Policy check plus plan, without submitting or recording anything.
async fn preview_plan(
    State(state): State<ApiState>,
    Json(trade): Json<TradeIntent>,
) -> ApiResult {
    if let Err(e) = trade.validate() {
        return failure("Plan preview", e);
    }

    let verdict = state
        .orchestrator
        .policy()
        .validate_trade(&trade.asset, &trade.action, trade.size);
    if !verdict.allowed {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(verdict.reason_code().to_string())),
        );
    }

    match state
        .orchestrator
        .planner()
        .build_plan(&trade.strategy_id, &trade.asset, &trade.action, trade.size)
    {
        Ok(plan) => (StatusCode::OK, Json(ApiResponse::success(plan))),
        Err(e) => failure("Plan preview", e),
    }
}

/// =============================
/// Scorecard
/// =============================

async fn scorecard(State(state): State<ApiState>) -> ApiResult {
    respond(
        "Scorecard",
        Scorecard::collect(
            &state.settings,
            state.orchestrator.events(),
            state.orchestrator.history(),
        ),
    )
    .await
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<DecisionOrchestrator>, settings: Arc<Settings>) -> Router {
    let state = ApiState {
        orchestrator,
        settings,
    };

    Router::new()
        .route("/health", get(health))
        .route("/mcp/route", post(route_decision))
        .route("/data/ingest", post(ingest_event))
        .route("/advisor/recommend", post(recommend))
        .route("/advisor/users/:user_id/trades", post(record_trades))
        .route("/advisor/users/:user_id/holdings", post(record_holdings))
        .route("/execute/plan", post(preview_plan))
        .route("/scorecard", get(scorecard))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server<S>(
    orchestrator: Arc<DecisionOrchestrator>,
    settings: Arc<Settings>,
    shutdown: S,
) -> crate::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let port = settings.port;
    let router = create_router(orchestrator, settings);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::DecisionLog;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<DecisionOrchestrator>) {
        let settings = Arc::new(Settings::from_lookup(|_| None).unwrap());
        let orchestrator = Arc::new(DecisionOrchestrator::from_settings(&settings).unwrap());
        (create_router(orchestrator.clone(), settings), orchestrator)
    }

    async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app();
        let (status, body) = call(router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_route_records_decision() {
        let (router, orchestrator) = app();
        let request = json!({
            "route": "execute",
            "trade": { "asset": "BNB", "action": "swap", "size": 2.0, "strategy_id": "s1" }
        });
        let (status, body) = call(router, "POST", "/mcp/route", Some(request)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "paper-trade");
        assert_eq!(body["data"]["data"]["plan"]["slippage_bps"], 20);
        assert_eq!(orchestrator.decisions().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recommend_uses_history() {
        let (router, _) = app();
        let trades = json!({ "trades": [
            { "asset": "CAKE", "side": "buy", "size": 3.0, "external_id": "t1" },
            { "asset": "CAKE", "side": "buy", "size": 1.0, "external_id": "t1" }
        ]});
        let (status, body) =
            call(router.clone(), "POST", "/advisor/users/alice/trades", Some(trades)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["inserted"], 1);
        assert_eq!(body["data"]["skipped"], 1);

        let request = json!({
            "profile": { "risk_tolerance": 0.5, "horizon_days": 180, "max_drawdown": 0.2 },
            "objective": "growth",
            "user_id": "alice"
        });
        let (status, body) = call(router, "POST", "/advisor/recommend", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "accepted");
        assert_eq!(body["data"]["data"]["personalization"]["top_traded_asset"], "CAKE");
    }

    #[tokio::test]
    async fn test_ingested_event_feeds_signals() {
        let (router, orchestrator) = app();
        let event = json!({
            "tx_hash": "0xabc1",
            "payload": "whale accumulation whale rotation",
            "from_address": "0xa",
            "to_address": "0xb",
            "value": 12.5,
            "block_number": 100,
            "tags": ["transfer"]
        });
        let (status, body) = call(router.clone(), "POST", "/data/ingest", Some(event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tx_hash"], "0xabc1");
        assert_eq!(orchestrator.events().count().await.unwrap(), 1);

        let request = json!({
            "profile": { "risk_tolerance": 0.5, "horizon_days": 365, "max_drawdown": 0.2 }
        });
        let (status, body) = call(router, "POST", "/advisor/recommend", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["data"]["signals"][0], "whale:2");
    }

    #[tokio::test]
    async fn test_ingest_requires_tx_hash() {
        let (router, orchestrator) = app();
        let event = json!({ "tx_hash": "  ", "payload": "anything" });
        let (status, body) = call(router, "POST", "/data/ingest", Some(event)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(orchestrator.events().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_user_is_bad_request() {
        let (router, _) = app();
        let holdings = json!({ "holdings": [{ "asset": "", "quantity": 1.0 }] });
        let (status, body) =
            call(router, "POST", "/advisor/users/bob/holdings", Some(holdings)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_plan_preview() {
        let (router, orchestrator) = app();
        let trade = json!({ "asset": "BNB", "action": "swap", "size": 12.0, "strategy_id": "s9" });
        let (status, body) = call(router.clone(), "POST", "/execute/plan", Some(trade)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["gas_strategy"], "fast");
        assert_eq!(body["data"]["plan_id"].as_str().unwrap().len(), 12);

        let rejected = json!({ "asset": "DOGE", "action": "swap", "size": 1.0, "strategy_id": "s9" });
        let (status, body) = call(router, "POST", "/execute/plan", Some(rejected)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "asset-not-allowed");

        // Previews are not decisions.
        assert_eq!(orchestrator.decisions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scorecard() {
        let (router, _) = app();
        let (status, body) = call(router, "GET", "/scorecard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["overall_score"], 6.67);
    }
}
