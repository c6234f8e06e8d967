//! Risk advisor
//!
//! Scores a risk profile against recent market activity, personalizes the
//! score from the user's own trade history and maps it onto an allocation.
//! Storage is only touched through the collaborator traits; everything in
//! between is pure.

pub mod personalization;
pub mod signals;

use crate::error::OrchestrationError;
use crate::models::{
    AdvisorOutput, RiskProfile, TradeSide, UserHolding, UserHoldingIn, UserTrade, UserTradeIn,
};
use crate::state::{EventStore, TradeHistoryStore};
use crate::Result;
use chrono::{Duration, Utc};
use personalization::build_context;
use signals::{
    allocation, clamp01, data_confidence, extract_signals, recommendation_for, risk_score, round2,
    LOW_DATA_SIGNAL,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Events considered for signal extraction.
pub const SIGNAL_WINDOW: usize = 80;
/// Days of trade history used for personalization.
pub const HISTORY_DAYS: i64 = 30;
const RATIONALE_SIGNALS: usize = 4;

pub struct RiskAdvisor {
    events: Arc<dyn EventStore>,
    history: Arc<dyn TradeHistoryStore>,
}

impl RiskAdvisor {
    pub fn new(events: Arc<dyn EventStore>, history: Arc<dyn TradeHistoryStore>) -> Self {
        Self { events, history }
    }

    pub async fn recommend(
        &self,
        profile: &RiskProfile,
        objective: &str,
        user_id: Option<&str>,
    ) -> Result<AdvisorOutput> {
        let events = self.events.recent_events(SIGNAL_WINDOW).await?;
        let mut signals = if events.is_empty() {
            vec![LOW_DATA_SIGNAL.to_string()]
        } else {
            extract_signals(events.iter().map(|e| e.payload.as_str()))
        };
        let confidence = data_confidence(events.len());
        let mut score = risk_score(profile, confidence);

        let context = match user_id.map(str::trim).filter(|u| !u.is_empty()) {
            Some(user) => {
                let since = Utc::now() - Duration::days(HISTORY_DAYS);
                let trades = self.history.read_trades(user, since).await?;
                let holdings = self.history.read_holdings(user).await?;
                build_context(user, &trades, &holdings)
            }
            None => None,
        };

        if let Some(ctx) = &context {
            score = round2(clamp01(score + ctx.adjustment));
            debug!(
                user_id = %ctx.personalization.user_id,
                adjustment = ctx.adjustment,
                risk_score = score,
                "Applied personalization"
            );
        }

        let shown: Vec<&str> = signals.iter().take(RATIONALE_SIGNALS).map(String::as_str).collect();
        let mut rationale = format!(
            "Objective '{}' with horizon {}d and max drawdown {:.2}. Signals: {}.",
            objective,
            profile.horizon_days,
            profile.max_drawdown,
            shown.join(", ")
        );

        let personalization = context.map(|ctx| ctx.personalization);
        if let Some(p) = &personalization {
            if let Some(summary) = &p.summary {
                rationale.push_str(&format!(" User context: {}.", summary));
            }
            signals.extend(p.notes.iter().map(|note| format!("user:{}", note)));
        }

        Ok(AdvisorOutput {
            recommendation: recommendation_for(profile.risk_tolerance).to_string(),
            rationale,
            signals,
            risk_score: score,
            allocation: allocation(score),
            confidence: round2(confidence),
            personalization,
        })
    }

    /// Returns `(inserted, skipped)`; duplicates by `external_id` are skipped.
    pub async fn record_trades(
        &self,
        user_id: &str,
        trades: Vec<UserTradeIn>,
    ) -> Result<(usize, usize)> {
        let user = normalize_user(user_id)?;
        let mut inserted = 0;
        let mut skipped = 0;

        for trade in trades {
            let asset = normalize_asset(&trade.asset)?;
            if !trade.size.is_finite() {
                return Err(OrchestrationError::InvalidInput(
                    "trade size must be a finite number".to_string(),
                ));
            }
            let external_id = trade
                .external_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty());

            let row = UserTrade {
                user_id: user.clone(),
                asset,
                side: TradeSide::normalize(&trade.side),
                size: trade.size,
                price: trade.price,
                external_id,
                executed_at: trade.executed_at.unwrap_or_else(Utc::now),
            };

            if self.history.insert_trade(row).await? {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }

        info!(user_id = %user, inserted, skipped, "Recorded user trades");
        Ok((inserted, skipped))
    }

    /// Every holding counts as upserted, whether new or replaced.
    pub async fn record_holdings(&self, user_id: &str, holdings: Vec<UserHoldingIn>) -> Result<usize> {
        let user = normalize_user(user_id)?;
        let mut upserted = 0;

        for holding in holdings {
            let asset = normalize_asset(&holding.asset)?;
            if !holding.quantity.is_finite() {
                return Err(OrchestrationError::InvalidInput(
                    "holding quantity must be a finite number".to_string(),
                ));
            }
            self.history
                .upsert_holding(UserHolding {
                    user_id: user.clone(),
                    asset,
                    quantity: holding.quantity,
                    avg_cost: holding.avg_cost,
                    updated_at: holding.updated_at.unwrap_or_else(Utc::now),
                })
                .await?;
            upserted += 1;
        }

        info!(user_id = %user, upserted, "Recorded user holdings");
        Ok(upserted)
    }
}

fn normalize_user(user_id: &str) -> Result<String> {
    let user = user_id.trim();
    if user.is_empty() {
        return Err(OrchestrationError::InvalidInput("user_id must not be empty".to_string()));
    }
    Ok(user.to_string())
}

fn normalize_asset(asset: &str) -> Result<String> {
    let asset = asset.trim();
    if asset.is_empty() {
        return Err(OrchestrationError::InvalidInput("asset must not be empty".to_string()));
    }
    Ok(asset.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEvent;
    use crate::state::{InMemoryEventStore, InMemoryTradeHistory};

    fn advisor() -> (RiskAdvisor, Arc<InMemoryEventStore>, Arc<InMemoryTradeHistory>) {
        let events = Arc::new(InMemoryEventStore::new());
        let history = Arc::new(InMemoryTradeHistory::new());
        (RiskAdvisor::new(events.clone(), history.clone()), events, history)
    }

    fn profile(risk_tolerance: f64) -> RiskProfile {
        RiskProfile { risk_tolerance, horizon_days: 365, max_drawdown: 0.2 }
    }

    fn trade_in(side: &str, external_id: Option<&str>) -> UserTradeIn {
        UserTradeIn {
            asset: " bnb ".into(),
            side: side.into(),
            size: 1.0,
            price: Some(300.0),
            executed_at: None,
            external_id: external_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_empty_store_reports_low_data() {
        let (advisor, _, _) = advisor();
        let out = advisor.recommend(&profile(0.5), "growth", None).await.unwrap();

        assert_eq!(out.signals, vec!["low-data"]);
        assert_eq!(out.confidence, 0.2);
        assert_eq!(out.risk_score, 0.58);
        assert_eq!(out.allocation.blue_chip, 45);
        assert_eq!(
            out.rationale,
            "Objective 'growth' with horizon 365d and max drawdown 0.20. Signals: low-data."
        );
        assert!(out.personalization.is_none());
    }

    #[tokio::test]
    async fn test_recommendation_follows_raw_tolerance() {
        let (advisor, _, _) = advisor();
        let cautious = advisor.recommend(&profile(0.2), "income", None).await.unwrap();
        assert!(cautious.recommendation.starts_with("Focus on high-liquidity"));

        let bold = advisor.recommend(&profile(0.9), "income", None).await.unwrap();
        assert!(bold.recommendation.starts_with("Pursue higher beta"));
        assert_eq!(bold.allocation.total(), 100);
    }

    #[tokio::test]
    async fn test_signals_from_stored_events() {
        let (advisor, events, _) = advisor();
        for i in 0..25 {
            events
                .store_event(RawEvent {
                    tx_hash: format!("0x{:02}", i),
                    payload: "router swap pancakeswap".into(),
                    from_address: None,
                    to_address: None,
                    value: None,
                    block_number: None,
                    tags: vec![],
                })
                .await
                .unwrap();
        }

        let out = advisor.recommend(&profile(0.5), "growth", None).await.unwrap();
        assert_eq!(out.signals, vec!["router:25", "swap:25", "pancakeswap:25"]);
        assert_eq!(out.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_personalization_adjusts_score() {
        let (advisor, _, _) = advisor();
        let trades: Vec<_> = (0..12).map(|i| trade_in("BUY", Some(&format!("t{}", i)))).collect();
        advisor.record_trades("alice", trades).await.unwrap();

        let plain = advisor.recommend(&profile(0.5), "growth", None).await.unwrap();
        let personal = advisor.recommend(&profile(0.5), "growth", Some("alice")).await.unwrap();

        assert_eq!(personal.risk_score, round2(plain.risk_score + 0.03));
        assert!(personal.signals.contains(&"user:active-trading-style".to_string()));
        assert!(personal.rationale.ends_with("User context: 30d trades=12, buy ratio=1.00, top traded=BNB."));
        assert_eq!(personal.personalization.unwrap().activity, "active");
    }

    #[tokio::test]
    async fn test_unknown_user_gets_no_adjustment() {
        let (advisor, _, _) = advisor();
        let out = advisor.recommend(&profile(0.5), "growth", Some("nobody")).await.unwrap();
        assert_eq!(out.risk_score, 0.58);
        assert!(out.personalization.is_none());
    }

    #[tokio::test]
    async fn test_record_trades_skips_duplicates() {
        let (advisor, _, history) = advisor();
        let first = advisor
            .record_trades(" alice ", vec![trade_in("buy", Some("x1")), trade_in("hold", None)])
            .await
            .unwrap();
        assert_eq!(first, (2, 0));

        let again = advisor
            .record_trades("alice", vec![trade_in("sell", Some(" x1 ")), trade_in("sell", Some(""))])
            .await
            .unwrap();
        assert_eq!(again, (1, 1));

        let since = Utc::now() - Duration::days(1);
        let stored = history.read_trades("alice", since).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|t| t.asset == "BNB"));
        assert_eq!(stored[1].side, TradeSide::Other);
        assert_eq!(stored[2].external_id, None);
    }

    #[tokio::test]
    async fn test_record_holdings_upserts() {
        let (advisor, _, history) = advisor();
        let holding = |qty: f64| UserHoldingIn {
            asset: "usdt".into(),
            quantity: qty,
            avg_cost: None,
            updated_at: None,
        };

        assert_eq!(advisor.record_holdings("bob", vec![holding(1.0)]).await.unwrap(), 1);
        assert_eq!(advisor.record_holdings("bob", vec![holding(4.0)]).await.unwrap(), 1);

        let rows = history.read_holdings("bob").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset, "USDT");
        assert_eq!(rows[0].quantity, 4.0);
    }

    #[tokio::test]
    async fn test_blank_user_is_invalid() {
        let (advisor, _, _) = advisor();
        let err = advisor.record_trades("  ", vec![]).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidInput(_)));
    }
}
