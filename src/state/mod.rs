//! Storage collaborators
//!
//! The core only talks to these traits. In-memory implementations back
//! tests and local runs; `postgres` backs deployments with `DATABASE_URL`.

use crate::models::{MarketEvent, RawEvent, UserHolding, UserTrade};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod postgres;
pub use postgres::PgStore;

/// Chain label attached to stored events.
pub const DEFAULT_CHAIN: &str = "bnb";

/// Market-event storage
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Idempotent on `tx_hash`: an existing event is returned unchanged.
    async fn store_event(&self, event: RawEvent) -> Result<MarketEvent>;
    /// Newest first.
    async fn recent_events(&self, limit: usize) -> Result<Vec<MarketEvent>>;
    async fn count(&self) -> Result<usize>;
    async fn stats(&self) -> Result<EventStats>;
}

/// Coverage figures used by the readiness scorecard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventStats {
    pub total: usize,
    /// Events carrying sender, receiver and block number.
    pub structured: usize,
    pub tagged: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeHistoryCounts {
    pub trades: usize,
    pub holdings: usize,
}

/// Per-user trade and holding history
#[async_trait::async_trait]
pub trait TradeHistoryStore: Send + Sync {
    /// Oldest first.
    async fn read_trades(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<UserTrade>>;
    /// Sorted by asset.
    async fn read_holdings(&self, user_id: &str) -> Result<Vec<UserHolding>>;
    /// Returns `false` when `(user_id, external_id)` already exists.
    async fn insert_trade(&self, trade: UserTrade) -> Result<bool>;
    /// Insert or replace the holding keyed on `(user_id, asset)`.
    async fn upsert_holding(&self, holding: UserHolding) -> Result<()>;
    async fn counts(&self) -> Result<TradeHistoryCounts>;
}

//
// ================= In-memory =================
//

/// In-memory event store for development
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<MarketEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventStore for InMemoryEventStore {
    async fn store_event(&self, event: RawEvent) -> Result<MarketEvent> {
        let mut events = self.events.write().await;

        if let Some(existing) = events.iter().find(|e| e.tx_hash == event.tx_hash) {
            return Ok(existing.clone());
        }

        let stored = MarketEvent {
            tx_hash: event.tx_hash,
            payload: event.payload,
            chain: DEFAULT_CHAIN.to_string(),
            from_address: event.from_address,
            to_address: event.to_address,
            value: event.value,
            block_number: event.block_number,
            tags: event.tags,
            created_at: Utc::now(),
        };
        events.push(stored.clone());
        Ok(stored)
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<MarketEvent>> {
        let events = self.events.read().await;
        // Insertion order doubles as creation order.
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.events.read().await.len())
    }

    async fn stats(&self) -> Result<EventStats> {
        let events = self.events.read().await;
        Ok(EventStats {
            total: events.len(),
            structured: events
                .iter()
                .filter(|e| {
                    e.from_address.is_some() && e.to_address.is_some() && e.block_number.is_some()
                })
                .count(),
            tagged: events.iter().filter(|e| !e.tags.is_empty()).count(),
        })
    }
}

/// In-memory trade history for development
pub struct InMemoryTradeHistory {
    trades: Arc<RwLock<Vec<UserTrade>>>,
    holdings: Arc<RwLock<HashMap<(String, String), UserHolding>>>, // (user_id, asset) → holding
}

impl InMemoryTradeHistory {
    pub fn new() -> Self {
        Self {
            trades: Arc::new(RwLock::new(Vec::new())),
            holdings: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryTradeHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TradeHistoryStore for InMemoryTradeHistory {
    async fn read_trades(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<UserTrade>> {
        let trades = self.trades.read().await;
        let mut rows: Vec<UserTrade> = trades
            .iter()
            .filter(|t| t.user_id == user_id && t.executed_at >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.executed_at);
        Ok(rows)
    }

    async fn read_holdings(&self, user_id: &str) -> Result<Vec<UserHolding>> {
        let holdings = self.holdings.read().await;
        let mut rows: Vec<UserHolding> = holdings
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.asset.cmp(&b.asset));
        Ok(rows)
    }

    async fn insert_trade(&self, trade: UserTrade) -> Result<bool> {
        // Check and insert under one write lock so the uniqueness holds.
        let mut trades = self.trades.write().await;

        if let Some(external_id) = trade.external_id.as_deref() {
            let duplicate = trades.iter().any(|t| {
                t.user_id == trade.user_id && t.external_id.as_deref() == Some(external_id)
            });
            if duplicate {
                return Ok(false);
            }
        }

        trades.push(trade);
        Ok(true)
    }

    async fn upsert_holding(&self, holding: UserHolding) -> Result<()> {
        let mut holdings = self.holdings.write().await;
        holdings.insert((holding.user_id.clone(), holding.asset.clone()), holding);
        Ok(())
    }

    async fn counts(&self) -> Result<TradeHistoryCounts> {
        Ok(TradeHistoryCounts {
            trades: self.trades.read().await.len(),
            holdings: self.holdings.read().await.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeSide;
    use chrono::Duration;

    fn raw(hash: &str) -> RawEvent {
        RawEvent {
            tx_hash: hash.to_string(),
            payload: format!("from 0xa to 0xb value 1.0 block {}", hash),
            from_address: Some("0xa".into()),
            to_address: Some("0xb".into()),
            value: Some(1.0),
            block_number: Some(1),
            tags: vec!["transfer".into()],
        }
    }

    fn trade(user: &str, external_id: Option<&str>, days_ago: i64) -> UserTrade {
        UserTrade {
            user_id: user.to_string(),
            asset: "BNB".into(),
            side: TradeSide::Buy,
            size: 1.0,
            price: None,
            external_id: external_id.map(str::to_string),
            executed_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn test_event_store_is_idempotent_and_newest_first() {
        let store = InMemoryEventStore::new();
        store.store_event(raw("0x1")).await.unwrap();
        store.store_event(raw("0x2")).await.unwrap();
        store.store_event(raw("0x1")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let recent = store.recent_events(1).await.unwrap();
        assert_eq!(recent[0].tx_hash, "0x2");
        assert_eq!(recent[0].chain, "bnb");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats, EventStats { total: 2, structured: 2, tagged: 2 });
    }

    #[tokio::test]
    async fn test_trade_uniqueness_is_per_user() {
        let store = InMemoryTradeHistory::new();
        assert!(store.insert_trade(trade("alice", Some("ext-1"), 0)).await.unwrap());
        assert!(!store.insert_trade(trade("alice", Some("ext-1"), 0)).await.unwrap());
        assert!(store.insert_trade(trade("bob", Some("ext-1"), 0)).await.unwrap());
        // No dedup key, no dedup.
        assert!(store.insert_trade(trade("alice", None, 0)).await.unwrap());
        assert!(store.insert_trade(trade("alice", None, 0)).await.unwrap());

        assert_eq!(store.counts().await.unwrap().trades, 4);
    }

    #[tokio::test]
    async fn test_read_trades_respects_window() {
        let store = InMemoryTradeHistory::new();
        store.insert_trade(trade("alice", None, 1)).await.unwrap();
        store.insert_trade(trade("alice", None, 45)).await.unwrap();

        let since = Utc::now() - Duration::days(30);
        assert_eq!(store.read_trades("alice", since).await.unwrap().len(), 1);
        assert!(store.read_trades("bob", since).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_trades_oldest_first() {
        let store = InMemoryTradeHistory::new();
        store.insert_trade(trade("alice", Some("new"), 1)).await.unwrap();
        store.insert_trade(trade("alice", Some("old"), 20)).await.unwrap();
        store.insert_trade(trade("alice", Some("mid"), 10)).await.unwrap();

        let since = Utc::now() - Duration::days(30);
        let ids: Vec<Option<String>> = store
            .read_trades("alice", since)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.external_id)
            .collect();
        assert_eq!(ids, vec![Some("old".into()), Some("mid".into()), Some("new".into())]);
    }
}
