//! Postgres-backed stores
//!
//! Expects these tables to exist (migrations are managed outside this crate):
//!
//! ```sql
//! onchain_events (tx_hash TEXT UNIQUE, payload TEXT, chain TEXT, from_address TEXT,
//!                 to_address TEXT, value DOUBLE PRECISION, block_number BIGINT,
//!                 tags TEXT[], created_at TIMESTAMPTZ)
//! user_trades    (user_id TEXT, asset TEXT, side TEXT, size DOUBLE PRECISION,
//!                 price DOUBLE PRECISION, external_id TEXT, executed_at TIMESTAMPTZ,
//!                 UNIQUE (user_id, external_id))
//! user_holdings  (user_id TEXT, asset TEXT, quantity DOUBLE PRECISION,
//!                 avg_cost DOUBLE PRECISION, updated_at TIMESTAMPTZ,
//!                 UNIQUE (user_id, asset))
//! mcp_decisions  (decision_id UUID PRIMARY KEY, route TEXT, status TEXT, reason TEXT,
//!                 payload TEXT, created_at TIMESTAMPTZ)
//! ```

use super::{EventStats, EventStore, TradeHistoryCounts, TradeHistoryStore, DEFAULT_CHAIN};
use crate::audit::DecisionLog;
use crate::error::OrchestrationError;
use crate::models::{
    DecisionRecord, DecisionStatus, MarketEvent, RawEvent, TradeSide, UserHolding, UserTrade,
};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;

/// One pool shared by every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Lazy pool: no connection is opened until the first query.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_lazy(database_url)
            .map_err(|e| {
                OrchestrationError::DatabaseError(format!("Failed to create postgres pool: {}", e))
            })?;
        info!("Storage backend: postgres");
        Ok(Self { pool })
    }

    fn event_from_row(row: &PgRow) -> Result<MarketEvent> {
        Ok(MarketEvent {
            tx_hash: row.try_get("tx_hash")?,
            payload: row.try_get("payload")?,
            chain: row
                .try_get::<Option<String>, _>("chain")?
                .unwrap_or_else(|| DEFAULT_CHAIN.to_string()),
            from_address: row.try_get("from_address")?,
            to_address: row.try_get("to_address")?,
            value: row.try_get("value")?,
            block_number: row.try_get("block_number")?,
            tags: row.try_get::<Option<Vec<String>>, _>("tags")?.unwrap_or_default(),
            created_at: row.try_get("created_at")?,
        })
    }
}

async fn count_rows(pool: &PgPool, table: &str) -> Result<usize> {
    // Table names come from this module only, never from callers.
    let query = format!("SELECT COUNT(*) AS n FROM {}", table);
    let row = sqlx::query(&query).fetch_one(pool).await.map_err(|e| {
        OrchestrationError::DatabaseError(format!("Failed to count {}: {}", table, e))
    })?;
    let n: i64 = row.try_get("n")?;
    Ok(n.max(0) as usize)
}

#[async_trait::async_trait]
impl EventStore for PgStore {
    async fn store_event(&self, event: RawEvent) -> Result<MarketEvent> {
        sqlx::query(
            r#"
            INSERT INTO onchain_events
              (tx_hash, payload, chain, from_address, to_address, value, block_number, tags, created_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (tx_hash) DO NOTHING
            "#,
        )
        .bind(&event.tx_hash)
        .bind(&event.payload)
        .bind(DEFAULT_CHAIN)
        .bind(&event.from_address)
        .bind(&event.to_address)
        .bind(event.value)
        .bind(event.block_number)
        .bind(&event.tags)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to insert event: {}", e))
        })?;

        let row = sqlx::query(
            r#"
            SELECT tx_hash, payload, chain, from_address, to_address, value, block_number, tags, created_at
            FROM onchain_events
            WHERE tx_hash = $1
            "#,
        )
        .bind(&event.tx_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to load stored event: {}", e))
        })?;

        Self::event_from_row(&row)
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<MarketEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT tx_hash, payload, chain, from_address, to_address, value, block_number, tags, created_at
            FROM onchain_events
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to load recent events: {}", e))
        })?;

        rows.iter().map(Self::event_from_row).collect()
    }

    async fn count(&self) -> Result<usize> {
        count_rows(&self.pool, "onchain_events").await
    }

    async fn stats(&self) -> Result<EventStats> {
        let row = sqlx::query(
            r#"
            SELECT
              COUNT(*) AS total,
              COUNT(*) FILTER (
                WHERE from_address IS NOT NULL AND to_address IS NOT NULL AND block_number IS NOT NULL
              ) AS structured,
              COUNT(*) FILTER (WHERE tags IS NOT NULL AND cardinality(tags) > 0) AS tagged
            FROM onchain_events
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to load event stats: {}", e))
        })?;

        let total: i64 = row.try_get("total")?;
        let structured: i64 = row.try_get("structured")?;
        let tagged: i64 = row.try_get("tagged")?;
        Ok(EventStats {
            total: total.max(0) as usize,
            structured: structured.max(0) as usize,
            tagged: tagged.max(0) as usize,
        })
    }
}

#[async_trait::async_trait]
impl TradeHistoryStore for PgStore {
    async fn read_trades(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<UserTrade>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, asset, side, size, price, external_id, executed_at
            FROM user_trades
            WHERE user_id = $1 AND executed_at >= $2
            ORDER BY executed_at ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to load user trades: {}", e))
        })?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            let side: String = row.try_get("side")?;
            trades.push(UserTrade {
                user_id: row.try_get("user_id")?,
                asset: row.try_get("asset")?,
                side: TradeSide::normalize(&side),
                size: row.try_get("size")?,
                price: row.try_get("price")?,
                external_id: row.try_get("external_id")?,
                executed_at: row.try_get("executed_at")?,
            });
        }
        Ok(trades)
    }

    async fn read_holdings(&self, user_id: &str) -> Result<Vec<UserHolding>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, asset, quantity, avg_cost, updated_at
            FROM user_holdings
            WHERE user_id = $1
            ORDER BY asset ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to load user holdings: {}", e))
        })?;

        let mut holdings = Vec::with_capacity(rows.len());
        for row in rows {
            holdings.push(UserHolding {
                user_id: row.try_get("user_id")?,
                asset: row.try_get("asset")?,
                quantity: row.try_get("quantity")?,
                avg_cost: row.try_get("avg_cost")?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(holdings)
    }

    async fn insert_trade(&self, trade: UserTrade) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_trades
              (user_id, asset, side, size, price, external_id, executed_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, external_id) DO NOTHING
            "#,
        )
        .bind(&trade.user_id)
        .bind(&trade.asset)
        .bind(trade.side.as_str())
        .bind(trade.size)
        .bind(trade.price)
        .bind(&trade.external_id)
        .bind(trade.executed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to insert user trade: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_holding(&self, holding: UserHolding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_holdings
              (user_id, asset, quantity, avg_cost, updated_at)
            VALUES
              ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, asset) DO UPDATE
              SET quantity = EXCLUDED.quantity,
                  avg_cost = EXCLUDED.avg_cost,
                  updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&holding.user_id)
        .bind(&holding.asset)
        .bind(holding.quantity)
        .bind(holding.avg_cost)
        .bind(holding.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            OrchestrationError::DatabaseError(format!("Failed to upsert user holding: {}", e))
        })?;

        Ok(())
    }

    async fn counts(&self) -> Result<TradeHistoryCounts> {
        Ok(TradeHistoryCounts {
            trades: count_rows(&self.pool, "user_trades").await?,
            holdings: count_rows(&self.pool, "user_holdings").await?,
        })
    }
}

#[async_trait::async_trait]
impl DecisionLog for PgStore {
    async fn append(&self, record: DecisionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO mcp_decisions
              (decision_id, route, status, reason, payload, created_at)
            VALUES
              ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.decision_id)
        .bind(&record.route)
        .bind(record.status.as_str())
        .bind(&record.reason)
        .bind(&record.payload)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| OrchestrationError::AuditError(format!("Failed to append decision: {}", e)))?;

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<DecisionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT decision_id, route, status, reason, payload, created_at
            FROM mcp_decisions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OrchestrationError::AuditError(format!("Failed to load decisions: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            records.push(DecisionRecord {
                decision_id: row.try_get("decision_id")?,
                route: row.try_get("route")?,
                status: DecisionStatus::from_db(&status),
                reason: row.try_get("reason")?,
                payload: row.try_get("payload")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        count_rows(&self.pool, "mcp_decisions").await
    }
}
