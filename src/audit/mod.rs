//! Decision audit trail
//!
//! Append-only: every orchestrated call lands here exactly once and nothing
//! is ever updated or deleted.

use crate::models::{DecisionRecord, DecisionStatus};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait DecisionLog: Send + Sync {
    async fn append(&self, record: DecisionRecord) -> Result<()>;
    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<DecisionRecord>>;
    async fn count(&self) -> Result<usize>;
}

impl DecisionRecord {
    pub fn new(route: &str, status: DecisionStatus, reason: &str, payload: String) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            route: route.to_string(),
            status,
            reason: reason.to_string(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// In-memory audit trail
pub struct InMemoryDecisionLog {
    records: Arc<RwLock<Vec<DecisionRecord>>>,
}

impl InMemoryDecisionLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryDecisionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DecisionLog for InMemoryDecisionLog {
    async fn append(&self, record: DecisionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<DecisionRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_recent_order() {
        tokio_test::block_on(async {
            let log = InMemoryDecisionLog::new();
            log.append(DecisionRecord::new("advise", DecisionStatus::Accepted, "ok", "{}".into()))
                .await
                .unwrap();
            log.append(DecisionRecord::new("execute", DecisionStatus::Rejected, "read-only", "{}".into()))
                .await
                .unwrap();

            assert_eq!(log.count().await.unwrap(), 2);
            let recent = log.recent(10).await.unwrap();
            assert_eq!(recent[0].route, "execute");
            assert_eq!(recent[0].reason, "read-only");
            assert_eq!(recent[1].status, DecisionStatus::Accepted);
        });
    }

    #[test]
    fn test_records_get_distinct_ids() {
        let a = DecisionRecord::new("ingest", DecisionStatus::Accepted, "ok", String::new());
        let b = DecisionRecord::new("ingest", DecisionStatus::Accepted, "ok", String::new());
        assert_ne!(a.decision_id, b.decision_id);
    }
}
