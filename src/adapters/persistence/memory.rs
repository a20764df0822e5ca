//! In-Memory Movement Store
//!
//! Keeps all movement records in a per-key map, ordered by observation
//! time. Backs the JSONL store's read path and stands alone in tests
//! and ephemeral deployments. Supports concurrent reads; write
//! serialization per market key is the pipeline's job.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::movement::{MarketKey, MovementRecord};
use crate::ports::movement_store::{MarketActivity, MovementStore};

/// Map-backed movement store.
#[derive(Default)]
pub struct MemoryMovementStore {
    /// Records per key, ascending by `observed_at`.
    records: RwLock<HashMap<MarketKey, Vec<MovementRecord>>>,
}

impl MemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total record count across all keys.
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MovementStore for MemoryMovementStore {
    async fn insert(&self, record: MovementRecord) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        let entries = records.entry(record.key.clone()).or_default();

        // Ticks almost always arrive in order; walk back from the end
        // to keep backfilled records sorted without a full re-sort.
        let pos = entries
            .iter()
            .rposition(|r| r.observed_at <= record.observed_at)
            .map_or(0, |p| p + 1);
        entries.insert(pos, record);
        Ok(())
    }

    async fn latest_for_key(&self, key: &MarketKey) -> anyhow::Result<Option<MovementRecord>> {
        let records = self.records.read().await;
        Ok(records.get(key).and_then(|v| v.last().cloned()))
    }

    async fn movements_before(
        &self,
        key: &MarketKey,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .filter(|r| r.observed_at < cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn movements_in_range(
        &self,
        event_id: &str,
        market_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        let records = self.records.read().await;
        let mut matched: Vec<MovementRecord> = records
            .iter()
            .filter(|(key, _)| key.event_id == event_id && key.market_id == market_id)
            .flat_map(|(_, entries)| {
                entries
                    .iter()
                    .filter(|r| r.observed_at >= start && r.observed_at <= end)
                    .cloned()
            })
            .collect();
        matched.sort_by_key(|r| r.observed_at);
        Ok(matched)
    }

    async fn movements_in_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        let records = self.records.read().await;
        let mut matched: Vec<MovementRecord> = records
            .values()
            .flat_map(|entries| {
                entries
                    .iter()
                    .filter(|r| r.observed_at >= start && r.observed_at <= end)
                    .cloned()
            })
            .collect();
        matched.sort_by_key(|r| r.observed_at);
        Ok(matched)
    }

    async fn count_by_market(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MarketActivity>> {
        let records = self.records.read().await;
        let mut counts: HashMap<(String, String), usize> = HashMap::new();

        for (key, entries) in records.iter() {
            let in_range = entries
                .iter()
                .filter(|r| r.observed_at >= start && r.observed_at <= end)
                .count();
            if in_range > 0 {
                *counts
                    .entry((key.event_id.clone(), key.market_id.clone()))
                    .or_default() += in_range;
            }
        }

        let mut activity: Vec<MarketActivity> = counts
            .into_iter()
            .map(|((event_id, market_id), movements)| MarketActivity {
                event_id,
                market_id,
                movements,
            })
            .collect();
        // Most active first; ties broken by identity for stable output.
        activity.sort_by(|a, b| {
            b.movements
                .cmp(&a.movements)
                .then_with(|| a.event_id.cmp(&b.event_id))
                .then_with(|| a.market_id.cmp(&b.market_id))
        });
        Ok(activity)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
