//! Manual Odds Source - Operator Batch Queue
//!
//! Holds operator-submitted update batches (backfill, corrections)
//! until the next poll drains them. Callers that need synchronous
//! results can bypass the queue entirely and hand their batch to
//! `IngestionPipeline::process_updates` directly.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::odds_source::{OddsSource, OddsUpdate, SourceDescriptor, SourceError};

/// Queue-backed source for manual ingestion.
pub struct ManualOddsSource {
    descriptor: SourceDescriptor,
    queue: Mutex<VecDeque<OddsUpdate>>,
}

impl ManualOddsSource {
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self {
            descriptor,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a batch for the next poll.
    pub async fn submit_batch(&self, updates: Vec<OddsUpdate>) {
        let mut queue = self.queue.lock().await;
        queue.extend(updates);
    }

    /// Number of queued updates awaiting the next poll.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[async_trait]
impl OddsSource for ManualOddsSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    async fn poll(&self) -> Result<Vec<OddsUpdate>, SourceError> {
        let mut queue = self.queue.lock().await;
        Ok(queue.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::domain::odds::OddsFormat;
    use crate::ports::odds_source::SourceKind;

    #[tokio::test]
    async fn submitted_batches_drain_once() {
        let source = ManualOddsSource::new(SourceDescriptor {
            source_id: "backfill".to_string(),
            kind: SourceKind::Manual,
            endpoint: None,
            poll_interval_ms: 60_000,
            active: false,
        });

        source
            .submit_batch(vec![OddsUpdate {
                event_id: "evt-1".to_string(),
                market_id: "match-winner".to_string(),
                selection_id: "home".to_string(),
                format: OddsFormat::Fractional,
                value: "5/2".to_string(),
                observed_at: Utc::now(),
                metadata: BTreeMap::new(),
            }])
            .await;

        assert_eq!(source.pending().await, 1);
        assert_eq!(source.poll().await.unwrap().len(), 1);
        assert_eq!(source.pending().await, 0);
        assert!(source.poll().await.unwrap().is_empty());
    }
}
