//! Feed Odds Source - Buffered Push-to-Pull Bridge
//!
//! Upstream feed handlers push ticks into an mpsc channel as they
//! arrive; the pipeline drains the buffer on the source's own poll
//! tick. This keeps every source kind behind the single `poll()`
//! capability while still accepting pushed data.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use crate::ports::odds_source::{OddsSource, OddsUpdate, SourceDescriptor, SourceError};

/// Pull boundary over a pushed tick stream.
pub struct FeedOddsSource {
    descriptor: SourceDescriptor,
    rx: Mutex<mpsc::Receiver<OddsUpdate>>,
}

impl FeedOddsSource {
    /// Create the source and the push handle for the feed producer.
    ///
    /// When the buffer is full the producer's `send` backpressures;
    /// ticks queued beyond one poll interval are simply picked up by
    /// the next drain.
    pub fn new(descriptor: SourceDescriptor, buffer: usize) -> (Self, mpsc::Sender<OddsUpdate>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            Self {
                descriptor,
                rx: Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl OddsSource for FeedOddsSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    async fn poll(&self) -> Result<Vec<OddsUpdate>, SourceError> {
        let mut rx = self.rx.lock().await;
        let mut updates = Vec::new();

        loop {
            match rx.try_recv() {
                Ok(update) => updates.push(update),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if updates.is_empty() {
                        return Err(SourceError::Closed);
                    }
                    break;
                }
            }
        }

        if !updates.is_empty() {
            debug!(
                source_id = %self.descriptor.source_id,
                drained = updates.len(),
                "Drained feed buffer"
            );
        }

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::domain::odds::OddsFormat;
    use crate::ports::odds_source::SourceKind;

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor {
            source_id: "test-feed".to_string(),
            kind: SourceKind::Feed,
            endpoint: None,
            poll_interval_ms: 1_000,
            active: false,
        }
    }

    fn update(value: &str) -> OddsUpdate {
        OddsUpdate {
            event_id: "evt-1".to_string(),
            market_id: "match-winner".to_string(),
            selection_id: "home".to_string(),
            format: OddsFormat::Decimal,
            value: value.to_string(),
            observed_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn poll_drains_pushed_ticks_in_order() {
        let (source, tx) = FeedOddsSource::new(descriptor(), 16);
        tx.send(update("2.0")).await.unwrap();
        tx.send(update("2.1")).await.unwrap();

        let drained = source.poll().await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].value, "2.0");
        assert_eq!(drained[1].value, "2.1");

        // Buffer is empty now.
        assert!(source.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn poll_reports_closed_when_producer_dropped() {
        let (source, tx) = FeedOddsSource::new(descriptor(), 16);
        drop(tx);
        assert!(matches!(source.poll().await, Err(SourceError::Closed)));
    }
}
