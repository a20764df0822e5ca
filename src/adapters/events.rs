//! Broadcast Event Publisher - In-process Domain Event Fan-out
//!
//! Logs every event with structured fields and forwards it on a
//! `tokio::sync::broadcast` channel. Lagging subscribers lose events,
//! which is exactly the at-most-once best-effort contract: durability
//! is the external bus's concern, not this core's.

use tokio::sync::broadcast;
use tracing::info;

use crate::ports::events::{DomainEvent, EventPublisher};

/// Publisher backed by tracing and a broadcast channel.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to the event stream. Receivers that fall behind the
    /// channel capacity skip ahead, dropping the missed events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: DomainEvent) {
        match &event {
            DomainEvent::MovementRecorded { record } => {
                info!(
                    event = event.name(),
                    key = %record.key,
                    previous = record.previous_value,
                    current = record.current_value,
                    pct = record.movement_percentage,
                    source = %record.source,
                    "Domain event"
                );
            }
            other => {
                info!(event = other.name(), "Domain event");
            }
        }
        // No subscribers is fine; send only fails when nobody listens.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let publisher = BroadcastPublisher::new(16);
        publisher.publish(DomainEvent::PollingStarted {
            source_id: "test-feed".to_string(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let publisher = BroadcastPublisher::new(16);
        let mut rx = publisher.subscribe();

        publisher.publish(DomainEvent::PollingStopped {
            source_id: "test-feed".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "polling_stopped");
    }
}
