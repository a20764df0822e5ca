//! Event Publisher Port - Domain Event Fan-out
//!
//! The core publishes named events at each business milestone. Delivery
//! is at-most-once best-effort: durability and retry are the event bus's
//! concern, so the trait is synchronous and infallible at this boundary.
//! The publisher is injected explicitly; there is no process-wide bus.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::movement::{MarketKey, MovementRecord};
use crate::domain::timing::{OddsPosition, RiskLevel, TimingCategory};

use super::odds_source::SourceDescriptor;

/// Events published by the analytics core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    SourceRegistered {
        descriptor: SourceDescriptor,
    },
    PollingStarted {
        source_id: String,
    },
    PollingStopped {
        source_id: String,
    },
    MovementRecorded {
        record: MovementRecord,
    },
    TimingAnalyzed {
        bet_id: String,
        key: MarketKey,
        timing: TimingCategory,
        odds_position: OddsPosition,
        potential_savings: Decimal,
        risk: RiskLevel,
    },
    MarketImpactAnalyzed {
        event_id: String,
        market_id: String,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        efficiency_score: f64,
        opportunity_cost: Decimal,
    },
    ReportGenerated {
        report_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        total_movements: usize,
        recommendations: usize,
    },
}

impl DomainEvent {
    /// Stable event name for logging and routing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceRegistered { .. } => "source_registered",
            Self::PollingStarted { .. } => "polling_started",
            Self::PollingStopped { .. } => "polling_stopped",
            Self::MovementRecorded { .. } => "movement_recorded",
            Self::TimingAnalyzed { .. } => "timing_analyzed",
            Self::MarketImpactAnalyzed { .. } => "market_impact_analyzed",
            Self::ReportGenerated { .. } => "report_generated",
        }
    }
}

/// Trait for domain event sinks.
pub trait EventPublisher: Send + Sync + 'static {
    /// Publish one event. Best-effort: implementations must not block
    /// the caller on slow or absent subscribers.
    fn publish(&self, event: DomainEvent);
}

/// Publisher that drops everything. Useful in tests and for callers
/// that run the analyzers without an event bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: DomainEvent) {}
}
