//! Pipeline Metrics Port - Ingestion Observability Hooks
//!
//! Thin trait so the pipeline can record counters without depending on
//! a concrete metrics backend. The Prometheus adapter implements it;
//! tests use the no-op.

use std::time::Duration;

/// Ingestion counters and gauges.
pub trait PipelineMetrics: Send + Sync + 'static {
    /// A poll completed; `duration` is wall time including processing.
    fn poll_succeeded(&self, source_id: &str, duration: Duration);

    /// A poll failed or timed out.
    fn poll_failed(&self, source_id: &str);

    /// Movement records persisted from one batch.
    fn movements_recorded(&self, source_id: &str, count: u64);

    /// Updates dropped as duplicates (within epsilon of the latest).
    fn updates_deduplicated(&self, source_id: &str, count: u64);

    /// Updates rejected by validation.
    fn updates_rejected(&self, source_id: &str, count: u64);

    /// Number of sources currently polling.
    fn active_sources(&self, count: i64);
}

/// Metrics sink that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl PipelineMetrics for NoopMetrics {
    fn poll_succeeded(&self, _source_id: &str, _duration: Duration) {}
    fn poll_failed(&self, _source_id: &str) {}
    fn movements_recorded(&self, _source_id: &str, _count: u64) {}
    fn updates_deduplicated(&self, _source_id: &str, _count: u64) {}
    fn updates_rejected(&self, _source_id: &str, _count: u64) {}
    fn active_sources(&self, _count: i64) {}
}
