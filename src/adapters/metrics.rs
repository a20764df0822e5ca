//! Prometheus Metrics and Health Server - Pipeline Observability
//!
//! Registers the `oddsflow_*` metric families and serves them together
//! with liveness/readiness probes on one axum listener. Implements the
//! `PipelineMetrics` port so the ingestion pipeline stays unaware of
//! the backend.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use crate::ports::metrics::PipelineMetrics;

/// Centralized Prometheus metrics for the ingestion pipeline.
///
/// All metrics follow the naming convention `oddsflow_*` and include a
/// `source` label for per-feed filtering.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Poll wall-time histogram (milliseconds).
    pub poll_duration_ms: HistogramVec,
    /// Total failed polls counter.
    pub poll_failures: IntCounterVec,
    /// Total movement records persisted.
    pub movements_recorded: IntCounterVec,
    /// Total updates dropped as duplicates.
    pub updates_deduplicated: IntCounterVec,
    /// Total updates rejected by validation.
    pub updates_rejected: IntCounterVec,
    /// Number of sources currently polling.
    pub active_sources: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let poll_duration_ms = HistogramVec::new(
            HistogramOpts::new(
                "oddsflow_poll_duration_ms",
                "Poll wall time in milliseconds, including processing",
            )
            .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
            &["source"],
        )?;

        let poll_failures = IntCounterVec::new(
            Opts::new("oddsflow_poll_failures_total", "Total failed polls"),
            &["source"],
        )?;

        let movements_recorded = IntCounterVec::new(
            Opts::new(
                "oddsflow_movements_recorded_total",
                "Total movement records persisted",
            ),
            &["source"],
        )?;

        let updates_deduplicated = IntCounterVec::new(
            Opts::new(
                "oddsflow_updates_deduplicated_total",
                "Total updates dropped as within-epsilon duplicates",
            ),
            &["source"],
        )?;

        let updates_rejected = IntCounterVec::new(
            Opts::new(
                "oddsflow_updates_rejected_total",
                "Total updates rejected by validation",
            ),
            &["source"],
        )?;

        let active_sources = IntGauge::new(
            "oddsflow_active_sources",
            "Number of sources currently polling",
        )?;

        registry.register(Box::new(poll_duration_ms.clone()))?;
        registry.register(Box::new(poll_failures.clone()))?;
        registry.register(Box::new(movements_recorded.clone()))?;
        registry.register(Box::new(updates_deduplicated.clone()))?;
        registry.register(Box::new(updates_rejected.clone()))?;
        registry.register(Box::new(active_sources.clone()))?;

        Ok(Self {
            registry,
            poll_duration_ms,
            poll_failures,
            movements_recorded,
            updates_deduplicated,
            updates_rejected,
            active_sources,
        })
    }

    /// Render the current metric families in the text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl PipelineMetrics for MetricsRegistry {
    fn poll_succeeded(&self, source_id: &str, duration: Duration) {
        self.poll_duration_ms
            .with_label_values(&[source_id])
            .observe(duration.as_secs_f64() * 1000.0);
    }

    fn poll_failed(&self, source_id: &str) {
        self.poll_failures.with_label_values(&[source_id]).inc();
    }

    fn movements_recorded(&self, source_id: &str, count: u64) {
        self.movements_recorded
            .with_label_values(&[source_id])
            .inc_by(count);
    }

    fn updates_deduplicated(&self, source_id: &str, count: u64) {
        self.updates_deduplicated
            .with_label_values(&[source_id])
            .inc_by(count);
    }

    fn updates_rejected(&self, source_id: &str, count: u64) {
        self.updates_rejected
            .with_label_values(&[source_id])
            .inc_by(count);
    }

    fn active_sources(&self, count: i64) {
        self.active_sources.set(count);
    }
}

/// Shared state for the observability endpoints.
#[derive(Clone)]
struct ServerState {
    metrics: Arc<MetricsRegistry>,
    ready_rx: watch::Receiver<bool>,
}

/// Serve `/metrics`, `/live` and `/ready` until shutdown.
///
/// `/ready` flips to 503 when the readiness flag goes false during
/// graceful shutdown, draining load balancer traffic before exit.
#[instrument(skip(metrics, ready_rx, shutdown_rx))]
pub async fn serve(
    bind_address: String,
    metrics: Arc<MetricsRegistry>,
    ready_rx: watch::Receiver<bool>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let state = ServerState { metrics, ready_rx };

    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .route("/live", get(|| async { StatusCode::OK }))
        .route("/ready", get(readiness))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Observability server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    Ok(())
}

async fn render_metrics(State(state): State<ServerState>) -> impl IntoResponse {
    state.metrics.render()
}

async fn readiness(State(state): State<ServerState>) -> impl IntoResponse {
    if *state.ready_rx.borrow() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
