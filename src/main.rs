//! Oddsflow — Entry Point
//!
//! Initializes configuration, logging, the movement journal, and the
//! ingestion pipeline. Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open the JSONL movement journal (recovers prior records)
//! 4. Create the broadcast event publisher + prometheus registry
//! 5. Spawn the observability server (/metrics, /live, /ready)
//! 6. Register configured API sources with the pipeline
//! 7. Spawn the config hot-reload watcher; reloads reconcile the
//!    pipeline's source set against the new config
//! 8. Wait for SIGINT → graceful shutdown (stop polls→drain→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::events::BroadcastPublisher;
use adapters::metrics::MetricsRegistry;
use adapters::persistence::JsonlMovementStore;
use adapters::sources::ApiOddsSource;
use config::hot_reload::ConfigWatcher;
use ports::odds_source::SourceKind;
use usecases::ingestion::IngestionPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        sources = config.sources.len(),
        "Starting oddsflow"
    );

    // ── 3. Shutdown signal channels ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let (ready_tx, ready_rx) = watch::channel(true);

    // ── 4. Open the movement journal ────────────────────────
    let store = Arc::new(
        JsonlMovementStore::open(&config.persistence.data_dir)
            .await
            .context("Failed to open movement journal")?,
    );

    // ── 5. Event publisher + metrics registry ───────────────
    let publisher = Arc::new(BroadcastPublisher::new(1024));
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics registry")?);

    // ── 6. Spawn observability server ───────────────────────
    let metrics_handle = tokio::spawn(adapters::metrics::serve(
        config.metrics.listen_addr.clone(),
        Arc::clone(&metrics),
        ready_rx,
        shutdown_tx.subscribe(),
    ));

    // ── 7. Build the pipeline and register configured sources ─
    let pipeline = IngestionPipeline::new(
        Arc::clone(&store) as Arc<dyn ports::movement_store::MovementStore>,
        Arc::clone(&publisher) as Arc<dyn ports::events::EventPublisher>,
        Arc::clone(&metrics) as Arc<dyn ports::metrics::PipelineMetrics>,
        &config.ingestion,
    );

    let request_timeout = Duration::from_millis(config.ingestion.poll_timeout_ms);
    for source in &config.sources {
        match source.kind {
            SourceKind::Api => {
                let api = ApiOddsSource::new(source.descriptor(), request_timeout)
                    .with_context(|| format!("Failed to build source {}", source.source_id))?;
                pipeline.register_source(Arc::new(api)).await?;
            }
            // Feed and manual sources carry a programmatic input end
            // (a channel sender or a submit handle) and are wired by
            // embedding callers, not by the standalone binary.
            SourceKind::Feed | SourceKind::Manual => {
                warn!(
                    source_id = %source.source_id,
                    kind = ?source.kind,
                    "Skipping non-API source in standalone mode"
                );
            }
        }
    }

    // ── 8. Spawn config hot-reload watcher ──────────────────
    let (mut watcher, mut config_rx) = ConfigWatcher::new("config.toml", config.clone());
    let watcher_shutdown = shutdown_tx.subscribe();
    let watcher_handle = tokio::spawn(async move {
        watcher.run(watcher_shutdown).await;
    });
    let reload_pipeline = Arc::clone(&pipeline);
    let reload_handle = tokio::spawn(async move {
        while config_rx.changed().await.is_ok() {
            let updated = config_rx.borrow().clone();
            info!(
                dedup_epsilon = updated.ingestion.dedup_epsilon,
                significance = updated.analysis.significance_threshold_pct,
                sources = updated.sources.len(),
                "Configuration reloaded"
            );
            reconcile_sources(&reload_pipeline, &updated.sources, request_timeout).await;
        }
    });

    info!("All tasks spawned — oddsflow is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown ───────────────────────────────────

    // 1. Signal all tasks to stop
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // 2. Mark readiness false (readiness probe → 503)
    let _ = ready_tx.send(false);

    // 3. Stop all source polls; each in-flight poll finishes first
    if let Err(e) = pipeline.stop_all().await {
        error!(error = %e, "Failed to stop some source polls");
    }

    // 4. Wait for background tasks (bounded)
    let _ = tokio::time::timeout(Duration::from_secs(5), watcher_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reload_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), metrics_handle).await;

    info!("Shutdown complete");
    Ok(())
}

/// Bring the pipeline's source set in line with a reloaded config.
///
/// Sources dropped from the config stop polling; new or changed API
/// descriptors are (re)registered with a fresh client so endpoint
/// changes take effect; interval and active changes on other kinds go
/// through `apply_descriptor`.
async fn reconcile_sources(
    pipeline: &Arc<IngestionPipeline>,
    configured: &[config::SourceConfig],
    request_timeout: Duration,
) {
    let registered = pipeline.registered_sources().await;

    for descriptor in &registered {
        if !configured.iter().any(|s| s.source_id == descriptor.source_id) {
            info!(source_id = %descriptor.source_id, "Source removed from configuration");
            if let Err(e) = pipeline.stop_polling(&descriptor.source_id).await {
                warn!(source_id = %descriptor.source_id, error = %e, "Failed to stop removed source");
            }
        }
    }

    for source in configured {
        let desired = source.descriptor();
        if registered.iter().any(|d| *d == desired) {
            continue;
        }
        match source.kind {
            // A rebuilt client picks up endpoint changes too.
            SourceKind::Api => match ApiOddsSource::new(desired, request_timeout) {
                Ok(api) => {
                    if let Err(e) = pipeline.register_source(Arc::new(api)).await {
                        warn!(source_id = %source.source_id, error = %e, "Failed to re-register source");
                    }
                }
                Err(e) => {
                    warn!(source_id = %source.source_id, error = %e, "Failed to rebuild source");
                }
            },
            // Feed/manual sources carry programmatic input ends and
            // cannot be constructed from config; only descriptor
            // changes on an existing registration apply.
            SourceKind::Feed | SourceKind::Manual => {
                match pipeline.apply_descriptor(desired).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(
                            source_id = %source.source_id,
                            "Cannot add non-API source from configuration"
                        );
                    }
                    Err(e) => {
                        warn!(source_id = %source.source_id, error = %e, "Failed to update source");
                    }
                }
            }
        }
    }
}
