//! Ingestion Pipeline - Source Registry, Polling, and Dedup
//!
//! Owns the registry of odds sources and runs one independent periodic
//! task per active source. Incoming ticks are normalized, validated,
//! deduplicated against the latest stored movement, and persisted as
//! immutable `MovementRecord`s.
//!
//! Failure isolation: a failing or hung poll is logged and retried on
//! the source's next interval; it never affects other sources or stops
//! the scheduler. Within a batch, per-item failures are collected and
//! the valid subset still commits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::config::IngestionConfig;
use crate::domain::movement::{MarketKey, MovementRecord};
use crate::domain::odds::{self, OddsFormat};
use crate::ports::events::{DomainEvent, EventPublisher};
use crate::ports::metrics::PipelineMetrics;
use crate::ports::movement_store::MovementStore;
use crate::ports::odds_source::{OddsSource, OddsUpdate, SourceDescriptor};

/// Key-lock map size at which idle entries are swept.
const MAX_IDLE_KEY_LOCKS: usize = 1024;

/// Outcome of one `process_updates` batch.
///
/// Partial-failure semantics: `movements_created` counts the committed
/// subset even when `errors` is non-empty; `success` is true only for a
/// fully clean batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub success: bool,
    pub movements_created: usize,
    pub errors: Vec<String>,
    pub processing_time_ms: u64,
    pub source_id: String,
}

/// Handle for one running poll task.
struct PollHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Registry entry for one source.
struct SourceEntry {
    source: Arc<dyn OddsSource>,
    descriptor: SourceDescriptor,
    handle: Option<PollHandle>,
}

/// Ingestion pipeline instance.
///
/// Explicitly owned state, no process-wide registry: tests and embedders
/// can run several independent pipelines in one process.
pub struct IngestionPipeline {
    store: Arc<dyn MovementStore>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<dyn PipelineMetrics>,
    sources: RwLock<HashMap<String, SourceEntry>>,
    /// Per-key write locks serializing the fetch-latest/insert sequence.
    /// Two sources racing on the same key must not both read the same
    /// stale "latest" and insert duplicate records.
    key_locks: Mutex<HashMap<MarketKey, Arc<Mutex<()>>>>,
    epsilon: f64,
    poll_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn MovementStore>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<dyn PipelineMetrics>,
        config: &IngestionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            publisher,
            metrics,
            sources: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            epsilon: config.dedup_epsilon,
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
        })
    }

    /// Register a source under its descriptor's id.
    ///
    /// Re-registering an id replaces the previous source, stopping its
    /// poll task first. Polling starts immediately when the descriptor
    /// is active.
    #[instrument(skip(self, source), fields(source_id = %source.descriptor().source_id))]
    pub async fn register_source(self: &Arc<Self>, source: Arc<dyn OddsSource>) -> Result<()> {
        let descriptor = source.descriptor();
        let source_id = descriptor.source_id.clone();

        self.stop_polling(&source_id).await?;

        {
            let mut sources = self.sources.write().await;
            sources.insert(
                source_id.clone(),
                SourceEntry {
                    source,
                    descriptor: descriptor.clone(),
                    handle: None,
                },
            );
        }

        info!(kind = %descriptor.kind, active = descriptor.active, "Source registered");
        self.publisher.publish(DomainEvent::SourceRegistered {
            descriptor: descriptor.clone(),
        });

        if descriptor.active {
            self.start_polling(&source_id).await?;
        }
        Ok(())
    }

    /// Start the periodic poll task for a source. Idempotent: starting
    /// an already-polling source is a no-op.
    pub async fn start_polling(self: &Arc<Self>, source_id: &str) -> Result<()> {
        let mut sources = self.sources.write().await;
        let entry = sources
            .get_mut(source_id)
            .with_context(|| format!("unknown source: {source_id}"))?;

        if entry.handle.is_some() {
            debug!(source_id, "Polling already running");
            return Ok(());
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(Self::poll_loop(
            Arc::clone(self),
            Arc::clone(&entry.source),
            entry.descriptor.clone(),
            stop_rx,
        ));
        entry.handle = Some(PollHandle { stop_tx, task });

        let active = sources.values().filter(|e| e.handle.is_some()).count();
        self.metrics.active_sources(active as i64);

        info!(source_id, "Polling started");
        self.publisher.publish(DomainEvent::PollingStarted {
            source_id: source_id.to_string(),
        });
        Ok(())
    }

    /// Stop a source's poll task. Idempotent; unknown or already-stopped
    /// sources are a no-op.
    ///
    /// Waits for the task to exit before returning, so no further poll
    /// can begin after this call; an in-flight poll finishes and its
    /// results are still dedup-processed under the per-key locks.
    pub async fn stop_polling(&self, source_id: &str) -> Result<()> {
        let handle = {
            let mut sources = self.sources.write().await;
            let Some(entry) = sources.get_mut(source_id) else {
                return Ok(());
            };
            entry.handle.take()
        };

        let Some(handle) = handle else {
            return Ok(());
        };

        let _ = handle.stop_tx.send(true);
        if let Err(e) = handle.task.await {
            warn!(source_id, error = %e, "Poll task ended abnormally");
        }

        let active = {
            let sources = self.sources.read().await;
            sources.values().filter(|e| e.handle.is_some()).count()
        };
        self.metrics.active_sources(active as i64);

        info!(source_id, "Polling stopped");
        self.publisher.publish(DomainEvent::PollingStopped {
            source_id: source_id.to_string(),
        });
        Ok(())
    }

    /// Stop every running poll task; used during graceful shutdown.
    pub async fn stop_all(&self) -> Result<()> {
        let ids: Vec<String> = {
            let sources = self.sources.read().await;
            sources.keys().cloned().collect()
        };
        for id in ids {
            self.stop_polling(&id).await?;
        }
        Ok(())
    }

    /// Descriptors of all registered sources, polling or not.
    pub async fn registered_sources(&self) -> Vec<SourceDescriptor> {
        let sources = self.sources.read().await;
        sources.values().map(|e| e.descriptor.clone()).collect()
    }

    /// Apply an updated descriptor to an already-registered source.
    ///
    /// Restarts the poll task so interval and active changes take
    /// effect; an unchanged descriptor is a no-op. Returns `Ok(false)`
    /// when no source is registered under the descriptor's id, leaving
    /// the caller to register one.
    #[instrument(skip(self, descriptor), fields(source_id = %descriptor.source_id))]
    pub async fn apply_descriptor(self: &Arc<Self>, descriptor: SourceDescriptor) -> Result<bool> {
        let current = {
            let sources = self.sources.read().await;
            match sources.get(&descriptor.source_id) {
                Some(entry) => entry.descriptor.clone(),
                None => return Ok(false),
            }
        };
        if current == descriptor {
            return Ok(true);
        }

        self.stop_polling(&descriptor.source_id).await?;
        {
            let mut sources = self.sources.write().await;
            if let Some(entry) = sources.get_mut(&descriptor.source_id) {
                entry.descriptor = descriptor.clone();
            }
        }
        info!(
            active = descriptor.active,
            interval_ms = descriptor.poll_interval_ms,
            "Source descriptor updated"
        );

        if descriptor.active {
            self.start_polling(&descriptor.source_id).await?;
        }
        Ok(true)
    }

    /// One source's poll loop. Polls do not overlap within a source:
    /// the interval tick waits for the previous iteration, and
    /// `MissedTickBehavior::Delay` absorbs slow polls instead of
    /// bursting to catch up.
    async fn poll_loop(
        pipeline: Arc<Self>,
        source: Arc<dyn OddsSource>,
        descriptor: SourceDescriptor,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let source_id = descriptor.source_id;
        let mut ticker =
            tokio::time::interval(Duration::from_millis(descriptor.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick fires immediately; consume it so the
        // first real poll happens one interval after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    debug!(source_id, "Poll loop stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if *stop_rx.borrow() {
                        return;
                    }
                    pipeline.poll_once(&source, &source_id).await;
                }
            }
        }
    }

    /// Run one bounded poll and process its batch. All failures are
    /// contained here; the loop always proceeds to the next tick.
    async fn poll_once(&self, source: &Arc<dyn OddsSource>, source_id: &str) {
        let started = Instant::now();

        match tokio::time::timeout(self.poll_timeout, source.poll()).await {
            Ok(Ok(updates)) => {
                if !updates.is_empty() {
                    let result = self.process_updates(updates, source_id).await;
                    debug!(
                        source_id,
                        created = result.movements_created,
                        errors = result.errors.len(),
                        "Poll batch processed"
                    );
                }
                self.metrics.poll_succeeded(source_id, started.elapsed());
            }
            Ok(Err(e)) => {
                warn!(source_id, error = %e, "Poll failed");
                self.metrics.poll_failed(source_id);
            }
            Err(_) => {
                warn!(
                    source_id,
                    timeout_ms = self.poll_timeout.as_millis() as u64,
                    "Poll timed out"
                );
                self.metrics.poll_failed(source_id);
            }
        }
    }

    /// Normalize, dedup, and persist a batch of updates.
    ///
    /// Reachable directly for manual/backfill ingestion, bypassing
    /// polling. Per-item failures (malformed values, store errors) go
    /// into the error list while the rest of the batch commits.
    #[instrument(skip(self, updates), fields(batch = updates.len()))]
    pub async fn process_updates(
        &self,
        updates: Vec<OddsUpdate>,
        source_id: &str,
    ) -> IngestionResult {
        let started = Instant::now();
        let mut created = 0usize;
        let mut deduplicated = 0u64;
        let mut errors = Vec::new();

        for update in updates {
            let key = update.key();
            match self.apply_update(update, source_id).await {
                Ok(true) => created += 1,
                Ok(false) => deduplicated += 1,
                Err(e) => {
                    self.metrics.updates_rejected(source_id, 1);
                    errors.push(format!("{key}: {e:#}"));
                }
            }
        }

        if created > 0 {
            self.metrics.movements_recorded(source_id, created as u64);
        }
        if deduplicated > 0 {
            self.metrics.updates_deduplicated(source_id, deduplicated);
        }

        IngestionResult {
            success: errors.is_empty(),
            movements_created: created,
            errors,
            processing_time_ms: started.elapsed().as_millis() as u64,
            source_id: source_id.to_string(),
        }
    }

    /// Apply one update under its key's write lock.
    ///
    /// Returns `Ok(true)` when a record was created, `Ok(false)` for a
    /// within-epsilon no-op.
    async fn apply_update(&self, update: OddsUpdate, source_id: &str) -> Result<bool> {
        let parsed = odds::parse_value(update.format, &update.value)?;
        let key = update.key();

        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let latest = self
            .store
            .latest_for_key(&key)
            .await
            .context("failed to read latest movement")?;

        let (format, previous, current) = match latest {
            Some(latest) if latest.odds_format == update.format => {
                if (latest.current_value - parsed).abs() < self.epsilon {
                    debug!(key = %key, value = parsed, "Update within epsilon, skipping");
                    return Ok(false);
                }
                (update.format, latest.current_value, parsed)
            }
            // The feed switched notation for this key. Raw values are
            // not comparable across notations, so dedup and record on
            // decimal equivalents: a pure re-notation of the same price
            // stays a no-op.
            Some(latest) => {
                let prev_decimal = latest.current_decimal();
                let cur_decimal = odds::to_decimal(update.format, parsed)?;
                if (prev_decimal - cur_decimal).abs() < self.epsilon {
                    debug!(key = %key, "Notation change without price change, skipping");
                    return Ok(false);
                }
                (OddsFormat::Decimal, prev_decimal, cur_decimal)
            }
            // First observation for this key: record a baseline with
            // previous == current so later ticks have a dedup anchor.
            None => (update.format, parsed, parsed),
        };

        let record = MovementRecord::new(
            key,
            format,
            previous,
            current,
            update.observed_at,
            source_id,
            update.metadata,
        )?;

        self.store
            .insert(record.clone())
            .await
            .context("failed to persist movement")?;

        self.publisher
            .publish(DomainEvent::MovementRecorded { record });
        Ok(true)
    }

    /// Fetch or create the write lock for a key.
    ///
    /// The map is pruned of idle locks (no holder besides the map
    /// itself) once it crosses `MAX_IDLE_KEY_LOCKS`, so long-running
    /// processes do not accumulate one entry per key ever seen.
    async fn key_lock(&self, key: &MarketKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        if locks.len() >= MAX_IDLE_KEY_LOCKS {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Synthetic time-ordered updates for exercising the pipeline and
    /// analyzers without a live feed.
    ///
    /// Emits a small random walk per (event, market, selection) spread
    /// over the trailing `days_back` days, in decimal format.
    pub fn generate_sample_updates(event_count: usize, days_back: i64) -> Vec<OddsUpdate> {
        const TICKS_PER_SELECTION: usize = 12;

        let mut rng = rand::thread_rng();
        let mut updates = Vec::new();
        let now = Utc::now();
        let span_minutes = days_back.max(1) * 24 * 60;

        for event in 0..event_count {
            let event_id = format!("evt-{}", event + 1);
            for selection in ["home", "away"] {
                let mut value: f64 = rng.gen_range(1.5..3.5);
                for tick in 0..TICKS_PER_SELECTION {
                    let offset = span_minutes * (TICKS_PER_SELECTION - tick) as i64
                        / TICKS_PER_SELECTION as i64;
                    // Walk by up to ±4% per step, floored above 1.01.
                    let step: f64 = rng.gen_range(-0.04..0.04);
                    value = (value * (1.0 + step)).max(1.01);

                    updates.push(OddsUpdate {
                        event_id: event_id.clone(),
                        market_id: "match-winner".to_string(),
                        selection_id: selection.to_string(),
                        format: OddsFormat::Decimal,
                        value: format!("{value:.3}"),
                        observed_at: now - ChronoDuration::minutes(offset),
                        metadata: Default::default(),
                    });
                }
            }
        }

        updates.sort_by_key(|u| u.observed_at);
        updates
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::adapters::persistence::MemoryMovementStore;
    use crate::config::IngestionConfig;
    use crate::domain::odds::MovementKind;
    use crate::ports::events::NullPublisher;
    use crate::ports::metrics::NoopMetrics;

    fn pipeline_with(epsilon: f64) -> (Arc<IngestionPipeline>, Arc<MemoryMovementStore>) {
        let store = Arc::new(MemoryMovementStore::new());
        let config = IngestionConfig {
            dedup_epsilon: epsilon,
            ..IngestionConfig::default()
        };
        let pipeline = IngestionPipeline::new(
            Arc::clone(&store) as Arc<dyn MovementStore>,
            Arc::new(NullPublisher),
            Arc::new(NoopMetrics),
            &config,
        );
        (pipeline, store)
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
    async fn first_observation_creates_baseline() {
        let (pipeline, store) = pipeline_with(0.001);

        let result = pipeline.process_updates(vec![update("2.0")], "test-feed").await;
        assert!(result.success);
        assert_eq!(result.movements_created, 1);

        let latest = store
            .latest_for_key(&MarketKey::new("evt-1", "match-winner", "home"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.previous_value, 2.0);
        assert_eq!(latest.current_value, 2.0);
    }

    #[tokio::test]
    async fn identical_resubmission_is_deduplicated() {
        let (pipeline, _store) = pipeline_with(0.001);

        let first = pipeline.process_updates(vec![update("2.0")], "test-feed").await;
        let second = pipeline.process_updates(vec![update("2.0")], "test-feed").await;

        assert_eq!(first.movements_created, 1, "baseline record");
        assert_eq!(second.movements_created, 0, "exact duplicate is a no-op");
    }

    #[tokio::test]
    async fn epsilon_threshold_gates_record_creation() {
        let (pipeline, _store) = pipeline_with(0.01);
        pipeline.process_updates(vec![update("2.0")], "test-feed").await;

        let below = pipeline
            .process_updates(vec![update("2.005")], "test-feed")
            .await;
        assert_eq!(below.movements_created, 0, "below epsilon");

        let above = pipeline.process_updates(vec![update("2.02")], "test-feed").await;
        assert_eq!(above.movements_created, 1, "above epsilon");
    }

    #[tokio::test]
    async fn notation_switch_compares_decimal_equivalents() {
        let (pipeline, store) = pipeline_with(0.001);

        let mut american = update("+100");
        american.format = OddsFormat::American;
        pipeline.process_updates(vec![american], "test-feed").await;

        // Same price re-quoted in decimal: +100 and 2.0 are equal.
        let renotated = pipeline.process_updates(vec![update("2.0")], "test-feed").await;
        assert_eq!(renotated.movements_created, 0, "pure re-notation is a no-op");

        // A genuine move quoted in the new notation.
        let moved = pipeline.process_updates(vec![update("1.8")], "test-feed").await;
        assert_eq!(moved.movements_created, 1);

        let latest = store
            .latest_for_key(&MarketKey::new("evt-1", "match-winner", "home"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.odds_format, OddsFormat::Decimal);
        assert_eq!(latest.previous_value, 2.0);
        assert_eq!(latest.current_value, 1.8);
        assert_eq!(latest.movement_kind, MovementKind::Decrease);
    }

    #[tokio::test]
    async fn idle_key_locks_are_pruned() {
        let (pipeline, _store) = pipeline_with(0.001);

        let total = MAX_IDLE_KEY_LOCKS + 100;
        let updates: Vec<OddsUpdate> = (0..total)
            .map(|i| {
                let mut u = update("2.0");
                u.selection_id = format!("sel-{i}");
                u
            })
            .collect();

        let result = pipeline.process_updates(updates, "test-feed").await;
        assert_eq!(result.movements_created, total);

        let locks = pipeline.key_locks.lock().await.len();
        assert!(locks < MAX_IDLE_KEY_LOCKS, "idle locks swept, got {locks}");
    }

    #[tokio::test]
    async fn malformed_items_fail_individually() {
        let (pipeline, store) = pipeline_with(0.001);

        let mut fractional = update("bad-fraction");
        fractional.format = OddsFormat::Fractional;
        fractional.selection_id = "draw".to_string();

        let mut away = update("1.8");
        away.selection_id = "away".to_string();

        let result = pipeline
            .process_updates(vec![update("2.0"), fractional, away], "test-feed")
            .await;

        assert!(!result.success);
        assert_eq!(result.movements_created, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("draw"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn sample_updates_are_time_ordered() {
        let updates = IngestionPipeline::generate_sample_updates(3, 7);
        assert_eq!(updates.len(), 3 * 2 * 12);
        assert!(updates.windows(2).all(|w| w[0].observed_at <= w[1].observed_at));
        for u in &updates {
            assert!(odds::parse_value(u.format, &u.value).unwrap() > 1.0);
        }
    }

    #[tokio::test]
    async fn sample_updates_drive_the_pipeline() {
        let (pipeline, store) = pipeline_with(0.001);
        let updates = IngestionPipeline::generate_sample_updates(2, 3);

        let result = pipeline.process_updates(updates, "sample").await;
        assert!(result.success);
        assert!(result.movements_created > 0);
        assert_eq!(store.len().await, result.movements_created);
    }
}
