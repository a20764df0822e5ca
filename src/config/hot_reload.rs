//! Config Hot-Reload — Watch config.toml for Source Changes
//!
//! Periodically re-reads config.toml and compares with the current
//! contents. If changes are detected, broadcasts the new config via a
//! `tokio::sync::watch` channel. The main wiring subscribes and applies
//! source descriptor changes (new sources, active toggles) to the
//! ingestion pipeline without a restart.

use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::AppConfig;

/// Watches config.toml for changes and broadcasts updates.
///
/// Polls the config file (not a filesystem watcher, which has
/// portability issues across Linux/macOS/Docker volumes). Compares
/// content hashes to detect meaningful changes.
pub struct ConfigWatcher {
    /// Path to config.toml.
    config_path: String,
    /// Watch channel sender for config updates.
    config_tx: watch::Sender<AppConfig>,
    /// Last known content hash (for diff detection).
    last_hash: Option<u64>,
    /// Poll cadence.
    check_interval: Duration,
}

impl ConfigWatcher {
    /// Create a new config watcher checking every 60 seconds.
    ///
    /// Returns the watcher and a `watch::Receiver` that consumers use
    /// to get notified of config changes.
    pub fn new(
        config_path: &str,
        initial_config: AppConfig,
    ) -> (Self, watch::Receiver<AppConfig>) {
        let (config_tx, config_rx) = watch::channel(initial_config);

        let watcher = Self {
            config_path: config_path.to_string(),
            config_tx,
            last_hash: None,
            check_interval: Duration::from_secs(60),
        };

        (watcher, config_rx)
    }

    /// Run the config watcher loop until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            path = %self.config_path,
            interval_secs = self.check_interval.as_secs(),
            "Config watcher started"
        );

        self.last_hash = self.compute_hash().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Config watcher shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.check_interval) => {
                    self.check_and_reload().await;
                }
            }
        }
    }

    /// Check if config has changed and reload if so.
    async fn check_and_reload(&mut self) {
        let new_hash = self.compute_hash().await;

        if new_hash == self.last_hash {
            debug!("Config unchanged");
            return;
        }

        info!("Config change detected, reloading...");

        match super::loader::load_config(&self.config_path) {
            Ok(new_config) => {
                self.last_hash = new_hash;
                if self.config_tx.send(new_config).is_err() {
                    warn!("No config watchers — update dropped");
                } else {
                    info!("Config reloaded successfully");
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to reload config — keeping current"
                );
            }
        }
    }

    /// Hash of the config file contents for diff detection.
    async fn compute_hash(&self) -> Option<u64> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let content = tokio::fs::read_to_string(&self.config_path)
            .await
            .ok()?;

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Some(hasher.finish())
    }
}
