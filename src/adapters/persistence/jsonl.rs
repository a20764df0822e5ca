//! JSONL Movement Journal - Durable Append-only Store
//!
//! Persists movement records to daily JSONL files in the format
//! `movements/YYYY-MM-DD.jsonl` (partitioned by observation date so
//! backfill lands in its natural file). Each line is a self-contained
//! JSON record for easy parsing, streaming, and crash recovery.
//!
//! Reads are served by an in-memory index rebuilt from the journal at
//! startup; malformed lines are skipped with a warning rather than
//! failing recovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::movement::{MarketKey, MovementRecord};
use crate::ports::movement_store::{MarketActivity, MovementStore};

use super::memory::MemoryMovementStore;

/// Journal-backed movement store with an in-memory read index.
pub struct JsonlMovementStore {
    /// Directory holding the daily JSONL files.
    movements_dir: PathBuf,
    /// Read index rebuilt from the journal on startup.
    index: MemoryMovementStore,
}

impl JsonlMovementStore {
    /// Open (or create) the journal under `data_dir` and rebuild the
    /// read index from any existing files.
    pub async fn open(data_dir: &str) -> Result<Self> {
        let movements_dir = Path::new(data_dir).join("movements");
        fs::create_dir_all(&movements_dir)
            .await
            .context("Failed to create movements directory")?;

        let store = Self {
            movements_dir,
            index: MemoryMovementStore::new(),
        };
        store.recover().await?;
        Ok(store)
    }

    /// Rebuild the in-memory index from all journal files.
    #[instrument(skip(self))]
    async fn recover(&self) -> Result<()> {
        let mut loaded = 0usize;
        let mut entries = fs::read_dir(&self.movements_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "jsonl") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<MovementRecord>(line) {
                    Ok(record) => {
                        self.index.insert(record).await?;
                        loaded += 1;
                    }
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            error = %e,
                            "Skipping malformed movement record"
                        );
                    }
                }
            }
        }

        info!(count = loaded, "Recovered movement journal");
        Ok(())
    }

    /// Append one record to its daily journal file.
    async fn append(&self, record: &MovementRecord) -> Result<()> {
        let date = record.observed_at.format("%Y-%m-%d").to_string();
        let path = self.movements_dir.join(format!("{date}.jsonl"));

        let mut json =
            serde_json::to_string(record).context("Failed to serialize movement record")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open movement journal file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write movement record")?;
        file.flush().await.context("Failed to flush movement journal")?;

        Ok(())
    }
}

#[async_trait]
impl MovementStore for JsonlMovementStore {
    async fn insert(&self, record: MovementRecord) -> Result<()> {
        // Journal first: a crash between the two leaves the record
        // recoverable, never acknowledged-but-lost.
        self.append(&record).await?;
        self.index.insert(record).await
    }

    async fn latest_for_key(&self, key: &MarketKey) -> Result<Option<MovementRecord>> {
        self.index.latest_for_key(key).await
    }

    async fn movements_before(
        &self,
        key: &MarketKey,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MovementRecord>> {
        self.index.movements_before(key, cutoff).await
    }

    async fn movements_in_range(
        &self,
        event_id: &str,
        market_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MovementRecord>> {
        self.index
            .movements_in_range(event_id, market_id, start, end)
            .await
    }

    async fn movements_in_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MovementRecord>> {
        self.index.movements_in_period(start, end).await
    }

    async fn count_by_market(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarketActivity>> {
        self.index.count_by_market(start, end).await
    }

    async fn is_healthy(&self) -> bool {
        let test_path = self.movements_dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}
