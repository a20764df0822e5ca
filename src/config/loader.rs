//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::ports::odds_source::SourceKind;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  Ok(config)
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.is_empty(),
    "Service name must not be empty"
  );

  // Ingestion validation
  anyhow::ensure!(
    config.ingestion.dedup_epsilon > 0.0,
    "dedup_epsilon must be positive, got {}",
    config.ingestion.dedup_epsilon
  );
  anyhow::ensure!(
    config.ingestion.poll_timeout_ms > 0,
    "poll_timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.ingestion.feed_buffer > 0,
    "feed_buffer must be positive"
  );

  // Analysis validation
  anyhow::ensure!(
    config.analysis.significance_threshold_pct > 0.0,
    "significance_threshold_pct must be positive, got {}",
    config.analysis.significance_threshold_pct
  );
  anyhow::ensure!(
    config.analysis.opportunity_cost_rate >= 0.0
      && config.analysis.opportunity_cost_rate < 1.0,
    "opportunity_cost_rate must be in [0, 1), got {}",
    config.analysis.opportunity_cost_rate
  );
  anyhow::ensure!(
    config.analysis.risk_adjustment_factor > 0.0
      && config.analysis.risk_adjustment_factor <= 1.0,
    "risk_adjustment_factor must be in (0, 1], got {}",
    config.analysis.risk_adjustment_factor
  );
  anyhow::ensure!(
    config.analysis.top_markets > 0,
    "top_markets must be positive"
  );

  // Source validation
  let mut seen = HashSet::new();
  for (i, source) in config.sources.iter().enumerate() {
    anyhow::ensure!(
      !source.source_id.is_empty(),
      "Source {} has empty source_id",
      i
    );
    anyhow::ensure!(
      seen.insert(source.source_id.as_str()),
      "Duplicate source_id: {}",
      source.source_id
    );
    anyhow::ensure!(
      source.poll_interval_ms >= 100,
      "Source {} poll_interval_ms must be >= 100, got {}",
      source.source_id,
      source.poll_interval_ms
    );
    if source.kind == SourceKind::Api {
      anyhow::ensure!(
        source.endpoint.as_deref().is_some_and(|e| !e.is_empty()),
        "Api source {} requires an endpoint",
        source.source_id
      );
    }
  }

  Ok(())
}
