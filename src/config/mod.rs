//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. The dedup
//! epsilon and the analysis heuristics (opportunity-cost rate,
//! risk-adjustment factor, significance threshold) are deliberately
//! configuration rather than constants: their stock values carry no
//! documented derivation, so operators can tune them without a rebuild.

pub mod hot_reload;
pub mod loader;

use serde::Deserialize;

use crate::ports::odds_source::{SourceDescriptor, SourceKind};

/// Top-level service configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Ingestion pipeline tuning.
  #[serde(default)]
  pub ingestion: IngestionConfig,
  /// Analyzer heuristics.
  #[serde(default)]
  pub analysis: AnalysisConfig,
  /// Registered odds sources.
  #[serde(default)]
  pub sources: Vec<SourceConfig>,
  /// Movement journal location.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Metrics/health endpoint.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Ingestion pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
  /// Absolute tolerance below which a re-transmitted price is a no-op.
  #[serde(default = "default_epsilon")]
  pub dedup_epsilon: f64,
  /// Upper bound on a single poll, including processing.
  #[serde(default = "default_poll_timeout")]
  pub poll_timeout_ms: u64,
  /// Buffer capacity for feed-kind sources.
  #[serde(default = "default_feed_buffer")]
  pub feed_buffer: usize,
}

impl Default for IngestionConfig {
  fn default() -> Self {
    Self {
      dedup_epsilon: default_epsilon(),
      poll_timeout_ms: default_poll_timeout(),
      feed_buffer: default_feed_buffer(),
    }
  }
}

/// Analyzer heuristics. Stock values match the documented estimates.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
  /// Absolute percentage at which a movement counts as significant.
  #[serde(default = "default_significance")]
  pub significance_threshold_pct: f64,
  /// Assumed improvement rate behind the opportunity-cost estimate.
  #[serde(default = "default_opportunity_rate")]
  pub opportunity_cost_rate: f64,
  /// Haircut applied to actual revenue for the risk-adjusted figure.
  #[serde(default = "default_risk_adjustment")]
  pub risk_adjustment_factor: f64,
  /// Number of markets listed in the report's activity rollup.
  #[serde(default = "default_top_markets")]
  pub top_markets: usize,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      significance_threshold_pct: default_significance(),
      opportunity_cost_rate: default_opportunity_rate(),
      risk_adjustment_factor: default_risk_adjustment(),
      top_markets: default_top_markets(),
    }
  }
}

/// One configured odds source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  /// Unique source identifier.
  pub source_id: String,
  /// Origin kind (api, feed, manual).
  pub kind: SourceKind,
  /// HTTP endpoint; required for api-kind sources.
  pub endpoint: Option<String>,
  /// Poll cadence in milliseconds.
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
  /// Whether polling starts on registration.
  #[serde(default = "default_true")]
  pub active: bool,
}

impl SourceConfig {
  /// Build the registration descriptor for this source.
  pub fn descriptor(&self) -> SourceDescriptor {
    SourceDescriptor {
      source_id: self.source_id.clone(),
      kind: self.kind,
      endpoint: self.endpoint.clone(),
      poll_interval_ms: self.poll_interval_ms,
      active: self.active,
    }
  }
}

/// Movement journal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Base directory for JSONL movement files.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

/// Metrics/health endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Listen address for /metrics, /live and /ready.
  #[serde(default = "default_listen_addr")]
  pub listen_addr: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      listen_addr: default_listen_addr(),
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_epsilon() -> f64 {
  0.001
}

fn default_poll_timeout() -> u64 {
  5_000
}

fn default_feed_buffer() -> usize {
  1_024
}

fn default_significance() -> f64 {
  5.0
}

fn default_opportunity_rate() -> f64 {
  0.05
}

fn default_risk_adjustment() -> f64 {
  0.98
}

fn default_top_markets() -> usize {
  5
}

fn default_poll_interval() -> u64 {
  10_000
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_listen_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_true() -> bool {
  true
}
