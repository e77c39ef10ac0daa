//! Pipeline configuration
//!
//! Every field has a default, so a JSON document only needs to name what
//! it overrides. Invalid values are rejected before a pipeline is built.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::fee::FeeSchedule;

use crate::metrics::DEFAULT_RING_CAPACITY;
use crate::models::impact::{DEFAULT_EPSILON, DEFAULT_GAMMA};
use crate::rolling::DEFAULT_WINDOW;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Trade-cost pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rolling volatility window in seconds
    pub window_duration_secs: u64,
    /// Almgren–Chriss temporary impact coefficient
    pub gamma: f64,
    /// Almgren–Chriss permanent impact coefficient
    pub epsilon: f64,
    pub fee_schedule: FeeSchedule,
    /// Samples retained per latency metric
    pub latency_ring_capacity: usize,
    /// Levels per side read by the estimators
    pub top_n_depth: usize,
    /// Advisory per-tick compute budget; overruns are logged and counted
    pub max_tick_budget_ms: f64,
    /// Clear the book and await a snapshot on a sequence gap
    pub resync_on_gap: bool,
    /// Seed for the fallback model fits
    pub model_seed: u64,
    /// Levels per side covered by the book checksum
    pub checksum_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_duration_secs: DEFAULT_WINDOW.as_secs(),
            gamma: DEFAULT_GAMMA,
            epsilon: DEFAULT_EPSILON,
            fee_schedule: FeeSchedule::default(),
            latency_ring_capacity: DEFAULT_RING_CAPACITY,
            top_n_depth: 10,
            max_tick_budget_ms: 5.0,
            resync_on_gap: true,
            model_seed: 42,
            checksum_depth: 25,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_duration_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.window_duration_secs == 0 {
            return Err(invalid("window_duration_secs", "must be positive"));
        }
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(invalid("gamma", format!("must be finite and non-negative, got {}", self.gamma)));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(invalid("epsilon", format!("must be finite and non-negative, got {}", self.epsilon)));
        }
        if self.fee_schedule.is_empty() {
            return Err(invalid("fee_schedule", "at least one tier required"));
        }
        if self.latency_ring_capacity == 0 {
            return Err(invalid("latency_ring_capacity", "must be positive"));
        }
        if self.top_n_depth == 0 {
            return Err(invalid("top_n_depth", "must be positive"));
        }
        if !self.max_tick_budget_ms.is_finite() || self.max_tick_budget_ms <= 0.0 {
            return Err(invalid("max_tick_budget_ms", "must be finite and positive"));
        }
        if self.checksum_depth == 0 {
            return Err(invalid("checksum_depth", "must be positive"));
        }
        Ok(())
    }
}
