//! Engine configuration loaded from TOML.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! [ingest]
//! ignore_cancelled = true
//! day_boundary = "local"            # or "utc", or { fixed_offset = { minutes = 60 } }
//!
//! [model]
//! history_days = 120
//! band_multiplier = 0.1
//! min_seasonal_days = 14
//!
//! [backtest]
//! test_days = 28
//! min_train_days = 60
//! alpha = 0.2
//!
//! [forecast]
//! horizon_days = 14
//! parallel = true
//!
//! [store]
//! path = "data/forecasts.sled"
//! ```

use std::path::{Path, PathBuf};

use demandlab_core::{AdditiveConfig, DayBoundary, IngestOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::BacktestConfig;

/// Largest horizon a caller may request.
pub const MAX_HORIZON_DAYS: usize = 60;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Forecast emission settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSection {
    pub horizon_days: usize,
    /// Fan out per-item work across the rayon pool.
    pub parallel: bool,
}

impl Default for ForecastSection {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/forecasts.sled"),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    pub ingest: IngestOptions,
    pub model: AdditiveConfig,
    pub backtest: BacktestConfig,
    pub forecast: ForecastSection,
    pub store: StoreSection,
}

impl DemandConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.history_days == 0 {
            return Err(ConfigError::Invalid("model.history_days must be at least 1".into()));
        }
        if !(self.model.band_multiplier.is_finite() && self.model.band_multiplier >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "model.band_multiplier must be finite and non-negative, got {}",
                self.model.band_multiplier
            )));
        }
        if !(self.backtest.alpha > 0.0 && self.backtest.alpha < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "backtest.alpha must lie in (0, 1), got {}",
                self.backtest.alpha
            )));
        }
        if let DayBoundary::FixedOffset { minutes } = self.ingest.day_boundary {
            if minutes.unsigned_abs() >= MINUTES_PER_DAY {
                return Err(ConfigError::Invalid(format!(
                    "ingest.day_boundary fixed offset must be within ±24h, got {minutes} minutes"
                )));
            }
        }
        if self.backtest.test_days == 0 {
            return Err(ConfigError::Invalid("backtest.test_days must be at least 1".into()));
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.forecast.horizon_days) {
            return Err(ConfigError::Invalid(format!(
                "forecast.horizon_days must be in 1..={MAX_HORIZON_DAYS}, got {}",
                self.forecast.horizon_days
            )));
        }
        Ok(())
    }
}

/// Clamp a requested horizon into `1..=MAX_HORIZON_DAYS`.
pub fn clamp_horizon(requested: usize) -> usize {
    requested.clamp(1, MAX_HORIZON_DAYS)
}
