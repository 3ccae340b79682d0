//! Walk-forward backtest of the additive forecaster.
//!
//! For each of the last `test_days` positions `i`, the model is fit on
//! points `[0, i)` only and asked for a one-step forecast, which is scored
//! against the observed value at `i`. Nothing at or after `i` is visible to
//! the fit, so mutating the tail of a series cannot change earlier steps.
//!
//! The MASE denominator is the naive one-step MAE over the training prefix
//! (everything before the first test position).

use demandlab_core::error::ForecastError;
use demandlab_core::{AdditiveConfig, AdditiveForecaster, DailySeries};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{naive_one_step_mae, BacktestResult, BacktestStep};

/// Current schema version for persisted backtest reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Walk-forward evaluation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Number of trailing days evaluated one step at a time.
    pub test_days: usize,
    /// Minimum days of history preceding the first test day.
    pub min_train_days: usize,
    /// Nominal miss rate of the interval, used by the Winkler score.
    pub alpha: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            test_days: 28,
            min_train_days: 60,
            alpha: 0.2,
        }
    }
}

impl BacktestConfig {
    /// Series length needed to run this evaluation.
    pub fn required_len(&self) -> usize {
        self.min_train_days.saturating_add(self.test_days)
    }
}

/// Errors from walk-forward evaluation.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("insufficient history: {available} days < required {needed}")]
    InsufficientHistory { available: usize, needed: usize },
    #[error("alpha must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),
    #[error("fit failed at step {step}: {source}")]
    Fit {
        step: usize,
        #[source]
        source: ForecastError,
    },
}

/// Full evaluation artifact: aggregate metrics plus every scored step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub item: String,
    /// BLAKE3 hash of the evaluated (gap-filled) series.
    pub series_hash: String,
    pub series_len: usize,
    pub config: BacktestConfig,
    pub model: AdditiveConfig,
    pub result: BacktestResult,
    pub steps: Vec<BacktestStep>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn check_preconditions(series: &DailySeries, config: &BacktestConfig) -> Result<(), BacktestError> {
    let needed = config.required_len();
    if series.len() < needed {
        return Err(BacktestError::InsufficientHistory {
            available: series.len(),
            needed,
        });
    }
    if !(config.alpha > 0.0 && config.alpha < 1.0) {
        return Err(BacktestError::InvalidAlpha(config.alpha));
    }
    Ok(())
}

fn ordered(series: &DailySeries) -> DailySeries {
    let mut sorted = series.clone();
    sorted.points.sort_by_key(|p| p.day);
    sorted
}

/// Score every walk-forward step without aggregating.
pub fn evaluate_steps(
    series: &DailySeries,
    config: &BacktestConfig,
    model: &AdditiveConfig,
) -> Result<Vec<BacktestStep>, BacktestError> {
    check_preconditions(series, config)?;
    walk_forward(&ordered(series), config, model)
}

fn walk_forward(
    series: &DailySeries,
    config: &BacktestConfig,
    model: &AdditiveConfig,
) -> Result<Vec<BacktestStep>, BacktestError> {
    let forecaster = AdditiveForecaster::new(AdditiveConfig {
        history_days: model.history_days.max(config.min_train_days),
        ..model.clone()
    });

    let start = series.len() - config.test_days;
    let mut steps = Vec::with_capacity(config.test_days);
    for (step, i) in (start..series.len()).enumerate() {
        let fitted = forecaster
            .fit(&series.head(i))
            .map_err(|source| BacktestError::Fit { step, source })?;
        let point = fitted.next_point();
        let actual = series.points[i].value;
        steps.push(BacktestStep::score(
            series.points[i].day,
            actual,
            point.yhat,
            point.lower,
            point.upper,
            config.alpha,
        ));
    }
    Ok(steps)
}

/// Run a walk-forward evaluation and aggregate it.
pub fn run_backtest(
    series: &DailySeries,
    config: &BacktestConfig,
    model: &AdditiveConfig,
) -> Result<BacktestResult, BacktestError> {
    Ok(backtest_report(series, config, model)?.result)
}

/// Run a walk-forward evaluation and keep the per-step detail.
pub fn backtest_report(
    series: &DailySeries,
    config: &BacktestConfig,
    model: &AdditiveConfig,
) -> Result<BacktestReport, BacktestError> {
    check_preconditions(series, config)?;
    let series = ordered(series);
    let steps = walk_forward(&series, config, model)?;

    let start = series.len() - config.test_days;
    let train: Vec<f64> = series.points[..start].iter().map(|p| p.value).collect();
    let result = BacktestResult::compute(&steps, naive_one_step_mae(&train));

    tracing::info!(
        item = %series.item,
        n = result.n,
        mae = result.mae,
        mase = result.mase,
        coverage = result.coverage,
        "backtest complete"
    );

    Ok(BacktestReport {
        schema_version: SCHEMA_VERSION,
        item: series.item.clone(),
        series_hash: series.content_hash(),
        series_len: series.len(),
        config: config.clone(),
        model: model.clone(),
        result,
        steps,
    })
}
