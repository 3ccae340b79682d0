//! Additive forecaster: linear trend + day-of-week offsets + residual band.
//!
//! `fit` is stateless over the history it is given and returns an immutable
//! [`FittedModel`]. Forecasting is only reachable through a fitted value, so
//! a model cannot be asked for a forecast before it has been fit, and a
//! failed fit leaves nothing half-built behind.
//!
//! Model, for zero-based index `t` into the retained window:
//!
//! ```text
//! yhat(t) = intercept + slope * t + season[weekday(t)]
//! band    = band_multiplier * mean(|residual|)
//! ```

use std::iter::FusedIterator;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{DailyPoint, DailySeries, ForecastPoint};
use crate::error::ForecastError;

/// Fitting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditiveConfig {
    /// Trailing days retained for fitting; older history is discarded.
    pub history_days: usize,
    /// Half-width of the band as a fraction of the mean absolute residual.
    pub band_multiplier: f64,
    /// Minimum retained days before weekday offsets are estimated.
    pub min_seasonal_days: usize,
}

impl Default for AdditiveConfig {
    fn default() -> Self {
        Self {
            history_days: 120,
            band_multiplier: 0.1,
            min_seasonal_days: 14,
        }
    }
}

/// Unfitted model: configuration only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditiveForecaster {
    pub config: AdditiveConfig,
}

impl AdditiveForecaster {
    pub fn new(config: AdditiveConfig) -> Self {
        Self { config }
    }

    /// Forecaster with default settings and the given history window.
    pub fn with_history_days(history_days: usize) -> Self {
        Self::new(AdditiveConfig {
            history_days,
            ..AdditiveConfig::default()
        })
    }

    /// Fit trend, weekday offsets and dispersion to `series`.
    ///
    /// Points are ordered by day before windowing. The series is expected to
    /// be gap-filled: the trend index is the position in the retained
    /// window, not the calendar distance.
    pub fn fit(&self, series: &DailySeries) -> Result<FittedModel, ForecastError> {
        if series.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }

        let mut points = series.points.clone();
        points.sort_by_key(|p| p.day);
        let keep = self.config.history_days.max(1);
        if points.len() > keep {
            points.drain(..points.len() - keep);
        }

        let n = points.len();
        let (slope, intercept) = least_squares(&points);

        let seasonality = if n >= self.config.min_seasonal_days {
            Some(weekday_offsets(&points))
        } else {
            None
        };

        let abs_residual_sum: f64 = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut pred = intercept + slope * i as f64;
                if let Some(season) = &seasonality {
                    pred += season[weekday_index(p.day)];
                }
                (p.value - pred).abs()
            })
            .sum();
        let mad = abs_residual_sum / n as f64;

        let last_day = points[n - 1].day;

        Ok(FittedModel {
            item: series.item.clone(),
            window: points,
            slope,
            intercept,
            seasonality,
            last_day,
            mad,
            band_multiplier: self.config.band_multiplier,
        })
    }
}

/// Ordinary least squares of value on zero-based index.
///
/// A single point (zero index variance) gets slope 0.
fn least_squares(points: &[DailyPoint]) -> (f64, f64) {
    let n = points.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = points.iter().map(|p| p.value).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, p) in points.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (p.value - y_mean);
        den += dx * dx;
    }

    let slope = if den > 0.0 {
        num / den
    } else {
        tracing::debug!("zero index variance, defaulting slope to 0");
        0.0
    };
    (slope, y_mean - slope * x_mean)
}

/// Zero-mean weekday offsets (Monday = 0).
///
/// A weekday with no observations takes the window mean before centering.
fn weekday_offsets(points: &[DailyPoint]) -> [f64; 7] {
    let mut sums = [0.0_f64; 7];
    let mut counts = [0_usize; 7];
    for p in points {
        let wd = weekday_index(p.day);
        sums[wd] += p.value;
        counts[wd] += 1;
    }
    let overall = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;

    let mut offsets = [0.0_f64; 7];
    for wd in 0..7 {
        offsets[wd] = if counts[wd] > 0 {
            sums[wd] / counts[wd] as f64
        } else {
            overall
        };
    }
    let weekly_mean = offsets.iter().sum::<f64>() / 7.0;
    for offset in &mut offsets {
        *offset -= weekly_mean;
    }
    offsets
}

fn weekday_index(day: NaiveDate) -> usize {
    day.weekday().num_days_from_monday() as usize
}

/// Immutable result of one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    item: String,
    window: Vec<DailyPoint>,
    slope: f64,
    intercept: f64,
    seasonality: Option<[f64; 7]>,
    last_day: NaiveDate,
    mad: f64,
    band_multiplier: f64,
}

impl FittedModel {
    pub fn item(&self) -> &str {
        &self.item
    }

    /// The retained history the model was fit on.
    pub fn window(&self) -> &[DailyPoint] {
        &self.window
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Weekday offsets (Monday = 0), or `None` when the window was too short.
    pub fn seasonality(&self) -> Option<&[f64; 7]> {
        self.seasonality.as_ref()
    }

    /// Last day of the retained window; forecasts start the day after.
    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    /// Mean absolute in-sample residual.
    pub fn mad(&self) -> f64 {
        self.mad
    }

    /// Half-width of the forecast band.
    pub fn band(&self) -> f64 {
        self.band_multiplier * self.mad
    }

    /// Project `horizon` days past [`Self::last_day`].
    ///
    /// The returned iterator is finite and cannot be restarted; call again
    /// for a fresh sequence. Repeated calls yield identical points.
    pub fn forecast(&self, horizon: usize) -> ForecastIter<'_> {
        ForecastIter {
            model: self,
            step: 1,
            horizon,
        }
    }

    /// One-step-ahead point: the day after [`Self::last_day`].
    pub fn next_point(&self) -> ForecastPoint {
        self.point_at(1)
    }

    fn point_at(&self, step: usize) -> ForecastPoint {
        let day = self.last_day + Duration::days(step as i64);
        let index = (self.window.len() + step - 1) as f64;
        let mut yhat = self.intercept + self.slope * index;
        if let Some(season) = &self.seasonality {
            yhat += season[weekday_index(day)];
        }
        let band = self.band();
        ForecastPoint::at_day(day, self.item.clone(), yhat, yhat - band, None, yhat + band)
    }
}

/// Forecast points in strictly increasing day order.
#[derive(Debug, Clone)]
pub struct ForecastIter<'a> {
    model: &'a FittedModel,
    step: usize,
    horizon: usize,
}

impl Iterator for ForecastIter<'_> {
    type Item = ForecastPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step > self.horizon {
            return None;
        }
        let point = self.model.point_at(self.step);
        self.step += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.horizon + 1).saturating_sub(self.step);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ForecastIter<'_> {}

impl FusedIterator for ForecastIter<'_> {}
