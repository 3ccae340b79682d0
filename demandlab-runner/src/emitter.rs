//! Forecast point emission: convert model output to persisted rows.
//!
//! Also produces the fixed-shape demo forecasts used to seed a fresh store,
//! so downstream readers have something to display before any real fit.

use std::f64::consts::PI;

use chrono::{Duration, NaiveDate};
use demandlab_core::ForecastPoint;

use crate::store::{ForecastRow, ForecastStore, StoreError, TS_FORMAT};

impl ForecastRow {
    /// Row for a forecast point. A missing median is stored as `yhat`.
    pub fn from_point(point: &ForecastPoint) -> Self {
        Self {
            ts: point.ts.format(TS_FORMAT).to_string(),
            item: point.item.clone(),
            yhat: point.yhat,
            lower: point.lower,
            median: point.median.unwrap_or(point.yhat),
            upper: point.upper,
        }
    }
}

pub fn emit_rows(points: &[ForecastPoint]) -> Vec<ForecastRow> {
    points.iter().map(ForecastRow::from_point).collect()
}

/// Convert and upsert `points`, returning the number of keys written.
pub fn persist_points(store: &dyn ForecastStore, points: &[ForecastPoint]) -> Result<usize, StoreError> {
    let rows = emit_rows(points);
    let written = store.upsert(&rows)?;
    tracing::info!(written, "persisted forecast rows");
    Ok(written)
}

/// Deterministic weekly-shaped demo forecast starting at `start`.
///
/// `yhat = 100 + 10 sin(2π (i mod 7) / 7) + 0.3 i`, with a band of
/// `max(8, 0.1 yhat)` either side and the median equal to `yhat`.
pub fn synthetic_forecast_points(item: &str, horizon: usize, start: NaiveDate) -> Vec<ForecastPoint> {
    (0..horizon)
        .map(|i| {
            let phase = 2.0 * PI * (i % 7) as f64 / 7.0;
            let yhat = 100.0 + 10.0 * phase.sin() + 0.3 * i as f64;
            let spread = (0.1 * yhat).max(8.0);
            ForecastPoint::at_day(
                start + Duration::days(i as i64),
                item,
                yhat,
                yhat - spread,
                Some(yhat),
                yhat + spread,
            )
        })
        .collect()
}

/// Seed `store` with a linear demo forecast of `horizon` days from `start`.
///
/// `yhat = 100 + 1.5 i` with the band at ±8% of `yhat`.
pub fn seed_demo_forecast(
    store: &dyn ForecastStore,
    item: &str,
    horizon: usize,
    start: NaiveDate,
) -> Result<usize, StoreError> {
    let points: Vec<ForecastPoint> = (0..horizon)
        .map(|i| {
            let yhat = 100.0 + 1.5 * i as f64;
            ForecastPoint::at_day(
                start + Duration::days(i as i64),
                item,
                yhat,
                0.92 * yhat,
                Some(yhat),
                1.08 * yhat,
            )
        })
        .collect();
    persist_points(store, &points)
}
