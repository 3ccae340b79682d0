//! Forecast service: per-item forecasting, evaluation and persistence.
//!
//! The service owns gap-filled series for every item plus a shared store.
//! Items are independent, so the `*_all` operations fan out across the
//! rayon pool when `forecast.parallel` is set; a failure for one item is
//! reported in its slot and never aborts the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use demandlab_core::data::IngestStats;
use demandlab_core::error::ForecastError;
use demandlab_core::{
    build_daily_series, fill_gaps, AdditiveForecaster, DailySeries, ForecastPoint, OrderRecord,
};
use rayon::prelude::*;
use thiserror::Error;

use crate::backtest::{backtest_report, BacktestConfig, BacktestError, BacktestReport};
use crate::config::DemandConfig;
use crate::emitter::persist_points;
use crate::metrics::BacktestResult;
use crate::store::{ForecastStore, StoreError};

/// Errors from service operations.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("item '{0}' has no demand series")]
    UnknownItem(String),
    #[error("forecast error: {0}")]
    Forecast(#[from] ForecastError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome for one item of a fan-out operation.
pub type ItemOutcome<T> = (String, Result<T, RunError>);

pub struct ForecastService {
    series: BTreeMap<String, DailySeries>,
    config: DemandConfig,
    store: Arc<dyn ForecastStore>,
    ingest_stats: IngestStats,
}

impl ForecastService {
    /// Service over pre-built series. Each series is gap-filled here.
    pub fn new(
        series: BTreeMap<String, DailySeries>,
        config: DemandConfig,
        store: Arc<dyn ForecastStore>,
    ) -> Self {
        let series = series
            .into_iter()
            .map(|(item, s)| {
                let filled = fill_gaps(&s, 0);
                (item, filled)
            })
            .collect();
        Self {
            series,
            config,
            store,
            ingest_stats: IngestStats::default(),
        }
    }

    /// Build series from raw orders using the configured ingest options.
    pub fn from_orders<I>(orders: I, config: DemandConfig, store: Arc<dyn ForecastStore>) -> Self
    where
        I: IntoIterator,
        I::Item: std::borrow::Borrow<OrderRecord>,
    {
        let build = build_daily_series(orders, &config.ingest);
        tracing::info!(
            items = build.series.len(),
            orders = build.stats.orders_seen,
            cancelled = build.stats.orders_cancelled,
            unparseable = build.stats.orders_unparseable,
            "built daily series"
        );
        let mut service = Self::new(build.series, config, store);
        service.ingest_stats = build.stats;
        service
    }

    pub fn config(&self) -> &DemandConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ForecastStore> {
        &self.store
    }

    /// Counters from [`Self::from_orders`]; all zero for pre-built series.
    pub fn ingest_stats(&self) -> &IngestStats {
        &self.ingest_stats
    }

    /// Item keys in sorted order.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn series(&self, item: &str) -> Option<&DailySeries> {
        self.series.get(item)
    }

    fn series_for(&self, item: &str) -> Result<&DailySeries, RunError> {
        self.series
            .get(item)
            .ok_or_else(|| RunError::UnknownItem(item.to_string()))
    }

    /// Fit the configured model to `item` and project `horizon` days.
    pub fn forecast(&self, item: &str, horizon: usize) -> Result<Vec<ForecastPoint>, RunError> {
        self.forecast_series(self.series_for(item)?, horizon)
    }

    fn forecast_series(
        &self,
        series: &DailySeries,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, RunError> {
        let model = AdditiveForecaster::new(self.config.model.clone()).fit(series)?;
        Ok(model.forecast(horizon).collect())
    }

    /// Walk-forward evaluation of `item` with explicit parameters.
    pub fn run_backtest(
        &self,
        item: &str,
        test_days: usize,
        min_train_days: usize,
        alpha: f64,
    ) -> Result<BacktestResult, RunError> {
        let config = BacktestConfig {
            test_days,
            min_train_days,
            alpha,
        };
        Ok(self.backtest_report(item, &config)?.result)
    }

    /// Walk-forward evaluation of `item` keeping per-step detail.
    pub fn backtest_report(
        &self,
        item: &str,
        config: &BacktestConfig,
    ) -> Result<BacktestReport, RunError> {
        let series = self.series_for(item)?;
        Ok(backtest_report(series, config, &self.config.model)?)
    }

    /// Upsert forecast points into the store.
    pub fn persist(&self, points: &[ForecastPoint]) -> Result<usize, RunError> {
        Ok(persist_points(self.store.as_ref(), points)?)
    }

    pub fn forecast_and_persist(&self, item: &str, horizon: usize) -> Result<usize, RunError> {
        let points = self.forecast(item, horizon)?;
        self.persist(&points)
    }

    // ─── Fan-out over items ─────────────────────────────────────────

    fn per_item<T, F>(&self, op: &str, f: F) -> Vec<ItemOutcome<T>>
    where
        T: Send,
        F: Fn(&DailySeries) -> Result<T, RunError> + Sync + Send,
    {
        let run = |(item, series): (&String, &DailySeries)| {
            let outcome = f(series);
            if let Err(e) = &outcome {
                tracing::warn!(item = %item, op, error = %e, "item failed");
            }
            (item.clone(), outcome)
        };
        if self.config.forecast.parallel {
            self.series.par_iter().map(run).collect()
        } else {
            self.series.iter().map(run).collect()
        }
    }

    pub fn forecast_all(&self, horizon: usize) -> Vec<ItemOutcome<Vec<ForecastPoint>>> {
        self.per_item("forecast", |series| self.forecast_series(series, horizon))
    }

    /// Evaluate every item with the configured backtest parameters.
    pub fn backtest_all(&self) -> Vec<ItemOutcome<BacktestResult>> {
        self.backtest_report_all()
            .into_iter()
            .map(|(item, outcome)| (item, outcome.map(|report| report.result)))
            .collect()
    }

    /// Like [`Self::backtest_all`], keeping per-step detail.
    pub fn backtest_report_all(&self) -> Vec<ItemOutcome<BacktestReport>> {
        let config = &self.config.backtest;
        self.per_item("backtest", |series| {
            Ok(backtest_report(series, config, &self.config.model)?)
        })
    }

    /// Forecast and upsert every item; each item is its own batch.
    pub fn forecast_and_persist_all(&self, horizon: usize) -> Vec<ItemOutcome<usize>> {
        self.per_item("persist", |series| {
            let points = self.forecast_series(series, horizon)?;
            self.persist(&points)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use demandlab_core::DailyPoint;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn service() -> ForecastService {
        let mut series = BTreeMap::new();
        series.insert(
            "MUG".to_string(),
            DailySeries::new(
                "MUG",
                vec![DailyPoint::new(day(1), 3.0), DailyPoint::new(day(4), 6.0)],
            ),
        );
        ForecastService::new(series, DemandConfig::default(), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn series_are_gap_filled_on_construction() {
        let svc = service();
        let mug = svc.series("MUG").unwrap();
        assert_eq!(mug.len(), 4);
        assert!(mug.is_contiguous());
        assert_eq!(mug.points[1].value, 0.0);
    }

    #[test]
    fn unknown_item_is_reported() {
        let err = service().forecast("NOPE", 3).unwrap_err();
        assert!(matches!(err, RunError::UnknownItem(ref item) if item == "NOPE"));
    }

    #[test]
    fn forecast_starts_after_last_day() {
        let points = service().forecast("MUG", 3).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].day(), day(5));
        assert_eq!(points[2].day(), day(7));
    }

    #[test]
    fn forecast_and_persist_upserts() {
        let svc = service();
        assert_eq!(svc.forecast_and_persist("MUG", 5).unwrap(), 5);
        assert_eq!(svc.forecast_and_persist("MUG", 5).unwrap(), 5);
        assert_eq!(svc.store().len().unwrap(), 5);
    }

    #[test]
    fn short_series_backtest_fails_per_item() {
        let outcomes = service().backtest_all();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0].1,
            Err(RunError::Backtest(BacktestError::InsufficientHistory { .. }))
        ));
    }
}
