//! DemandLab Core: daily demand series and the additive forecaster.
//!
//! This crate contains the pure, synchronous half of the forecasting engine:
//! - Domain types (order records, daily series, forecast points)
//! - Series builder: order line items → per-item daily unit totals
//! - Gap filler: sparse series → contiguous daily series
//! - Additive forecaster: linear trend + weekday offsets + residual band
//! - Deterministic synthetic series for demos and tests
//!
//! Nothing here performs I/O or holds shared state; every call is a function
//! of its inputs, so items can be processed on independent threads.

pub mod data;
pub mod domain;
pub mod error;
pub mod model;

pub use data::{build_daily_series, fill_gaps, synthetic_series, DayBoundary, IngestOptions};
pub use domain::{DailyPoint, DailySeries, ForecastPoint, LineItem, OrderRecord};
pub use error::ForecastError;
pub use model::{AdditiveConfig, AdditiveForecaster, FittedModel};
