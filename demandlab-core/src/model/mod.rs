//! Forecasting models.

pub mod additive;

pub use additive::{AdditiveConfig, AdditiveForecaster, FittedModel, ForecastIter};
