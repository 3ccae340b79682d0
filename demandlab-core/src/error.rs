//! Errors raised by the forecaster.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    /// Not enough history to fit. Surfaced to callers as "not enough history".
    #[error("insufficient data: {available} observations, need at least {needed}")]
    InsufficientData { needed: usize, available: usize },
}
