//! DemandLab Runner: evaluation, persistence and orchestration.
//!
//! This crate builds on `demandlab-core` to provide:
//! - Order loading from JSON, envelope JSON and JSON Lines exports
//! - Walk-forward backtesting with MAE, MAPE, MASE, coverage and Winkler score
//! - Forecast row emission and upsert persistence (sled or in-memory)
//! - TOML configuration
//! - A service that fans per-item work out across threads
//! - CSV, JSON and Markdown export

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod emitter;
pub mod export;
pub mod metrics;
pub mod service;
pub mod store;

pub use backtest::{
    backtest_report, evaluate_steps, run_backtest, BacktestConfig, BacktestError, BacktestReport,
};
pub use config::{clamp_horizon, ConfigError, DemandConfig, MAX_HORIZON_DAYS};
pub use data_loader::{load_orders, parse_orders, LoadError, LoadedOrders};
pub use emitter::{emit_rows, persist_points, seed_demo_forecast, synthetic_forecast_points};
pub use metrics::{winkler_score, BacktestResult, BacktestStep};
pub use service::{ForecastService, ItemOutcome, RunError};
pub use store::{ForecastRow, ForecastStore, MemoryStore, RowQuery, SledStore, StoreError};
