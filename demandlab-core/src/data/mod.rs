//! Series construction: order ingestion, gap filling, synthetic data.

pub mod gaps;
pub mod ingest;
pub mod synthetic;

pub use gaps::fill_gaps;
pub use ingest::{
    build_daily_series, parse_order_day, DayBoundary, IngestOptions, IngestStats, SeriesBuild,
};
pub use synthetic::synthetic_series;
