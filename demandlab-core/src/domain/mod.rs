//! Domain types: order records, daily demand series, forecast points.

pub mod forecast;
pub mod order;
pub mod series;

pub use forecast::ForecastPoint;
pub use order::{CancelMarker, LineItem, OrderRecord, UNKNOWN_ITEM};
pub use series::{DailyPoint, DailySeries};
