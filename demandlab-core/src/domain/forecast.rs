//! Forecast point: one projected day for one item.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Immutable forecast for a single day.
///
/// `lower`/`upper` bound the point estimate. `median` is only set by
/// producers that distinguish it from `yhat` (synthetic demo generators).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ts: NaiveDateTime,
    pub item: String,
    pub yhat: f64,
    pub lower: f64,
    pub median: Option<f64>,
    pub upper: f64,
}

impl ForecastPoint {
    /// Point stamped at midnight of `day`.
    pub fn at_day(
        day: NaiveDate,
        item: impl Into<String>,
        yhat: f64,
        lower: f64,
        median: Option<f64>,
        upper: f64,
    ) -> Self {
        Self {
            ts: day.and_time(chrono::NaiveTime::MIN),
            item: item.into(),
            yhat,
            lower,
            median,
            upper,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.ts.date()
    }

    /// Interval width, floored at zero.
    pub fn width(&self) -> f64 {
        (self.upper - self.lower).max(0.0)
    }

    /// True when `actual` lies inside `[lower, upper]`.
    pub fn contains(&self, actual: f64) -> bool {
        self.lower <= actual && actual <= self.upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_day_stamps_midnight() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let p = ForecastPoint::at_day(day, "SKU", 10.0, 8.0, None, 12.0);
        assert_eq!(p.day(), day);
        assert_eq!(p.ts.to_string(), "2024-06-01 00:00:00");
        assert_eq!(p.width(), 4.0);
        assert!(p.contains(12.0));
        assert!(!p.contains(12.5));
    }

    #[test]
    fn inverted_interval_has_zero_width() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let p = ForecastPoint::at_day(day, "SKU", 10.0, 11.0, None, 9.0);
        assert_eq!(p.width(), 0.0);
    }
}
