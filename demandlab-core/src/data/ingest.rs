//! Series builder: folds order records into per-item daily unit totals.
//!
//! Rules:
//! - cancelled orders are excluded (configurable)
//! - orders with a missing or unparseable `created_at` are skipped
//! - timestamps are truncated to a calendar day in one consistent calendar
//! - line-item quantities <= 0 are ignored
//!
//! The fold has no side effects beyond the returned map and counters.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DailyPoint, DailySeries, OrderRecord};

/// Calendar used to truncate order timestamps to a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayBoundary {
    /// Local time zone of the running process.
    #[default]
    Local,
    Utc,
    /// Fixed offset east of UTC, in minutes.
    FixedOffset { minutes: i32 },
}

impl DayBoundary {
    /// Calendar day of `ts` in this boundary's time zone.
    ///
    /// Returns `None` only for an out-of-range fixed offset.
    pub fn day_of(&self, ts: DateTime<FixedOffset>) -> Option<NaiveDate> {
        match *self {
            DayBoundary::Local => Some(ts.with_timezone(&Local).date_naive()),
            DayBoundary::Utc => Some(ts.with_timezone(&Utc).date_naive()),
            DayBoundary::FixedOffset { minutes } => {
                let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
                Some(ts.with_timezone(&offset).date_naive())
            }
        }
    }
}

/// Options for [`build_daily_series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    pub ignore_cancelled: bool,
    pub day_boundary: DayBoundary,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            ignore_cancelled: true,
            day_boundary: DayBoundary::Local,
        }
    }
}

/// Counters describing what the fold kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub orders_seen: usize,
    pub orders_cancelled: usize,
    pub orders_unparseable: usize,
    pub line_items_used: usize,
    pub line_items_ignored: usize,
}

/// Output of the series builder: item key → sorted sparse series.
#[derive(Debug, Clone, Default)]
pub struct SeriesBuild {
    pub series: BTreeMap<String, DailySeries>,
    pub stats: IngestStats,
}

/// Aggregate order line items into per-item daily unit totals.
///
/// Each returned series is sorted ascending by day and may skip days with no
/// sales; run it through [`crate::data::fill_gaps`] before fitting.
pub fn build_daily_series<I>(orders: I, opts: &IngestOptions) -> SeriesBuild
where
    I: IntoIterator,
    I::Item: Borrow<OrderRecord>,
{
    let mut buckets: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    let mut stats = IngestStats::default();

    for order in orders {
        let order = order.borrow();
        stats.orders_seen += 1;

        if opts.ignore_cancelled && order.is_cancelled() {
            stats.orders_cancelled += 1;
            continue;
        }

        let Some(day) = order
            .created_at
            .as_deref()
            .and_then(|raw| parse_order_day(raw, opts.day_boundary))
        else {
            stats.orders_unparseable += 1;
            continue;
        };

        for line in &order.line_items {
            if line.quantity <= 0.0 {
                stats.line_items_ignored += 1;
                continue;
            }
            *buckets
                .entry(line.item_key().to_string())
                .or_default()
                .entry(day)
                .or_insert(0.0) += line.quantity;
            stats.line_items_used += 1;
        }
    }

    if stats.orders_unparseable > 0 {
        tracing::debug!(
            skipped = stats.orders_unparseable,
            "skipped orders with missing or malformed created_at"
        );
    }

    let series = buckets
        .into_iter()
        .map(|(item, days)| {
            let points = days
                .into_iter()
                .map(|(day, value)| DailyPoint::new(day, value))
                .collect();
            (item.clone(), DailySeries::new(item, points))
        })
        .collect();

    SeriesBuild { series, stats }
}

/// Parse an order timestamp and truncate it to a calendar day.
///
/// Timestamps carrying an offset are converted into `boundary` first;
/// timestamps without one are taken as already expressed in that calendar.
pub fn parse_order_day(raw: &str, boundary: DayBoundary) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return boundary.day_of(ts);
    }
    // ISO-8601 without seconds, e.g. `2024-03-01T10:00Z` or `...T10:00+02:00`.
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%#z") {
        return boundary.day_of(ts);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|ts| ts.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CancelMarker, LineItem};

    fn utc_opts() -> IngestOptions {
        IngestOptions {
            ignore_cancelled: true,
            day_boundary: DayBoundary::Utc,
        }
    }

    fn order(created_at: &str, items: &[(&str, f64)]) -> OrderRecord {
        OrderRecord {
            created_at: Some(created_at.to_string()),
            cancelled_at: None,
            line_items: items
                .iter()
                .map(|(sku, qty)| LineItem {
                    sku: Some(sku.to_string()),
                    title: None,
                    quantity: *qty,
                })
                .collect(),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sums_same_item_same_day() {
        let orders = vec![
            order("2024-01-02T09:00:00Z", &[("A", 2.0), ("B", 1.0)]),
            order("2024-01-02T17:30:00Z", &[("A", 3.0)]),
            order("2024-01-04T08:00:00Z", &[("A", 1.0)]),
        ];
        let build = build_daily_series(&orders, &utc_opts());

        let a = &build.series["A"];
        assert_eq!(a.points.len(), 2);
        assert_eq!(a.points[0], DailyPoint::new(d(2024, 1, 2), 5.0));
        assert_eq!(a.points[1], DailyPoint::new(d(2024, 1, 4), 1.0));
        assert_eq!(build.series["B"].points.len(), 1);
        assert_eq!(build.stats.orders_seen, 3);
        assert_eq!(build.stats.line_items_used, 4);
    }

    #[test]
    fn output_is_sorted_even_for_unsorted_input() {
        let orders = vec![
            order("2024-01-05T09:00:00Z", &[("A", 1.0)]),
            order("2024-01-01T09:00:00Z", &[("A", 1.0)]),
            order("2024-01-03T09:00:00Z", &[("A", 1.0)]),
        ];
        let build = build_daily_series(&orders, &utc_opts());
        let days: Vec<_> = build.series["A"].points.iter().map(|p| p.day).collect();
        assert_eq!(days, vec![d(2024, 1, 1), d(2024, 1, 3), d(2024, 1, 5)]);
    }

    #[test]
    fn cancelled_orders_are_excluded_by_default() {
        let mut cancelled = order("2024-01-02T09:00:00Z", &[("A", 4.0)]);
        cancelled.cancelled_at = Some(CancelMarker::Stamp("2024-01-03T00:00:00Z".into()));
        let orders = vec![cancelled.clone(), order("2024-01-02T10:00:00Z", &[("A", 1.0)])];

        let build = build_daily_series(&orders, &utc_opts());
        assert_eq!(build.series["A"].points[0].value, 1.0);
        assert_eq!(build.stats.orders_cancelled, 1);

        let keep = IngestOptions {
            ignore_cancelled: false,
            ..utc_opts()
        };
        let build = build_daily_series(&orders, &keep);
        assert_eq!(build.series["A"].points[0].value, 5.0);
    }

    #[test]
    fn bad_timestamps_are_skipped_silently() {
        let mut missing = order("", &[("A", 1.0)]);
        missing.created_at = None;
        let orders = vec![
            missing,
            order("not a date", &[("A", 1.0)]),
            order("2024-01-02T09:00:00Z", &[("A", 1.0)]),
        ];
        let build = build_daily_series(&orders, &utc_opts());
        assert_eq!(build.series["A"].points.len(), 1);
        assert_eq!(build.stats.orders_unparseable, 2);
    }

    #[test]
    fn non_positive_quantities_are_ignored() {
        let orders = vec![order(
            "2024-01-02T09:00:00Z",
            &[("A", 2.0), ("A", 0.0), ("A", -5.0), ("B", -1.0)],
        )];
        let build = build_daily_series(&orders, &utc_opts());
        assert_eq!(build.series["A"].points[0].value, 2.0);
        assert!(!build.series.contains_key("B"));
        assert_eq!(build.stats.line_items_ignored, 3);
    }

    #[test]
    fn offset_timestamps_are_bucketed_in_the_boundary_calendar() {
        // 23:30 at -05:00 is 04:30 the next day in UTC.
        let raw = "2024-01-02T23:30:00-05:00";
        assert_eq!(parse_order_day(raw, DayBoundary::Utc), Some(d(2024, 1, 3)));
        assert_eq!(
            parse_order_day(raw, DayBoundary::FixedOffset { minutes: -300 }),
            Some(d(2024, 1, 2))
        );
    }

    #[test]
    fn naive_timestamps_and_bare_dates_parse() {
        assert_eq!(
            parse_order_day("2024-02-29T13:00:00", DayBoundary::Utc),
            Some(d(2024, 2, 29))
        );
        assert_eq!(
            parse_order_day("2024-02-29 13:00:00.250", DayBoundary::Utc),
            Some(d(2024, 2, 29))
        );
        assert_eq!(parse_order_day("2024-02-29", DayBoundary::Utc), Some(d(2024, 2, 29)));
        assert_eq!(parse_order_day("29/02/2024", DayBoundary::Utc), None);
    }

    #[test]
    fn offset_timestamps_without_seconds_parse() {
        assert_eq!(
            parse_order_day("2024-03-01T10:00Z", DayBoundary::Utc),
            Some(d(2024, 3, 1))
        );
        assert_eq!(
            parse_order_day("2024-03-01T01:00+02:00", DayBoundary::Utc),
            Some(d(2024, 2, 29))
        );
        assert_eq!(
            parse_order_day("2024-03-01T23:30-0500", DayBoundary::Utc),
            Some(d(2024, 3, 2))
        );
    }

    #[test]
    fn empty_input_yields_empty_map() {
        let build = build_daily_series(Vec::<OrderRecord>::new(), &utc_opts());
        assert!(build.series.is_empty());
        assert_eq!(build.stats, IngestStats::default());
    }
}
