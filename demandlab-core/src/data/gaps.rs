//! Gap filler: turns a sparse daily series into a contiguous one.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::domain::{DailyPoint, DailySeries};

/// Return a new series covering every day from the first to the last
/// observed day, with missing days set to 0.
///
/// `extend_days` appends that many extra zero-valued days after the last
/// observed day (horizon alignment for callers; fitting does not need it).
/// Empty input maps to empty output regardless of `extend_days`. If a day
/// appears more than once, the later entry wins.
pub fn fill_gaps(series: &DailySeries, extend_days: usize) -> DailySeries {
    let (Some(first), Some(last)) = (
        series.points.iter().map(|p| p.day).min(),
        series.points.iter().map(|p| p.day).max(),
    ) else {
        return DailySeries::new(series.item.clone(), Vec::new());
    };

    let observed: BTreeMap<NaiveDate, f64> =
        series.points.iter().map(|p| (p.day, p.value)).collect();

    let span = (last - first).num_days() as usize + 1;
    let mut points = Vec::with_capacity(span + extend_days);
    let mut day = first;
    while day <= last {
        points.push(DailyPoint::new(day, observed.get(&day).copied().unwrap_or(0.0)));
        day += Duration::days(1);
    }
    for _ in 0..extend_days {
        points.push(DailyPoint::new(day, 0.0));
        day += Duration::days(1);
    }

    DailySeries::new(series.item.clone(), points)
}
