//! Synthetic demand series for demos, tests and benchmarks.
//!
//! Output is deterministic per item key: the RNG is seeded from the BLAKE3
//! hash of the key, so the same item always yields the same history.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{DailyPoint, DailySeries};

/// Daily growth of the synthetic trend, in units per day.
pub const SYNTHETIC_TREND_PER_DAY: f64 = 0.3;

/// Generate `days` consecutive days ending at `end_day` (inclusive).
///
/// Day `i` has demand `base + 0.3 * i` plus uniform noise in
/// `[-seasonal_amp, seasonal_amp]`, floored at 0.
pub fn synthetic_series(
    item: &str,
    days: usize,
    end_day: NaiveDate,
    base: f64,
    seasonal_amp: f64,
) -> DailySeries {
    let seed: [u8; 32] = *blake3::hash(item.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);
    let amp = seasonal_amp.abs();

    let start = end_day - Duration::days(days.saturating_sub(1) as i64);
    let points = (0..days)
        .map(|i| {
            let trend = base + SYNTHETIC_TREND_PER_DAY * i as f64;
            let noise = if amp > 0.0 {
                rng.gen_range(-amp..=amp)
            } else {
                0.0
            };
            DailyPoint::new(start + Duration::days(i as i64), (trend + noise).max(0.0))
        })
        .collect();

    DailySeries::new(item, points)
}
