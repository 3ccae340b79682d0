//! Daily demand series: one entry per calendar day for a single item.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Units sold for one item on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub day: NaiveDate,
    pub value: f64,
}

impl DailyPoint {
    pub fn new(day: NaiveDate, value: f64) -> Self {
        Self { day, value }
    }
}

/// Ordered per-item demand series.
///
/// Days are strictly increasing. Before gap filling they may skip days;
/// after [`crate::data::fill_gaps`] consecutive entries are exactly one day
/// apart. Series are never mutated in place: gap filling and windowing
/// produce new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub item: String,
    pub points: Vec<DailyPoint>,
}

impl DailySeries {
    pub fn new(item: impl Into<String>, points: Vec<DailyPoint>) -> Self {
        Self {
            item: item.into(),
            points,
        }
    }

    /// Build a series of consecutive days starting at `start`.
    pub fn from_values(item: impl Into<String>, start: NaiveDate, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| DailyPoint::new(start + chrono::Duration::days(i as i64), v))
            .collect();
        Self::new(item, points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.day)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.day)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Copy of the first `end` points (clamped to the series length).
    ///
    /// The walk-forward evaluator uses this to hand the forecaster strictly
    /// prior history.
    pub fn head(&self, end: usize) -> DailySeries {
        let end = end.min(self.points.len());
        DailySeries {
            item: self.item.clone(),
            points: self.points[..end].to_vec(),
        }
    }

    /// True when every consecutive pair of days is exactly one day apart.
    pub fn is_contiguous(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| (w[1].day - w[0].day).num_days() == 1)
    }

    /// Deterministic BLAKE3 hash over item key, days and values.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.item.as_bytes());
        for p in &self.points {
            hasher.update(p.day.to_string().as_bytes());
            hasher.update(&p.value.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
