//! Forecast accuracy metrics: pure functions over walk-forward steps.
//!
//! Every metric is a function of its inputs only. Ratios go through
//! [`safe_div`], so an empty or degenerate evaluation produces zeros rather
//! than NaN or infinity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One walk-forward evaluation: forecast for `day` against the observed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStep {
    pub day: NaiveDate,
    pub actual: f64,
    pub yhat: f64,
    pub lower: f64,
    pub upper: f64,
    pub abs_error: f64,
    pub width: f64,
    pub winkler: f64,
    pub hit: bool,
}

impl BacktestStep {
    /// Score one forecast against its realised value.
    pub fn score(day: NaiveDate, actual: f64, yhat: f64, lower: f64, upper: f64, alpha: f64) -> Self {
        Self {
            day,
            actual,
            yhat,
            lower,
            upper,
            abs_error: (actual - yhat).abs(),
            width: interval_width(lower, upper),
            winkler: winkler_score(actual, lower, upper, alpha),
            hit: lower <= actual && actual <= upper,
        }
    }

    /// Absolute percentage error, undefined when the actual is zero.
    pub fn pct_error(&self) -> Option<f64> {
        if self.actual == 0.0 {
            None
        } else {
            Some(self.abs_error / self.actual.abs())
        }
    }
}

/// Aggregate accuracy over a walk-forward evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Mean absolute error.
    pub mae: f64,
    /// Mean absolute percentage error over steps with a non-zero actual.
    pub mape: f64,
    /// MAE scaled by the in-sample naive one-step MAE.
    pub mase: f64,
    /// Fraction of actuals inside `[lower, upper]`.
    pub coverage: f64,
    pub mean_width: f64,
    pub mean_winkler: f64,
    /// Number of evaluated steps.
    pub n: usize,
}

impl BacktestResult {
    /// Aggregate scored steps. `naive_mae` is the training-period naive MAE.
    pub fn compute(steps: &[BacktestStep], naive_mae: f64) -> Self {
        let n = steps.len();
        let mae = mean(steps.iter().map(|s| s.abs_error));
        let pct: Vec<f64> = steps.iter().filter_map(BacktestStep::pct_error).collect();
        let hits = steps.iter().filter(|s| s.hit).count();

        Self {
            mae,
            mape: mean(pct.iter().copied()),
            mase: safe_div(mae, naive_mae),
            coverage: safe_div(hits as f64, n as f64),
            mean_width: mean(steps.iter().map(|s| s.width)),
            mean_winkler: mean(steps.iter().map(|s| s.winkler)),
            n,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// `num / den`, or 0 when the denominator is zero or the result is not finite.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let q = num / den;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

/// Arithmetic mean; 0 for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    safe_div(sum, count as f64)
}

/// Interval width, floored at 0 for inverted bounds.
pub fn interval_width(lower: f64, upper: f64) -> f64 {
    (upper - lower).max(0.0)
}

/// Winkler interval score at nominal miss rate `alpha`.
///
/// The width, plus `2 / alpha` times the distance by which `actual` falls
/// outside `[lower, upper]`. Lower is better.
pub fn winkler_score(actual: f64, lower: f64, upper: f64, alpha: f64) -> f64 {
    let width = interval_width(lower, upper);
    if actual < lower {
        width + (2.0 / alpha) * (lower - actual)
    } else if actual > upper {
        width + (2.0 / alpha) * (actual - upper)
    } else {
        width
    }
}

/// Mean absolute change between consecutive values.
///
/// This is the MAE of the "tomorrow equals today" forecast and serves as
/// the MASE denominator. Fewer than two values give 0.
pub fn naive_one_step_mae(values: &[f64]) -> f64 {
    mean(values.windows(2).map(|w| (w[1] - w[0]).abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn winkler_inside_is_width() {
        assert_eq!(winkler_score(10.0, 8.0, 12.0, 0.2), 4.0);
    }

    #[test]
    fn winkler_penalises_misses() {
        // 4 + (2 / 0.2) * 3
        assert!((winkler_score(15.0, 8.0, 12.0, 0.2) - 34.0).abs() < 1e-12);
        // 4 + 10 * 2
        assert!((winkler_score(6.0, 8.0, 12.0, 0.2) - 24.0).abs() < 1e-12);
    }

    #[test]
    fn winkler_bounds_are_inclusive() {
        assert_eq!(winkler_score(8.0, 8.0, 12.0, 0.2), 4.0);
        assert_eq!(winkler_score(12.0, 8.0, 12.0, 0.2), 4.0);
    }

    #[test]
    fn inverted_interval_has_zero_width() {
        assert_eq!(interval_width(5.0, 3.0), 0.0);
    }

    #[test]
    fn safe_div_guards_zero() {
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(0.0, 0.0), 0.0);
        assert_eq!(safe_div(3.0, 2.0), 1.5);
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(mean(std::iter::empty()), 0.0);
        assert_eq!(mean([1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn naive_mae() {
        assert_eq!(naive_one_step_mae(&[]), 0.0);
        assert_eq!(naive_one_step_mae(&[5.0]), 0.0);
        assert_eq!(naive_one_step_mae(&[1.0, 3.0, 2.0]), 1.5);
    }

    #[test]
    fn step_scoring() {
        let step = BacktestStep::score(day(), 15.0, 10.0, 8.0, 12.0, 0.2);
        assert_eq!(step.abs_error, 5.0);
        assert_eq!(step.width, 4.0);
        assert!(!step.hit);
        assert!((step.pct_error().unwrap() - 1.0 / 3.0).abs() < 1e-12);

        let zero = BacktestStep::score(day(), 0.0, 1.0, 0.0, 2.0, 0.2);
        assert!(zero.hit);
        assert!(zero.pct_error().is_none());
    }

    #[test]
    fn aggregate_skips_zero_actuals_in_mape() {
        let steps = vec![
            BacktestStep::score(day(), 10.0, 12.0, 11.0, 13.0, 0.2),
            BacktestStep::score(day(), 0.0, 2.0, 1.0, 3.0, 0.2),
        ];
        let result = BacktestResult::compute(&steps, 4.0);
        assert_eq!(result.n, 2);
        assert_eq!(result.mae, 2.0);
        assert!((result.mape - 0.2).abs() < 1e-12);
        assert_eq!(result.mase, 0.5);
        assert_eq!(result.coverage, 0.0);
        assert_eq!(result.mean_width, 2.0);
    }

    #[test]
    fn empty_aggregate_is_zero() {
        let result = BacktestResult::compute(&[], 0.0);
        assert_eq!(result, BacktestResult::default());
    }

    #[test]
    fn flat_history_gives_zero_mase() {
        let steps = vec![BacktestStep::score(day(), 5.0, 7.0, 6.0, 8.0, 0.2)];
        let result = BacktestResult::compute(&steps, naive_one_step_mae(&[5.0, 5.0, 5.0]));
        assert_eq!(result.mase, 0.0);
        assert_eq!(result.mae, 2.0);
    }
}
