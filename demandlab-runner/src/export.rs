//! Export of forecasts and backtest reports as CSV, JSON and Markdown.
//!
//! - **CSV**: forecast points, persisted rows, and per-step backtest detail
//! - **JSON**: full [`BacktestReport`] round-trip with schema versioning
//! - **Markdown**: short human-readable backtest summary
//!
//! Unknown report schema versions are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use demandlab_core::ForecastPoint;

use crate::backtest::{BacktestReport, SCHEMA_VERSION};
use crate::metrics::BacktestStep;
use crate::store::{ForecastRow, TS_FORMAT};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_report_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_report_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: ts, item, yhat, lower, median, upper. A missing median is empty.
pub fn export_points_csv(points: &[ForecastPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ts", "item", "yhat", "lower", "median", "upper"])?;
    for p in points {
        wtr.write_record([
            &p.ts.format(TS_FORMAT).to_string(),
            &p.item,
            &format!("{:.4}", p.yhat),
            &format!("{:.4}", p.lower),
            &p.median.map(|m| format!("{m:.4}")).unwrap_or_default(),
            &format!("{:.4}", p.upper),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Stored rows, same columns as [`export_points_csv`].
pub fn export_rows_csv(rows: &[ForecastRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ts", "item", "yhat", "lower", "median", "upper"])?;
    for r in rows {
        wtr.write_record([
            &r.ts,
            &r.item,
            &format!("{:.4}", r.yhat),
            &format!("{:.4}", r.lower),
            &format!("{:.4}", r.median),
            &format!("{:.4}", r.upper),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: day, actual, yhat, lower, upper, abs_error, width, winkler, hit.
pub fn export_steps_csv(steps: &[BacktestStep]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "day",
        "actual",
        "yhat",
        "lower",
        "upper",
        "abs_error",
        "width",
        "winkler",
        "hit",
    ])?;
    for s in steps {
        wtr.write_record([
            &s.day.to_string(),
            &format!("{:.4}", s.actual),
            &format!("{:.4}", s.yhat),
            &format!("{:.4}", s.lower),
            &format!("{:.4}", s.upper),
            &format!("{:.4}", s.abs_error),
            &format!("{:.4}", s.width),
            &format!("{:.4}", s.winkler),
            &s.hit.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact files ─────────────────────────────────────────────────

/// Write `contents` to `path` via a temporary sibling and rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Save `report.json` and `steps.csv` for one item under `output_dir/<item>/`.
pub fn save_report(report: &BacktestReport, output_dir: &Path) -> Result<PathBuf> {
    let dir = output_dir.join(sanitize(&report.item));
    write_atomic(&dir.join("report.json"), &export_report_json(report)?)?;
    write_atomic(&dir.join("steps.csv"), &export_steps_csv(&report.steps)?)?;
    Ok(dir)
}

fn sanitize(item: &str) -> String {
    item.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// ─── Markdown summary ───────────────────────────────────────────────

pub fn generate_summary(report: &BacktestReport) -> String {
    let r = &report.result;
    let mut md = String::new();
    let _ = writeln!(md, "# Backtest: {}", report.item);
    let _ = writeln!(md);
    let _ = writeln!(
        md,
        "{} days evaluated (test_days={}, min_train_days={}, alpha={})",
        r.n, report.config.test_days, report.config.min_train_days, report.config.alpha
    );
    let _ = writeln!(md);
    let _ = writeln!(md, "| Metric | Value |");
    let _ = writeln!(md, "|---|---|");
    let _ = writeln!(md, "| MAE | {:.3} |", r.mae);
    let _ = writeln!(md, "| MAPE | {:.1}% |", r.mape * 100.0);
    let _ = writeln!(md, "| MASE | {:.3} |", r.mase);
    let _ = writeln!(md, "| Coverage | {:.1}% |", r.coverage * 100.0);
    let _ = writeln!(md, "| Mean width | {:.3} |", r.mean_width);
    let _ = writeln!(md, "| Mean Winkler | {:.3} |", r.mean_winkler);
    let _ = writeln!(md);
    let _ = writeln!(md, "Series hash: `{}`", report.series_hash);
    md
}
