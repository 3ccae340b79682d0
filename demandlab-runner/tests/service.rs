//! End-to-end service tests: orders in, persisted forecasts out.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use demandlab_core::{synthetic_series, DailySeries, DayBoundary};
use demandlab_runner::config::DemandConfig;
use demandlab_runner::data_loader::parse_orders;
use demandlab_runner::service::{ForecastService, RunError};
use demandlab_runner::store::{ForecastStore, MemoryStore, RowQuery, SledStore};

const ORDERS: &str = r#"
{"created_at":"2024-03-01T09:00:00Z","line_items":[{"sku":"MUG","quantity":3},{"title":"Poster","quantity":1}]}
{"created_at":"2024-03-03T18:30:00Z","line_items":[{"sku":" MUG ","quantity":"4"}]}
{"created_at":"2024-03-04T08:00:00Z","cancelled_at":"2024-03-04T09:00:00Z","line_items":[{"sku":"MUG","quantity":50}]}
{"created_at":"garbage","line_items":[{"sku":"MUG","quantity":9}]}
"#;

fn utc_config() -> DemandConfig {
    let mut config = DemandConfig::default();
    config.ingest.day_boundary = DayBoundary::Utc;
    config
}

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

#[test]
fn orders_to_persisted_forecast() {
    let loaded = parse_orders(ORDERS).unwrap();
    assert_eq!(loaded.orders.len(), 4);

    let store = Arc::new(MemoryStore::new());
    let svc = ForecastService::from_orders(&loaded.orders, utc_config(), store.clone());

    let items: Vec<&str> = svc.items().collect();
    assert_eq!(items, ["MUG", "Poster"]);
    assert_eq!(svc.ingest_stats().orders_cancelled, 1);
    assert_eq!(svc.ingest_stats().orders_unparseable, 1);

    let mug = svc.series("MUG").unwrap();
    let values: Vec<f64> = mug.values().collect();
    assert_eq!(values, [3.0, 0.0, 4.0]);

    let written = svc.forecast_and_persist("MUG", 7).unwrap();
    assert_eq!(written, 7);
    let rows = store.query(&RowQuery::item("MUG")).unwrap();
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0].ts, "2024-03-04T00:00:00");
    assert_eq!(rows[6].ts, "2024-03-10T00:00:00");
    assert!(rows.iter().all(|r| r.median == r.yhat && r.lower <= r.upper));
}

fn synthetic_service(parallel: bool) -> ForecastService {
    let mut series = BTreeMap::new();
    for (item, base) in [("A", 20.0), ("B", 50.0), ("C", 5.0)] {
        series.insert(
            item.to_string(),
            synthetic_series(item, 120, day(6, 30), base, 4.0),
        );
    }
    // Too short to backtest with defaults.
    series.insert(
        "D".to_string(),
        DailySeries::from_values("D", day(6, 1), &[1.0, 2.0, 3.0]),
    );
    let mut config = DemandConfig::default();
    config.forecast.parallel = parallel;
    ForecastService::new(series, config, Arc::new(MemoryStore::new()))
}

#[test]
fn parallel_and_sequential_fan_out_agree() {
    let par = synthetic_service(true);
    let seq = synthetic_service(false);

    let a = par.forecast_all(14);
    let b = seq.forecast_all(14);
    assert_eq!(a.len(), 4);
    for ((item_a, fa), (item_b, fb)) in a.iter().zip(&b) {
        assert_eq!(item_a, item_b);
        assert_eq!(fa.as_ref().unwrap(), fb.as_ref().unwrap());
    }
}

#[test]
fn backtest_all_isolates_failures() {
    let svc = synthetic_service(true);
    let outcomes = svc.backtest_all();
    assert_eq!(outcomes.len(), 4);

    for (item, outcome) in &outcomes {
        match item.as_str() {
            "D" => assert!(matches!(outcome, Err(RunError::Backtest(_)))),
            _ => {
                let result = outcome.as_ref().unwrap();
                assert_eq!(result.n, 28);
                assert!(result.mae.is_finite());
            }
        }
    }
}

#[test]
fn report_fan_out_matches_per_item_reports() {
    for parallel in [true, false] {
        let svc = synthetic_service(parallel);
        let reports = svc.backtest_report_all();
        let results = svc.backtest_all();
        assert_eq!(reports.len(), 4);

        for ((item, report), (_, result)) in reports.iter().zip(&results) {
            if item == "D" {
                assert!(report.is_err() && result.is_err());
                continue;
            }
            let report = report.as_ref().unwrap();
            let single = svc.backtest_report(item, &svc.config().backtest).unwrap();
            assert_eq!(report.steps.len(), 28);
            assert_eq!(report.result, single.result);
            assert_eq!(&report.result, result.as_ref().unwrap());
        }
    }
}

#[test]
fn run_backtest_with_explicit_parameters() {
    let svc = synthetic_service(false);
    let result = svc.run_backtest("A", 14, 30, 0.1).unwrap();
    assert_eq!(result.n, 14);

    let err = svc.run_backtest("A", 14, 30, 0.0).unwrap_err();
    assert!(matches!(err, RunError::Backtest(_)));
    assert!(matches!(
        svc.run_backtest("Z", 14, 30, 0.2),
        Err(RunError::UnknownItem(_))
    ));
}

#[test]
fn persist_all_into_sled() {
    let mut series = BTreeMap::new();
    for item in ["A", "B"] {
        series.insert(
            item.to_string(),
            synthetic_series(item, 60, day(6, 30), 10.0, 2.0),
        );
    }
    let store: Arc<dyn ForecastStore> = Arc::new(SledStore::temporary().unwrap());
    let svc = ForecastService::new(series, DemandConfig::default(), store.clone());

    let outcomes = svc.forecast_and_persist_all(10);
    assert!(outcomes.iter().all(|(_, o)| matches!(o, Ok(10))));
    assert_eq!(store.len().unwrap(), 20);

    // Re-running replaces rather than duplicates.
    svc.forecast_and_persist_all(10);
    assert_eq!(store.len().unwrap(), 20);
    let first = store.get("2024-07-01T00:00:00", "A").unwrap();
    assert!(first.is_some());
}
