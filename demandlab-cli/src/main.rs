//! DemandLab CLI: forecast, backtest, seed and inspect stored forecasts.
//!
//! Commands:
//! - `forecast` fits each item and prints (optionally persists) its forecast
//! - `backtest` runs walk-forward evaluation and prints a summary per item
//! - `seed-demo` writes a fixed-shape demo forecast into the store
//! - `show` prints stored rows as CSV
//! - `export` writes stored rows to a CSV file
//!
//! Orders come from `--orders FILE` (JSON array, `{"orders": [...]}` or JSON
//! Lines) or, for development, `--synthetic DAYS`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use clap::{Args, Parser, Subcommand};
use demandlab_core::synthetic_series;
use demandlab_runner::export::{
    export_points_csv, export_rows_csv, generate_summary, save_report, write_atomic,
};
use demandlab_runner::store::TS_FORMAT;
use demandlab_runner::{
    clamp_horizon, load_orders, persist_points, seed_demo_forecast, synthetic_forecast_points,
    DemandConfig, ForecastService, ForecastStore, MemoryStore, RowQuery, SledStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SYNTHETIC_ITEMS: [&str; 2] = ["SYNTH-A", "SYNTH-B"];

#[derive(Parser)]
#[command(
    name = "demandlab",
    about = "DemandLab CLI: daily demand forecasting and backtesting"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Forecast store path; overrides `store.path` from the config.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "demandlab_runner=debug").
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Orders file (JSON array, envelope or JSON Lines).
    #[arg(long, conflicts_with = "synthetic")]
    orders: Option<PathBuf>,

    /// Generate this many days of synthetic demand instead of reading orders.
    #[arg(long, value_name = "DAYS")]
    synthetic: Option<usize>,
}

#[derive(Args)]
struct RangeArgs {
    /// Only rows for this item.
    #[arg(long)]
    item: Option<String>,

    /// First day (YYYY-MM-DD), inclusive.
    #[arg(long)]
    from: Option<String>,

    /// Last day (YYYY-MM-DD), inclusive.
    #[arg(long)]
    to: Option<String>,

    /// Maximum number of rows.
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit each item and print its forecast as CSV.
    Forecast {
        #[command(flatten)]
        source: SourceArgs,

        /// Only this item. Defaults to every item.
        #[arg(long)]
        item: Option<String>,

        /// Days to forecast (1-60). Defaults to `forecast.horizon_days`.
        #[arg(long)]
        horizon: Option<usize>,

        /// Upsert the forecast into the store.
        #[arg(long, default_value_t = false)]
        persist: bool,

        /// Write the CSV here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Walk-forward backtest with MAE, MAPE, MASE, coverage and Winkler score.
    Backtest {
        #[command(flatten)]
        source: SourceArgs,

        /// Only this item. Defaults to every item.
        #[arg(long)]
        item: Option<String>,

        #[arg(long)]
        test_days: Option<usize>,

        #[arg(long)]
        min_train_days: Option<usize>,

        /// Nominal miss rate of the interval, in (0, 1).
        #[arg(long)]
        alpha: Option<f64>,

        /// Save `report.json` and `steps.csv` per item under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Seed the store with a demo forecast.
    SeedDemo {
        #[arg(long, default_value = "DEMO")]
        item: String,

        #[arg(long, default_value_t = 14)]
        horizon: usize,

        /// First forecast day (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        start: Option<String>,

        /// Use the weekly-shaped demo instead of the linear one.
        #[arg(long, default_value_t = false)]
        weekly: bool,
    },
    /// Print stored rows as CSV.
    Show {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Write stored rows to a CSV file.
    Export {
        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => DemandConfig::from_file(path)?,
        None => DemandConfig::default(),
    };
    if let Some(path) = cli.store {
        config.store.path = path;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Forecast {
            source,
            item,
            horizon,
            persist,
            out,
        } => run_forecast(config, &source, item, horizon, persist, out),
        Commands::Backtest {
            source,
            item,
            test_days,
            min_train_days,
            alpha,
            output_dir,
        } => {
            if let Some(v) = test_days {
                config.backtest.test_days = v;
            }
            if let Some(v) = min_train_days {
                config.backtest.min_train_days = v;
            }
            if let Some(v) = alpha {
                config.backtest.alpha = v;
            }
            config.validate()?;
            run_backtest_cmd(config, &source, item, output_dir)
        }
        Commands::SeedDemo {
            item,
            horizon,
            start,
            weekly,
        } => run_seed_demo(&config, &item, horizon, start, weekly),
        Commands::Show { range } => {
            let csv = query_rows_csv(&config, &range)?;
            print!("{csv}");
            Ok(())
        }
        Commands::Export { range, out } => {
            let csv = query_rows_csv(&config, &range)?;
            write_atomic(&out, &csv)?;
            eprintln!("Wrote {}", out.display());
            Ok(())
        }
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_store(config: &DemandConfig) -> Result<SledStore> {
    let path = &config.store.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SledStore::open(path).with_context(|| format!("failed to open store {}", path.display()))
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date '{raw}'"))
}

/// Midnight timestamp of a `YYYY-MM-DD` day, in stored-row format.
fn day_ts(raw: &str) -> Result<String> {
    let day = parse_day(raw)?;
    Ok(day.and_time(chrono::NaiveTime::MIN).format(TS_FORMAT).to_string())
}

fn build_service(
    config: DemandConfig,
    source: &SourceArgs,
    item: Option<&str>,
    store: Arc<dyn ForecastStore>,
) -> Result<ForecastService> {
    if let Some(days) = source.synthetic {
        let end = chrono::Local::now().date_naive() - Duration::days(1);
        let items: Vec<&str> = match item {
            Some(item) => vec![item],
            None => SYNTHETIC_ITEMS.to_vec(),
        };
        let series: BTreeMap<_, _> = items
            .into_iter()
            .map(|name| (name.to_string(), synthetic_series(name, days, end, 20.0, 4.0)))
            .collect();
        return Ok(ForecastService::new(series, config, store));
    }

    let Some(path) = &source.orders else {
        bail!("one of --orders or --synthetic is required");
    };
    let loaded = load_orders(path)?;
    if loaded.skipped_lines > 0 {
        eprintln!("Skipped {} malformed order lines", loaded.skipped_lines);
    }
    Ok(ForecastService::from_orders(&loaded.orders, config, store))
}

fn ensure_item(service: &ForecastService, item: &str) -> Result<()> {
    if service.series(item).is_none() {
        bail!("no demand series for item '{item}'");
    }
    Ok(())
}

fn run_forecast(
    config: DemandConfig,
    source: &SourceArgs,
    item: Option<String>,
    horizon: Option<usize>,
    persist: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let horizon = clamp_horizon(horizon.unwrap_or(config.forecast.horizon_days));
    let store: Arc<dyn ForecastStore> = if persist {
        Arc::new(open_store(&config)?)
    } else {
        Arc::new(MemoryStore::new())
    };
    let service = build_service(config, source, item.as_deref(), store)?;
    let outcomes = match item {
        Some(item) => {
            ensure_item(&service, &item)?;
            let outcome = service.forecast(&item, horizon);
            vec![(item, outcome)]
        }
        None => service.forecast_all(horizon),
    };

    let mut points = Vec::new();
    for (item, outcome) in outcomes {
        match outcome {
            Ok(p) => points.extend(p),
            Err(e) => eprintln!("Error for {item}: {e}"),
        }
    }

    if persist {
        let written = service.persist(&points)?;
        eprintln!("Upserted {written} rows into {}", service.config().store.path.display());
    }

    let csv = export_points_csv(&points)?;
    match out {
        Some(path) => {
            write_atomic(&path, &csv)?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

fn run_backtest_cmd(
    config: DemandConfig,
    source: &SourceArgs,
    item: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let service = build_service(config, source, item.as_deref(), Arc::new(MemoryStore::new()))?;
    let outcomes = match item {
        Some(item) => {
            ensure_item(&service, &item)?;
            let outcome = service.backtest_report(&item, &service.config().backtest);
            vec![(item, outcome)]
        }
        None => service.backtest_report_all(),
    };

    let total = outcomes.len();
    let mut failures = 0usize;
    for (item, outcome) in outcomes {
        match outcome {
            Ok(report) => {
                println!("{}", generate_summary(&report));
                if let Some(dir) = &output_dir {
                    let saved = save_report(&report, dir)?;
                    eprintln!("Saved {}", saved.display());
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("Error for {item}: {e}");
            }
        }
    }

    if failures == total && total > 0 {
        bail!("backtest failed for every item");
    }
    Ok(())
}

fn run_seed_demo(
    config: &DemandConfig,
    item: &str,
    horizon: usize,
    start: Option<String>,
    weekly: bool,
) -> Result<()> {
    let start = match start {
        Some(raw) => parse_day(&raw)?,
        None => chrono::Local::now().date_naive(),
    };
    let horizon = clamp_horizon(horizon);
    let store = open_store(config)?;
    let written = if weekly {
        persist_points(&store, &synthetic_forecast_points(item, horizon, start))?
    } else {
        seed_demo_forecast(&store, item, horizon, start)?
    };
    store.flush()?;
    eprintln!("Seeded {written} rows for {item} into {}", config.store.path.display());
    Ok(())
}

fn query_rows_csv(config: &DemandConfig, range: &RangeArgs) -> Result<String> {
    let query = RowQuery {
        item: range.item.clone(),
        from_ts: range.from.as_deref().map(day_ts).transpose()?,
        to_ts: range.to.as_deref().map(day_ts).transpose()?,
        limit: range.limit,
    };
    let store = open_store(config)?;
    let rows = store.query(&query)?;
    export_rows_csv(&rows)
}
