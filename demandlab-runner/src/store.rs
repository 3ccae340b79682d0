//! Forecast row persistence with upsert semantics.
//!
//! Rows are keyed by `(ts, item)`. Writing a key that already exists
//! replaces its values, so re-emitting a forecast is idempotent. A batch is
//! validated in full before anything is written: one bad row rejects the
//! whole batch and the store is left untouched.
//!
//! Two backends share the [`ForecastStore`] trait:
//! - [`SledStore`]: durable, one sled tree, JSON-encoded values
//! - [`MemoryStore`]: in-process map behind a `parking_lot::RwLock`

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp layout of persisted rows: midnight of the forecast day.
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const KEY_SEPARATOR: char = '\u{1f}';

/// Errors from the forecast store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid row {index}: {reason}")]
    InvalidRow { index: usize, reason: String },
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("row encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// One persisted forecast value for an (item, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// `YYYY-MM-DDT00:00:00`.
    pub ts: String,
    pub item: String,
    pub yhat: f64,
    pub lower: f64,
    pub median: f64,
    pub upper: f64,
}

impl ForecastRow {
    fn check(&self) -> Result<(), String> {
        NaiveDateTime::parse_from_str(&self.ts, TS_FORMAT)
            .map_err(|e| format!("timestamp '{}': {e}", self.ts))?;
        if self.item.trim().is_empty() {
            return Err("empty item key".into());
        }
        if self.item.contains(KEY_SEPARATOR) {
            return Err(format!("item '{}' contains a reserved character", self.item));
        }
        for (name, v) in [
            ("yhat", self.yhat),
            ("lower", self.lower),
            ("median", self.median),
            ("upper", self.upper),
        ] {
            if !v.is_finite() {
                return Err(format!("{name} is not finite"));
            }
        }
        Ok(())
    }

    fn key(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.ts, self.item)
    }
}

/// Filter for [`ForecastStore::query`]. Bounds are inclusive on `ts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowQuery {
    pub item: Option<String>,
    pub from_ts: Option<String>,
    pub to_ts: Option<String>,
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn item(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            ..Self::default()
        }
    }

    fn matches(&self, row: &ForecastRow) -> bool {
        self.item.as_deref().map_or(true, |item| row.item == item)
            && self.from_ts.as_deref().map_or(true, |from| row.ts.as_str() >= from)
    }

    fn past_end(&self, row: &ForecastRow) -> bool {
        self.to_ts.as_deref().map_or(false, |to| row.ts.as_str() > to)
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(usize::MAX)
    }
}

/// Keyed forecast storage shared across worker threads.
pub trait ForecastStore: Send + Sync {
    /// Insert or replace every row in `rows`, all-or-nothing.
    ///
    /// Returns the number of distinct keys written. When a batch repeats a
    /// key, the last occurrence wins.
    fn upsert(&self, rows: &[ForecastRow]) -> Result<usize, StoreError>;

    fn get(&self, ts: &str, item: &str) -> Result<Option<ForecastRow>, StoreError>;

    /// Rows in `(ts, item)` order.
    fn query(&self, query: &RowQuery) -> Result<Vec<ForecastRow>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Check every row and collapse repeated keys (last wins).
pub fn validate_batch(rows: &[ForecastRow]) -> Result<BTreeMap<String, &ForecastRow>, StoreError> {
    let mut batch = BTreeMap::new();
    for (index, row) in rows.iter().enumerate() {
        if let Err(reason) = row.check() {
            tracing::warn!(index, %reason, rows = rows.len(), "rejected forecast batch");
            return Err(StoreError::InvalidRow { index, reason });
        }
        batch.insert(row.key(), row);
    }
    Ok(batch)
}

// ─── Sled backend ───────────────────────────────────────────────────

/// Durable store backed by a sled database.
pub struct SledStore {
    db: sled::Db,
    rows: sled::Tree,
}

impl SledStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        Self::from_db(db)
    }

    /// Database that is deleted when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let rows = db.open_tree("forecast_rows")?;
        Ok(Self { db, rows })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

impl ForecastStore for SledStore {
    fn upsert(&self, rows: &[ForecastRow]) -> Result<usize, StoreError> {
        let validated = validate_batch(rows)?;
        let mut batch = sled::Batch::default();
        for (key, row) in &validated {
            batch.insert(key.as_bytes(), serde_json::to_vec(row)?);
        }
        self.rows.apply_batch(batch)?;
        self.rows.flush()?;
        tracing::debug!(written = validated.len(), "upserted forecast rows");
        Ok(validated.len())
    }

    fn get(&self, ts: &str, item: &str) -> Result<Option<ForecastRow>, StoreError> {
        let key = format!("{ts}{KEY_SEPARATOR}{item}");
        match self.rows.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn query(&self, query: &RowQuery) -> Result<Vec<ForecastRow>, StoreError> {
        let start = query.from_ts.clone().unwrap_or_default();
        let mut out = Vec::new();
        for entry in self.rows.range(start.as_bytes()..) {
            if out.len() >= query.limit() {
                break;
            }
            let (_, bytes) = entry?;
            let row: ForecastRow = serde_json::from_slice(&bytes)?;
            if query.past_end(&row) {
                break;
            }
            if query.matches(&row) {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows.len())
    }
}

// ─── In-memory backend ──────────────────────────────────────────────

/// Non-durable store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<String, ForecastRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ForecastStore for MemoryStore {
    fn upsert(&self, rows: &[ForecastRow]) -> Result<usize, StoreError> {
        let validated = validate_batch(rows)?;
        let mut map = self.rows.write();
        for (key, row) in &validated {
            map.insert(key.clone(), (*row).clone());
        }
        Ok(validated.len())
    }

    fn get(&self, ts: &str, item: &str) -> Result<Option<ForecastRow>, StoreError> {
        let key = format!("{ts}{KEY_SEPARATOR}{item}");
        Ok(self.rows.read().get(&key).cloned())
    }

    fn query(&self, query: &RowQuery) -> Result<Vec<ForecastRow>, StoreError> {
        let start = query.from_ts.clone().unwrap_or_default();
        let map = self.rows.read();
        Ok(map
            .range(start..)
            .map(|(_, row)| row)
            .take_while(|row| !query.past_end(row))
            .filter(|row| query.matches(row))
            .take(query.limit())
            .cloned()
            .collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows.read().len())
    }
}
