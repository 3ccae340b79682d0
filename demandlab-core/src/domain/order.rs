//! Order records as exported by the upstream commerce platform.
//!
//! Only the fields the series builder needs are modelled; everything else in
//! an order export is ignored on deserialization.

use serde::{Deserialize, Deserializer, Serialize};

/// Item key used when a line item has neither a SKU nor a title.
pub const UNKNOWN_ITEM: &str = "UNKNOWN";

/// A single order with its line items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// ISO-8601 creation timestamp. Missing or malformed values cause the
    /// order to be skipped; a non-string value reads as missing.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<CancelMarker>,
    /// `null` or a non-array reads as no lines; unreadable lines are dropped.
    #[serde(default, deserialize_with = "lenient_line_items")]
    pub line_items: Vec<LineItem>,
}

impl OrderRecord {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.as_ref().is_some_and(CancelMarker::is_set)
    }
}

/// Cancellation marker: a boolean flag, a cancellation timestamp, or any
/// other JSON value some exporter chose to put there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CancelMarker {
    Flag(bool),
    Stamp(String),
    Other(serde_json::Value),
}

impl CancelMarker {
    /// `true` for a set flag or a non-blank timestamp. Other values count
    /// when non-zero or non-empty.
    pub fn is_set(&self) -> bool {
        match self {
            CancelMarker::Flag(flag) => *flag,
            CancelMarker::Stamp(stamp) => !stamp.trim().is_empty(),
            CancelMarker::Other(value) => match value {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
                serde_json::Value::String(s) => !s.trim().is_empty(),
                serde_json::Value::Array(a) => !a.is_empty(),
                serde_json::Value::Object(o) => !o.is_empty(),
            },
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: f64,
}

impl LineItem {
    /// Resolve the series key: non-blank SKU, else title, else [`UNKNOWN_ITEM`].
    ///
    /// Distinct catalog items that share a title and lack SKUs collapse into
    /// one series.
    pub fn item_key(&self) -> &str {
        if let Some(sku) = self.sku.as_deref().map(str::trim) {
            if !sku.is_empty() {
                return sku;
            }
        }
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ => UNKNOWN_ITEM,
        }
    }
}

/// Keeps string timestamps; any other JSON value becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let serde_json::Value::Array(raw) = serde_json::Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(raw
        .into_iter()
        .filter_map(|line| serde_json::from_value(line).ok())
        .collect())
}

/// Accepts JSON numbers and numeric strings; anything else becomes 0.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let qty = match raw {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if qty.is_finite() { qty } else { 0.0 })
}
