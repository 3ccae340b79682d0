//! Order loading from exported JSON files.
//!
//! Three layouts are accepted:
//! 1. A JSON array of order objects
//! 2. An envelope object `{"orders": [...]}`
//! 3. JSON Lines, one order object per line
//!
//! JSON Lines input is lenient: a line that fails to parse is skipped and
//! counted, so one truncated record does not discard a whole export.

use std::path::{Path, PathBuf};

use demandlab_core::OrderRecord;
use serde::Deserialize;
use thiserror::Error;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read orders from '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed order array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Orders parsed from one source, with a count of skipped lines.
#[derive(Debug, Clone, Default)]
pub struct LoadedOrders {
    pub orders: Vec<OrderRecord>,
    /// JSON Lines records that could not be parsed.
    pub skipped_lines: usize,
}

#[derive(Deserialize)]
struct Envelope {
    orders: Vec<OrderRecord>,
}

/// Read and parse an orders file.
pub fn load_orders(path: &Path) -> Result<LoadedOrders, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse_orders(&content)?;
    tracing::info!(
        path = %path.display(),
        orders = loaded.orders.len(),
        skipped = loaded.skipped_lines,
        "loaded orders"
    );
    Ok(loaded)
}

/// Parse orders from any of the accepted layouts.
pub fn parse_orders(content: &str) -> Result<LoadedOrders, LoadError> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(LoadedOrders::default());
    }
    if trimmed.starts_with('[') {
        let orders: Vec<OrderRecord> = serde_json::from_str(trimmed)?;
        return Ok(LoadedOrders {
            orders,
            skipped_lines: 0,
        });
    }
    if let Ok(envelope) = serde_json::from_str::<Envelope>(trimmed) {
        return Ok(LoadedOrders {
            orders: envelope.orders,
            skipped_lines: 0,
        });
    }

    let mut loaded = LoadedOrders::default();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<OrderRecord>(line) {
            Ok(order) => loaded.orders.push(order),
            Err(e) => {
                tracing::warn!(line = n + 1, error = %e, "skipping malformed order line");
                loaded.skipped_lines += 1;
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_A: &str = r#"{"created_at":"2024-03-01T10:00:00Z","line_items":[{"sku":"MUG","quantity":2}]}"#;
    const ORDER_B: &str = r#"{"created_at":"2024-03-02T10:00:00Z","line_items":[{"title":"Poster","quantity":"1"}]}"#;

    #[test]
    fn parses_array() {
        let loaded = parse_orders(&format!("[{ORDER_A},{ORDER_B}]")).unwrap();
        assert_eq!(loaded.orders.len(), 2);
        assert_eq!(loaded.skipped_lines, 0);
    }

    #[test]
    fn parses_envelope() {
        let loaded = parse_orders(&format!(r#"{{"orders":[{ORDER_A}]}}"#)).unwrap();
        assert_eq!(loaded.orders.len(), 1);
        assert_eq!(loaded.orders[0].line_items[0].item_key(), "MUG");
    }

    #[test]
    fn parses_json_lines_and_skips_bad_lines() {
        let content = format!("{ORDER_A}\n\n{{not json\n{ORDER_B}\n");
        let loaded = parse_orders(&content).unwrap();
        assert_eq!(loaded.orders.len(), 2);
        assert_eq!(loaded.skipped_lines, 1);
        assert_eq!(loaded.orders[1].line_items[0].quantity, 1.0);
    }

    #[test]
    fn single_line_is_not_mistaken_for_envelope() {
        let loaded = parse_orders(ORDER_A).unwrap();
        assert_eq!(loaded.orders.len(), 1);
    }

    #[test]
    fn odd_fields_in_array_only_affect_their_order() {
        let odd = [
            r#"{"created_at":12345,"line_items":[{"sku":"MUG","quantity":1}]}"#,
            r#"{"created_at":"2024-03-03T10:00:00Z","line_items":null}"#,
            r#"{"created_at":"2024-03-04T10:00:00Z","cancelled_at":{"by":"ops"},"line_items":[]}"#,
        ];
        for order in odd {
            let loaded = parse_orders(&format!("[{order},{ORDER_A}]")).unwrap();
            assert_eq!(loaded.orders.len(), 2, "{order}");
            assert_eq!(loaded.orders[1].line_items[0].item_key(), "MUG");
        }
        let loaded = parse_orders(&format!("[{}]", odd[0])).unwrap();
        assert_eq!(loaded.orders[0].created_at, None);
        let loaded = parse_orders(&format!("[{}]", odd[2])).unwrap();
        assert!(loaded.orders[0].is_cancelled());
    }

    #[test]
    fn odd_fields_in_envelope_keep_every_order() {
        let content = format!(
            r#"{{"orders":[{{"created_at":false,"line_items":null}},{ORDER_A},{ORDER_B}]}}"#
        );
        let loaded = parse_orders(&content).unwrap();
        assert_eq!(loaded.orders.len(), 3);
        assert!(loaded.orders[0].line_items.is_empty());
        assert_eq!(loaded.skipped_lines, 0);
    }

    #[test]
    fn malformed_array_is_an_error() {
        assert!(matches!(parse_orders("[{"), Err(LoadError::Json(_))));
    }

    #[test]
    fn empty_input_has_no_orders() {
        let loaded = parse_orders("  \n").unwrap();
        assert!(loaded.orders.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_orders(Path::new("/nonexistent/orders.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
