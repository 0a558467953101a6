use serde_json::Value;

use crate::client::SearchError;

/// One result row: field name → value as returned by the backend.
pub type ResultRow = serde_json::Map<String, Value>;

/// Read `field` from every row as a number and return the last row's value.
///
/// Every row must carry a numeric `field` (a JSON number or a numeric
/// string); an empty result set is treated as a missing value.
pub fn extract_value(rows: &[ResultRow], field: &str) -> Result<f64, SearchError> {
    let mut value = None;

    for row in rows {
        value = Some(parse_cell(row.get(field), field)?);
    }

    value.ok_or_else(|| SearchError::Parse {
        field: field.to_string(),
        reason: "search returned no result rows".to_string(),
    })
}

fn parse_cell(cell: Option<&Value>, field: &str) -> Result<f64, SearchError> {
    let parse_err = |reason: String| SearchError::Parse {
        field: field.to_string(),
        reason,
    };

    match cell {
        None | Some(Value::Null) => Err(parse_err("field missing from result row".to_string())),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| parse_err(format!("'{n}' is not representable as f64"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| parse_err(format!("'{s}': {e}"))),
        Some(other) => Err(parse_err(format!("unsupported value {other}"))),
    }
}
