pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Nested collection in a result: either a keyed map of records (e.g.
/// per-holder allocations) or an array of records (e.g. per-SAFE lines).
pub(crate) fn record_rows(value: &Value, key_header: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    match value {
        Value::Object(map) if !map.is_empty() && map.values().all(Value::is_object) => {
            let first = map.values().next()?.as_object()?;
            let mut headers = vec![key_header.to_string()];
            headers.extend(first.keys().cloned());
            let rows = map
                .iter()
                .map(|(k, v)| {
                    let mut row = vec![k.clone()];
                    row.extend(first.keys().map(|h| scalar(v.get(h.as_str()))));
                    row
                })
                .collect();
            Some((headers, rows))
        }
        Value::Array(arr) if !arr.is_empty() && arr.iter().all(Value::is_object) => {
            let headers: Vec<String> = arr[0].as_object()?.keys().cloned().collect();
            let rows = arr
                .iter()
                .map(|item| headers.iter().map(|h| scalar(item.get(h.as_str()))).collect())
                .collect();
            Some((headers, rows))
        }
        _ => None,
    }
}

pub(crate) fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}
