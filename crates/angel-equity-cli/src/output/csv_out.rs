use serde_json::Value;
use std::io;

use super::{record_rows, scalar};

/// Write output as CSV to stdout.
///
/// Results holding a per-holder or per-SAFE collection are written one row
/// per record; anything else as two-column field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) => {
            let collection = ["allocations", "lines", "rights_holders"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| record_rows(v, "holder_id")));
            if let Some((headers, rows)) = collection {
                let _ = wtr.write_record(&headers);
                for row in rows {
                    let _ = wtr.write_record(&row);
                }
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &scalar(Some(val))]);
                }
            }
        }
        _ => {
            let _ = wtr.write_record([&scalar(Some(result))]);
        }
    }

    let _ = wtr.flush();
}
