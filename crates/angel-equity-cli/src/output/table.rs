use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{record_rows, scalar};

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_fields(map);
            }
        }
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &serde_json::Map<String, Value>) {
    let Value::Object(res_map) = result else {
        println!("{}", scalar(Some(result)));
        return;
    };

    // Scalar fields first, then one table per nested collection.
    let mut nested = Vec::new();
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in res_map {
        match record_rows(val, "id") {
            Some(rows) => nested.push((key, rows)),
            None => builder.push_record([key.as_str(), &scalar(Some(val))]),
        }
    }
    println!("{}", Table::from(builder));

    for (key, (headers, rows)) in nested {
        println!("\n{}:", key);
        let mut b = Builder::default();
        b.push_record(headers);
        for row in rows {
            b.push_record(row);
        }
        println!("{}", Table::from(b));
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_fields(map: &serde_json::Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &scalar(Some(val))]);
    }
    println!("{}", Table::from(builder));
}
