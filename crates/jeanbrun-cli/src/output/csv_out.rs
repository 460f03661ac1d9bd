use serde_json::{Map, Value};
use std::io;

use super::format_scalar;

/// Write output as CSV to stdout.
///
/// A simulation prints its yearly projection; other results print as
/// `field,value` pairs with nested fields flattened to dotted paths.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value.get("result").unwrap_or(value);
    let rows = ["projection", "schedule", "years", "rows"]
        .iter()
        .find_map(|key| result.get(*key).and_then(Value::as_array))
        .filter(|arr| arr.first().is_some_and(Value::is_object));

    if let Some(rows) = rows {
        write_rows(&mut wtr, rows);
    } else if let Value::Array(arr) = result {
        write_rows(&mut wtr, arr);
    } else if let Value::Object(map) = result {
        let _ = wtr.write_record(["field", "value"]);
        write_pairs(&mut wtr, "", map);
    } else {
        let _ = wtr.write_record([&format_scalar(result)]);
    }

    let _ = wtr.flush();
}

fn write_pairs(wtr: &mut csv::Writer<io::StdoutLock<'_>>, prefix: &str, map: &Map<String, Value>) {
    for (key, val) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            Value::Object(nested) => write_pairs(wtr, &path, nested),
            Value::Array(arr) if arr.first().is_some_and(Value::is_object) => {}
            _ => {
                let _ = wtr.write_record([path.as_str(), &format_scalar(val)]);
            }
        }
    }
}

fn write_rows(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([&format_scalar(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for map in arr.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| map.get(*h).map(format_scalar).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&row);
    }
}
