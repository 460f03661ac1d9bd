use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::format_scalar;

/// Format output as tables: scalar fields first, then one section per nested
/// object or row array (projection, schedule, ledger, ...).
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result(result, map);
            } else {
                print_sections(None, map);
            }
        }
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_sections(None, res_map),
        Value::Array(arr) => print_rows(arr),
        other => println!("{}", format_scalar(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nAvertissements :");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMéthode : {}", meth);
    }
}

fn print_sections(title: Option<&str>, map: &Map<String, Value>) {
    let scalars: Vec<(&String, &Value)> = map
        .iter()
        .filter(|(_, v)| !v.is_object() && !is_row_array(v))
        .collect();

    if !scalars.is_empty() {
        if let Some(title) = title {
            println!("\n[{}]", title);
        }
        let mut builder = Builder::default();
        builder.push_record(["Champ", "Valeur"]);
        for (key, val) in scalars {
            builder.push_record([key.as_str(), &format_cell(val)]);
        }
        println!("{}", Table::from(builder));
    }

    for (key, val) in map {
        let section = match title {
            Some(parent) => format!("{}.{}", parent, key),
            None => key.clone(),
        };
        match val {
            Value::Object(nested) => print_sections(Some(&section), nested),
            Value::Array(arr) if is_row_array(val) => {
                println!("\n[{}]", section);
                print_rows(arr);
            }
            _ => {}
        }
    }
}

fn is_row_array(value: &Value) -> bool {
    matches!(value, Value::Array(arr) if arr.first().is_some_and(Value::is_object))
}

fn print_rows(arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            println!("{}", format_cell(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for map in arr.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| map.get(h.as_str()).map(format_cell).unwrap_or_default())
            .collect();
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Array(arr) => arr.iter().map(format_cell).collect::<Vec<_>>().join(", "),
        other => format_scalar(other),
    }
}
