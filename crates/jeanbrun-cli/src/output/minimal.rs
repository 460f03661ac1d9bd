use serde_json::Value;

/// Dotted paths into the result, most telling first. The first non-null hit
/// is printed alone.
const PRIORITY_PATHS: &[&str] = &[
    "synthesis.annual_tax_saving",
    "net_amortization",
    "shortfall",
    "net_tax",
    "monthly_payment_with_insurance",
    "capacity",
    "debt_ratio",
    "split.deductible_from_income",
    "total_tax",
    "best_total_tax",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    for path in PRIORITY_PATHS {
        if let Some(val) = lookup(result, path) {
            if !val.is_null() {
                println!("{}", format_minimal(val));
                return;
            }
        }
    }

    if let Value::Object(map) = result {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result));
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
