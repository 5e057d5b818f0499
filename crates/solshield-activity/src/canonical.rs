//! Canonical JSON rendering used as hash input.
//!
//! Two logically identical values must render to the same bytes no matter
//! how their maps were built or which serde_json features are enabled, so
//! object keys are sorted at every depth and no whitespace is emitted.
//! Leaves go through serde_json's own `Display`, which escapes strings and
//! prints numbers in their shortest round-trip form.

use serde_json::Value;

/// Render `value` as canonical JSON text.
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}
