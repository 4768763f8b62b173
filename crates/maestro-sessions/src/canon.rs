//! Canonical JSON encoding for cache keys.
//!
//! Object keys are sorted recursively and separators carry no spaces,
//! so any permutation of the same arguments produces the same string.

use serde_json::Value;

/// Encode a JSON value canonically: sorted object keys, `,`/`:`
/// separators, no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys are strings; serde_json handles escaping.
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            out.push_str(&serde_json::to_string(scalar).unwrap_or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let v = json!({"b": 1, "a": {"d": 4, "c": 3}});
        assert_eq!(canonical_json(&v), r#"{"a":{"c":3,"d":4},"b":1}"#);
    }

    #[test]
    fn arrays_keep_order() {
        let v = json!({"xs": [3, 1, 2]});
        assert_eq!(canonical_json(&v), r#"{"xs":[3,1,2]}"#);
    }

    #[test]
    fn non_ascii_survives() {
        let v = json!({"city": "서울"});
        assert_eq!(canonical_json(&v), r#"{"city":"서울"}"#);
    }
}
