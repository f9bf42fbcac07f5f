//! Canonical JSON serialization.
//!
//! Object keys are sorted recursively and output uses serde_json's compact
//! separators, so the same document always produces the same bytes no
//! matter which process (or which field order) produced it.

use hex::ToHex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().encode_hex::<String>()
}

pub fn canonicalize_json_value(value: &Value) -> Value {
    match value {
        Value::Array(values) => Value::Array(values.iter().map(canonicalize_json_value).collect()),
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut out = Map::with_capacity(map.len());
            for (key, value) in entries {
                out.insert(key.clone(), canonicalize_json_value(value));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let canonical = canonicalize_json_value(value);
    serde_json::to_vec(&canonical).unwrap_or_else(|_| b"null".to_vec())
}

pub fn canonical_json_string(value: &Value) -> String {
    String::from_utf8(canonical_json_bytes(value)).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_recursively() {
        let value = json!({
            "b": 1,
            "a": { "d": 4, "c": 3 }
        });

        assert_eq!(canonical_json_string(&value), r#"{"a":{"c":3,"d":4},"b":1}"#);
    }

    #[test]
    fn keeps_array_order_and_number_form() {
        let value = json!({"a": [{"b": 2000}, {"a": 1.5}]});
        assert_eq!(canonical_json_string(&value), r#"{"a":[{"b":2000},{"a":1.5}]}"#);
    }

    #[test]
    fn key_order_does_not_change_bytes() {
        let left: Value = serde_json::from_str(r#"{"x":1,"y":{"q":true,"p":null}}"#).unwrap();
        let right: Value = serde_json::from_str(r#"{ "y": {"p": null, "q": true}, "x": 1 }"#).unwrap();
        assert_eq!(canonical_json_bytes(&left), canonical_json_bytes(&right));
    }

    #[test]
    fn sha256_hex_is_lowercase() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
