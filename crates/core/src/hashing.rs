//! Content hashing for staging records and webhook payloads.
//!
//! Hashes are computed over a canonical JSON rendering (object keys sorted
//! recursively, no whitespace) so two payloads that differ only in key order
//! hash identically.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Render a JSON value with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
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
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hash a JSON value canonically.
pub fn json_hash(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// Hash any serializable value canonically.
///
/// Serialization of plain data structs cannot fail; if it ever does the hash
/// falls back to hashing `null`, which simply forces a canonical rewrite.
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_value(value).unwrap_or(Value::Null);
    json_hash(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn key_order_does_not_change_hash() {
        let a = json!({"name": "Beach Villa", "geo": {"lat": 1.5, "lng": 2.5}});
        let b = json!({"geo": {"lng": 2.5, "lat": 1.5}, "name": "Beach Villa"});
        assert_eq!(json_hash(&a), json_hash(&b));
    }

    #[test]
    fn value_change_changes_hash() {
        let a = json!({"name": "Beach Villa"});
        let b = json!({"name": "Beach Villa 2"});
        assert_ne!(json_hash(&a), json_hash(&b));
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": [{"z": 1, "a": 2}], "a": null});
        assert_eq!(canonical_json(&value), r#"{"a":null,"b":[{"a":2,"z":1}]}"#);
    }

    #[test]
    fn content_hash_matches_json_hash() {
        #[derive(Serialize)]
        struct Sample {
            name: &'static str,
        }
        let sample = Sample { name: "x" };
        assert_eq!(content_hash(&sample), json_hash(&json!({"name": "x"})));
    }
}
