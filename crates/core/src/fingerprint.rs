//! Input fingerprinting for computation deduplication.
//!
//! Two submissions are considered equivalent when their plugin, plugin
//! version, and canonicalized input parameters hash to the same value.
//! Canonicalization sorts object keys recursively so that semantically
//! identical JSON bodies with different key order fingerprint identically.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the stable fingerprint of a computation input.
///
/// The fingerprint covers the plugin id and version so that a plugin
/// upgrade invalidates cached results for the same parameters.
pub fn input_fingerprint(plugin_id: &str, plugin_version: &str, params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plugin_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(plugin_version.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(params).as_bytes());
    hex_encode(&hasher.finalize())
}

/// Serialize a JSON value with all object keys sorted recursively.
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
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys serialize infallibly; a String is always valid JSON.
                out.push_str(&Value::String((*key).clone()).to_string());
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
        other => out.push_str(&other.to_string()),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_fingerprint() {
        let a = json!({"b": 1, "a": {"y": 2, "x": [1, 2, 3]}});
        let b = json!({"a": {"x": [1, 2, 3], "y": 2}, "b": 1});
        assert_eq!(
            input_fingerprint("demo", "1.0.0", &a),
            input_fingerprint("demo", "1.0.0", &b)
        );
    }

    #[test]
    fn array_order_affects_fingerprint() {
        let a = json!({"vals": [1, 2]});
        let b = json!({"vals": [2, 1]});
        assert_ne!(
            input_fingerprint("demo", "1.0.0", &a),
            input_fingerprint("demo", "1.0.0", &b)
        );
    }

    #[test]
    fn plugin_version_affects_fingerprint() {
        let params = json!({});
        assert_ne!(
            input_fingerprint("demo", "1.0.0", &params),
            input_fingerprint("demo", "1.1.0", &params)
        );
    }

    #[test]
    fn canonical_json_escapes_keys() {
        let v = json!({"a\"b": 1});
        assert_eq!(canonical_json(&v), r#"{"a\"b":1}"#);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = input_fingerprint("demo", "1.0.0", &json!({}));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
