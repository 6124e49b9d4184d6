//! Deterministic input hashing for cache keys.
//!
//! Keys are the SHA-256 hex digest of a canonical JSON rendering: object keys
//! sorted, `", "` and `": "` separators, every character outside printable
//! ASCII escaped as `\uXXXX` (UTF-16 surrogate pairs above U+FFFF). Digests are
//! therefore stable across processes and match other producers using the same
//! canonical form.

use std::fmt::Write;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Trim surrounding whitespace and lowercase.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Canonical JSON text for `value`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// SHA-256 hex digest of the canonical JSON of `value`.
pub fn hash_input(value: &Value) -> String {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    hex::encode(digest)
}

/// Cache key for a request text: `hash_input({"text": normalize_text(text)})`.
pub fn cache_key(text: &str) -> String {
    hash_input(&json!({ "text": normalize_text(text) }))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    // Writing to a String cannot fail.
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_reference_digests() {
        assert_eq!(
            hash_input(&json!({"text": "hello"})),
            "fe63cf9369e847eaac71392cbe7f78a0e9cab4dc2f21e96af4ce478e3ac7bb1b"
        );
        assert_eq!(
            cache_key("This is a great product!"),
            "d86fe59d8933b1d6aaad98fa9ab41ad2a5984277c3545b078a98788a18e773e5"
        );
    }

    #[test]
    fn test_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        assert_eq!(canonical_json(&a), r#"{"a": 1, "b": 2}"#);
        assert_eq!(hash_input(&a), hash_input(&b));
        assert_eq!(
            hash_input(&a),
            "d8497d9d82770a70729261095aa98f7ef5154d7af499f8037b6ca250296785a6"
        );
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        assert_eq!(canonical_json(&json!({"text": "café"})), r#"{"text": "caf\u00e9"}"#);
        assert_eq!(
            hash_input(&json!({"text": "café"})),
            "efb502d13792f8e02d2c22ed0e126fa92c79230bb1886f183faac26f687392dc"
        );
        assert_eq!(
            canonical_json(&json!("x😀\n\"")),
            r#""x\ud83d\ude00\n\"""#
        );
    }

    #[test]
    fn test_normalization_collapses_case_and_padding() {
        assert_eq!(normalize_text("  Hello World \n"), "hello world");
        assert_eq!(cache_key("HELLO"), cache_key("  hello  "));
        assert_ne!(cache_key("hello"), cache_key("hello!"));
    }

    #[test]
    fn test_nested_structures() {
        let value = json!({"z": [1, {"y": null, "x": true}], "a": "s"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a": "s", "z": [1, {"x": true, "y": null}]}"#
        );
    }
}
