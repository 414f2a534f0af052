//! Request fingerprinting for the response cache.
//!
//! A fingerprint is the SHA-256 digest of a canonical serialization of the
//! request payload: object keys sorted lexicographically at every nesting
//! level, arrays kept in order, scalars in JSON encoding. Two payloads that
//! differ only in field order produce the same fingerprint; any value
//! difference (including `null` vs the string `"null"`) produces a
//! different one.
//!
//! Fingerprints are computed over the raw parsed body, so a field the
//! caller never sent is simply absent while an explicit `null` is present —
//! the two never collide.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the cache fingerprint of a request payload.
///
/// Returns the digest as lowercase hex.
pub fn fingerprint(payload: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(payload, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a value canonically: sorted keys, JSON scalar encoding.
///
/// String escaping goes through `serde_json` so that scalar encodings can
/// never be ambiguous (`null` is not `"null"`, `1` is not `"1"`).
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json string serialization cannot fail
            out.push_str(&serde_json::to_string(s).expect("string serialization"));
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
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("string serialization"));
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}
