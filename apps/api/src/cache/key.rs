//! Cache-key generation.
//!
//! A key is `"{prefix}:{hash}"` where `hash` is the first 16 hex chars of the
//! SHA-256 of the canonical JSON form of the request parameters. Canonical form
//! sorts object keys at every level, so property order never changes the key.

use serde_json::Value;
use sha2::{Digest, Sha256};

const HASH_HEX_LEN: usize = 16;

pub fn generate_key(prefix: &str, params: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(params, &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_HEX_LEN);

    format!("{prefix}:{hash}")
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
                // Serializing a str to JSON cannot fail.
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
