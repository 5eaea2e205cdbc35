//! Canonical JSON serialisation.
//!
//! Backends hand back JSON whose key order and whitespace depend on the tool
//! and its version. Upstream hashes and diffs these artifacts, so every JSON
//! artifact is rewritten into one byte-stable form before upload:
//!
//! * object keys sorted by code point at every level
//! * no whitespace between tokens
//! * non-ASCII characters written literally, not `\u` escaped
//! * numbers kept exactly as written (serde_json `arbitrary_precision`), so
//!   integers beyond `u64` do not degrade to floats
//!
//! Objects are rebuilt with their keys inserted in sorted order, which gives
//! sorted output whether or not `serde_json::Map` preserves insertion order.

use crate::error::ConvertError;
use serde_json::{Map, Value};

/// Serialise `value` canonically.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let sorted = sorted(value);
    // Serialising a `Value` into a Vec cannot fail.
    serde_json::to_vec(&sorted).unwrap_or_default()
}

/// Parse raw JSON bytes and serialise them canonically.
pub fn canonicalize_bytes(raw: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| ConvertError::Conversion(format!("invalid JSON output: {e}")))?;
    Ok(canonicalize(&value))
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::with_capacity(entries.len());
            for (key, item) in entries {
                out.insert(key.clone(), sorted(item));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
