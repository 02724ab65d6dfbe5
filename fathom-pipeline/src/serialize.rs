// fathom-pipeline/src/serialize.rs
// ============================================================================
// Module: Fathom Serialization Stage
// Description: Canonical JSON encoding of the redacted payload.
// Purpose: Second pipeline stage (`spec.md` §4.4, item 2).
// Dependencies: fathom-core
// Non-goals: schema validation; the payload is already well-typed by the
//            time it reaches this stage.
// ============================================================================

//! ## Overview
//! Encodes a redacted payload as canonical JSON (no whitespace, stable key
//! order) via [`fathom_core::core::hashing::canonical_json_bytes`]. A value
//! that cannot be canonicalized is rendered as a typed fallback marker
//! rather than failing the whole event.

use fathom_core::core::hashing::canonical_json_bytes;
use serde_json::Value;
use serde_json::json;

/// Encodes `value` as canonical JSON bytes, falling back to a
/// `{"__type__", "__repr__"}` marker if canonicalization fails.
#[must_use]
pub fn serialize_canonical(value: &Value) -> Vec<u8> {
    canonical_json_bytes(value).unwrap_or_else(|err| {
        let fallback = json!({
            "__type__": "unserializable",
            "__repr__": format!("{value} ({err})"),
        });
        canonical_json_bytes(&fallback).unwrap_or_else(|_| b"{}".to_vec())
    })
}

#[cfg(test)]
mod tests {
    use super::serialize_canonical;
    use serde_json::json;

    #[test]
    fn encodes_without_whitespace() {
        let value = json!({"b": 1, "a": 2});
        let bytes = serialize_canonical(&value);
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(!text.contains(' '));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn key_order_is_stable_regardless_of_input_order() {
        let a = serialize_canonical(&json!({"b": 1, "a": 2}));
        let b = serialize_canonical(&json!({"a": 2, "b": 1}));
        assert_eq!(a, b);
    }
}
