//! Canonical JSON encoding
//!
//! `serde_json`'s default `Map` is backed by a `BTreeMap` (the `preserve_order`
//! feature, which would switch it to insertion-ordered `IndexMap`, is not
//! enabled in this crate), so serializing any `Serialize` value through
//! `serde_json::Value` already yields lexicographically sorted object keys.
//! Combined with `to_vec` (no pretty-printing, no insignificant whitespace)
//! this is exactly the canonical encoding the MAC signs over.

use serde::Serialize;
use serde_json::Value;

/// Errors that can occur while canonicalising a payload.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalizeError {
    #[error("payload does not serialize to a JSON object or value: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Serializes `value` to its canonical byte encoding: object keys sorted
/// lexicographically, no insignificant whitespace.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalizeError> {
    let as_value: Value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&as_value)?)
}
