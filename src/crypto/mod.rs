//! Cryptographic primitives: keyed MAC and canonical payload encoding.

mod canonical;
mod mac;

pub use canonical::{canonical_bytes, CanonicalizeError};
pub use mac::{constant_time_bytes_eq, KeyedMac};
