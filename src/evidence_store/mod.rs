//! Short-TTL keyed evidence storage (§4.2).
//!
//! An abstract interface with an in-memory implementation for tests and an
//! optional networked (Redis) implementation for production, matching the
//! "in-memory for dev, Redis for production" split the teacher uses for its
//! challenge/session stores.

mod memory;
#[cfg(feature = "redis-store")]
mod redis_store;

pub use memory::MemoryEvidenceStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisEvidenceStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

/// The store could not service a request. Callers treat this per §7: fatal
/// for the challenge lookup, "no prior data" for every other lookup.
#[derive(Debug, Error, Clone)]
#[error("evidence store unavailable: {0}")]
pub struct StoreError(pub String);

/// Short-TTL keyed key/value storage with expiry, set operations over known
/// keys, and lookups of per-identity records (§4.2). Implementations decide
/// their own representation for `scan_by_session` (a secondary index is
/// recommended, §9) — the trait only promises the operation.
#[async_trait]
pub trait EvidenceStore: Send + Sync + std::fmt::Debug {
    async fn put_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Adds `member` to the set stored at `key`, creating it if absent.
    /// `ttl` refreshes the whole set's expiry.
    async fn append_set_member(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Returns the members of the set stored at `key`, or an empty vec if
    /// absent/expired.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Writes `value` at `key` only if `key` is currently absent (or
    /// expired). Returns `true` if this call performed the write — the
    /// compare-and-set primitive §5 requires for `attendance:{sessionId}:{participantId}`.
    async fn compare_and_set_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, StoreError>;
}

/// Serializes `value` as JSON and stores it at `key` with `ttl`.
pub async fn put_json<T: Serialize + Sync>(
    store: &dyn EvidenceStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value).map_err(|e| StoreError(e.to_string()))?;
    store.put_with_ttl(key, bytes, ttl).await
}

/// Reads and JSON-deserializes the value at `key`, if any.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn EvidenceStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| StoreError(e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Writes `value` as JSON via `compare_and_set_absent`.
pub async fn compare_and_set_json<T: Serialize + Sync>(
    store: &dyn EvidenceStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<bool, StoreError> {
    let bytes = serde_json::to_vec(value).map_err(|e| StoreError(e.to_string()))?;
    store.compare_and_set_absent(key, bytes, ttl).await
}
