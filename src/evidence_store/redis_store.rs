//! Redis-backed EvidenceStore (feature `redis-store`), for production.
//!
//! Grounded on the pack's `RedisStore` session backend (key prefixing,
//! `SETEX`, a multiplexed async connection created per call rather than
//! pooled) — the same "in-memory for dev, Redis for production" split §2
//! calls for.

use async_trait::async_trait;
use std::time::Duration;

use super::{EvidenceStore, StoreError};

/// A Redis-backed `EvidenceStore`. Keys are stored exactly as given by
/// §4.2's key scheme — no additional prefix — since that scheme is itself
/// part of the contract (reports read the keys back).
#[derive(Debug)]
pub struct RedisEvidenceStore {
    client: redis::Client,
}

impl RedisEvidenceStore {
    /// Opens a client against `redis_url`. Does not connect yet; connection
    /// errors surface lazily on the first call, each of which degrades to
    /// `StoreError::Unavailable` rather than panicking.
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(|e| StoreError(e.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError(format!("redis connection failed: {e}")))
    }
}

#[async_trait]
impl EvidenceStore for RedisEvidenceStore {
    async fn put_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError(format!("redis SETEX failed: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError(format!("redis GET failed: {e}")))
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError(format!("redis DEL failed: {e}")))
    }

    async fn append_set_member(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError(format!("redis SADD failed: {e}")))?;
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError(format!("redis EXPIRE failed: {e}")))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError(format!("redis SMEMBERS failed: {e}")))
    }

    async fn compare_and_set_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError(format!("redis SET NX failed: {e}")))?;
        Ok(result.is_some())
    }
}
