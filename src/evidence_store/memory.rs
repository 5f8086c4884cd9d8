//! In-memory EvidenceStore, sufficient for tests (§4.2).
//!
//! Grounded on the teacher's `ChallengeStore`: a `RwLock<HashMap<...>>` with
//! per-entry expiry and a background sweep task. TTL checks go through an
//! injected `Clock` (§9 "Time source") rather than `Utc::now()` so tests can
//! advance time deterministically instead of sleeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{EvidenceStore, StoreError};
use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone)]
enum StoredValue {
    Scalar(Vec<u8>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: DateTime<Utc>,
}

/// Thread-safe in-memory evidence store. One instance is shared (behind
/// `Arc`) across the bounded worker pool that processes responses (§5).
#[derive(Debug)]
pub struct MemoryEvidenceStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryEvidenceStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Constructs a store backed by `clock` instead of the wall clock, for
    /// deterministic expiry-boundary tests.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().expect("evidence store lock poisoned")
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().expect("evidence store lock poisoned")
    }

    /// Removes every expired entry. Mirrors the teacher's
    /// `ChallengeStore::cleanup_expired`, called from a periodic background
    /// task rather than inline on every read (reads check expiry lazily
    /// too, so a delayed sweep never serves stale data).
    pub fn cleanup_expired(&self) {
        let now = self.clock.now();
        let mut entries = self.lock_write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "cleaned up expired evidence store entries");
        }
    }

    /// Spawns a background task that periodically sweeps expired entries,
    /// mirroring `ChallengeStore::spawn_cleanup_task`.
    pub fn spawn_cleanup_task(store: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.cleanup_expired();
            }
        })
    }
}

impl Default for MemoryEvidenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvidenceStore for MemoryEvidenceStore {
    async fn put_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = self.clock.now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        self.lock_write().insert(
            key.to_string(),
            Entry {
                value: StoredValue::Scalar(value),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        let entries = self.lock_read();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => match &entry.value {
                StoredValue::Scalar(bytes) => Ok(Some(bytes.clone())),
                StoredValue::Set(_) => Ok(None),
            },
            _ => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.lock_write().remove(key);
        Ok(())
    }

    async fn append_set_member(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        let new_expiry = now + chrono::Duration::from_std(ttl).unwrap_or_default();
        let mut entries = self.lock_write();
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::Set(HashSet::new()),
            expires_at: new_expiry,
        });

        if entry.expires_at <= now {
            entry.value = StoredValue::Set(HashSet::new());
        }

        match &mut entry.value {
            StoredValue::Set(members) => {
                members.insert(member.to_string());
            }
            StoredValue::Scalar(_) => {
                entry.value = StoredValue::Set(HashSet::from([member.to_string()]));
            }
        }
        entry.expires_at = entry.expires_at.max(new_expiry);
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now();
        let entries = self.lock_read();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => match &entry.value {
                StoredValue::Set(members) => Ok(members.iter().cloned().collect()),
                StoredValue::Scalar(_) => Ok(Vec::new()),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn compare_and_set_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock_write();
        let present = matches!(entries.get(key), Some(entry) if entry.expires_at > now);
        if present {
            return Ok(false);
        }
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or_default();
        entries.insert(
            key.to_string(),
            Entry {
                value: StoredValue::Scalar(value),
                expires_at,
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryEvidenceStore::new();
        store.put_with_ttl("k", b"v".to_vec(), Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn get_returns_none_after_expiry() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let store = MemoryEvidenceStore::with_clock(clock.clone());
        store.put_with_ttl("k", b"v".to_vec(), Duration::from_secs(5)).await.unwrap();
        clock.advance(chrono::Duration::seconds(6));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn del_removes_entry() {
        let store = MemoryEvidenceStore::new();
        store.put_with_ttl("k", b"v".to_vec(), Duration::from_secs(10)).await.unwrap();
        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn append_set_member_accumulates_distinct_members() {
        let store = MemoryEvidenceStore::new();
        store.append_set_member("s", "a", Duration::from_secs(10)).await.unwrap();
        store.append_set_member("s", "b", Duration::from_secs(10)).await.unwrap();
        store.append_set_member("s", "a", Duration::from_secs(10)).await.unwrap();
        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn compare_and_set_absent_only_writes_once() {
        let store = MemoryEvidenceStore::new();
        assert!(store.compare_and_set_absent("k", b"first".to_vec(), Duration::from_secs(10)).await.unwrap());
        assert!(!store.compare_and_set_absent("k", b"second".to_vec(), Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn compare_and_set_absent_succeeds_again_after_expiry() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let store = MemoryEvidenceStore::with_clock(clock.clone());
        assert!(store.compare_and_set_absent("k", b"first".to_vec(), Duration::from_secs(5)).await.unwrap());
        clock.advance(chrono::Duration::seconds(6));
        assert!(store.compare_and_set_absent("k", b"second".to_vec(), Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn cleanup_expired_removes_stale_entries() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let store = MemoryEvidenceStore::with_clock(clock.clone());
        store.put_with_ttl("k", b"v".to_vec(), Duration::from_secs(5)).await.unwrap();
        clock.advance(chrono::Duration::seconds(6));
        store.cleanup_expired();
        assert_eq!(store.lock_read().len(), 0);
    }
}
