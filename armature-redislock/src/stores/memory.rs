//! In-memory lock store
//!
//! Uses DashMap for thread-safe concurrent access. Every operation holds the
//! shard guard for its key for the whole compare-then-act, which makes it
//! atomic within this process. Suitable for single-instance deployments or
//! testing; use the Redis store to coordinate across processes.
//!
//! Expiry runs on [`tokio::time::Instant`], so tests with a paused clock can
//! advance through lock lifetimes deterministically. Expired entries are
//! dropped when touched, and swept from the whole map every
//! `PURGE_INTERVAL` acquisitions.

use crate::error::LockResult;
use crate::stores::{CheckAndAct, LockStore, ScriptOutcome, ttl_millis};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Number of create-if-absent calls between full sweeps of expired entries
const PURGE_INTERVAL: u64 = 64;

/// Stand-in expiry for TTLs too large to add to an instant (~30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Compute the expiry instant for `ttl`, saturating instead of overflowing.
fn expiry_after(now: Instant, ttl: Duration) -> Instant {
    let ttl = Duration::from_millis(ttl_millis(ttl));
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn new(value: &str, ttl: Duration, now: Instant) -> Self {
        Self {
            value: value.to_string(),
            expires_at: expiry_after(now, ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory lock store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
    creates: AtomicU64,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        debug!("Creating new in-memory lock store");
        Self::default()
    }

    /// Unconditionally set a key, replacing whatever is stored
    pub fn set(&self, key: impl Into<String>, value: &str, ttl: Duration) {
        self.entries
            .insert(key.into(), StoredValue::new(value, ttl, Instant::now()));
    }

    /// Get the live value at a key
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Delete a key regardless of its value
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop expired entries
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Get the number of stored keys, including expired ones not yet purged
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn create_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        // Sweep before taking the entry guard; retain locks every shard
        if self.creates.fetch_add(1, Ordering::Relaxed) % PURGE_INTERVAL == PURGE_INTERVAL - 1 {
            self.purge_expired();
        }

        let now = Instant::now();

        let created = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now) {
                    entry.insert(StoredValue::new(value, ttl, now));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(StoredValue::new(value, ttl, now));
                true
            }
        };

        trace!(key = %key, created = created, "Memory create-if-absent");
        Ok(created)
    }

    async fn check_and_act(
        &self,
        op: CheckAndAct,
        key: &str,
        expected: &str,
    ) -> LockResult<ScriptOutcome> {
        let now = Instant::now();

        let outcome = match self.entries.entry(key.to_string()) {
            Entry::Vacant(_) => ScriptOutcome::Absent,
            Entry::Occupied(entry) if entry.get().is_expired(now) => {
                entry.remove();
                ScriptOutcome::Absent
            }
            Entry::Occupied(entry) if entry.get().value != expected => ScriptOutcome::Mismatch,
            Entry::Occupied(mut entry) => match op {
                CheckAndAct::Refresh { ttl } => {
                    entry.get_mut().expires_at = expiry_after(now, ttl);
                    ScriptOutcome::Acted
                }
                CheckAndAct::Release => {
                    entry.remove();
                    ScriptOutcome::Acted
                }
                CheckAndAct::TimeToLive => {
                    ScriptOutcome::Remaining(entry.get().expires_at.saturating_duration_since(now))
                }
            },
        };

        trace!(key = %key, op = op.name(), outcome = ?outcome, "Memory check-and-act");
        Ok(outcome)
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_create_if_absent() {
        let store = MemoryStore::new();

        assert!(store.create_if_absent("key1", "a", TTL).await.unwrap());
        assert!(!store.create_if_absent("key1", "b", TTL).await.unwrap());
        assert_eq!(store.get("key1").as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_after_expiry() {
        let store = MemoryStore::new();

        assert!(
            store
                .create_if_absent("key1", "a", Duration::from_millis(50))
                .await
                .unwrap()
        );
        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(store.get("key1").is_none());
        assert!(store.create_if_absent("key1", "b", TTL).await.unwrap());
        assert_eq!(store.get("key1").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_release_requires_matching_value() {
        let store = MemoryStore::new();
        store.set("key1", "a", TTL);

        let outcome = store
            .check_and_act(CheckAndAct::Release, "key1", "b")
            .await
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Mismatch);
        assert_eq!(store.get("key1").as_deref(), Some("a"));

        let outcome = store
            .check_and_act(CheckAndAct::Release, "key1", "a")
            .await
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Acted);
        assert!(store.get("key1").is_none());

        let outcome = store
            .check_and_act(CheckAndAct::Release, "key1", "a")
            .await
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_and_ttl() {
        let store = MemoryStore::new();
        store.set("key1", "a", Duration::from_secs(1));

        let outcome = store
            .check_and_act(CheckAndAct::Refresh { ttl: Duration::from_secs(30) }, "key1", "a")
            .await
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Acted);

        tokio::time::advance(Duration::from_secs(5)).await;
        let outcome = store
            .check_and_act(CheckAndAct::TimeToLive, "key1", "a")
            .await
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Remaining(Duration::from_secs(25)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent() {
        let store = MemoryStore::new();
        store.set("key1", "a", Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;

        let outcome = store
            .check_and_act(CheckAndAct::TimeToLive, "key1", "a")
            .await
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Absent);
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisitions_sweep_expired_keys() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.set(format!("stale:{}", i), "a", Duration::from_millis(10));
        }
        tokio::time::advance(Duration::from_millis(20)).await;

        for i in 0..PURGE_INTERVAL - 1 {
            store
                .create_if_absent(&format!("live:{}", i), "b", TTL)
                .await
                .unwrap();
        }
        assert_eq!(store.key_count(), 10 + (PURGE_INTERVAL as usize - 1));

        store.create_if_absent("live:last", "b", TTL).await.unwrap();
        assert_eq!(store.key_count(), PURGE_INTERVAL as usize);
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let store = MemoryStore::new();
        assert!(
            store
                .create_if_absent("key1", "a", Duration::MAX)
                .await
                .unwrap()
        );

        let outcome = store
            .check_and_act(CheckAndAct::Refresh { ttl: Duration::MAX }, "key1", "a")
            .await
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Acted);

        let outcome = store
            .check_and_act(CheckAndAct::TimeToLive, "key1", "a")
            .await
            .unwrap();
        assert!(matches!(outcome, ScriptOutcome::Remaining(ttl) if ttl > Duration::from_secs(86400)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set("short", "a", Duration::from_millis(10));
        store.set("long", "b", TTL);
        tokio::time::advance(Duration::from_millis(20)).await;

        store.purge_expired();
        assert_eq!(store.key_count(), 1);
        assert!(store.remove("long"));
        assert!(!store.remove("long"));
    }
}
