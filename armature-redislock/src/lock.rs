//! Handle to an acquired lock

use crate::error::{LockError, LockResult};
use crate::stores::{CheckAndAct, LockStore, ScriptOutcome};
use crate::token::TOKEN_LEN;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A successfully acquired lock.
///
/// The handle is an immutable snapshot of the key and the value written at
/// acquisition time. It never changes: whether the lock is still held is
/// decided by the store when [`refresh`](Lock::refresh),
/// [`release`](Lock::release) or [`time_to_live`](Lock::time_to_live)
/// compare the stored value with this one. Nothing is released on drop;
/// an unreleased lock simply expires.
#[derive(Clone)]
pub struct Lock {
    store: Arc<dyn LockStore>,
    key: String,
    value: String,
}

impl Lock {
    pub(crate) fn new(store: Arc<dyn LockStore>, key: String, value: String) -> Self {
        Self { store, key, value }
    }

    /// Get the lock key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the full stored value (token followed by metadata)
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the ownership token
    pub fn token(&self) -> &str {
        &self.value[..TOKEN_LEN]
    }

    /// Get the metadata passed at acquisition
    pub fn metadata(&self) -> &str {
        &self.value[TOKEN_LEN..]
    }

    /// Get the remaining time-to-live.
    ///
    /// Returns zero when the key has expired, was released, or now belongs
    /// to someone else.
    pub async fn time_to_live(&self) -> LockResult<Duration> {
        match self.run(CheckAndAct::TimeToLive).await? {
            ScriptOutcome::Remaining(ttl) => Ok(ttl),
            _ => Ok(Duration::ZERO),
        }
    }

    /// Extend the lock to expire `ttl` from now.
    ///
    /// Fails with [`LockError::NotObtained`] if the lock is no longer held.
    pub async fn refresh(&self, ttl: Duration) -> LockResult<()> {
        match self.run(CheckAndAct::Refresh { ttl }).await? {
            ScriptOutcome::Acted => {
                debug!(key = %self.key, ttl = ?ttl, "Refreshed lock");
                Ok(())
            }
            outcome => {
                warn!(key = %self.key, outcome = ?outcome, "Failed to refresh lock (not held or expired)");
                Err(LockError::NotObtained)
            }
        }
    }

    /// Release the lock.
    ///
    /// Fails with [`LockError::LockNotHeld`] if the key is gone or holds
    /// another value.
    pub async fn release(&self) -> LockResult<()> {
        match self.run(CheckAndAct::Release).await? {
            ScriptOutcome::Acted => {
                debug!(key = %self.key, "Released lock");
                Ok(())
            }
            outcome => {
                warn!(key = %self.key, outcome = ?outcome, "Failed to release lock (not held or expired)");
                Err(LockError::LockNotHeld)
            }
        }
    }

    async fn run(&self, op: CheckAndAct) -> LockResult<ScriptOutcome> {
        self.store.check_and_act(op, &self.key, &self.value).await
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key)
            .field("token", &self.token())
            .field("store", &self.store.store_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    const TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAAA";

    fn held(store: &Arc<MemoryStore>, key: &str, metadata: &str) -> Lock {
        let value = format!("{}{}", TOKEN, metadata);
        store.set(key, &value, Duration::from_secs(10));
        Lock::new(store.clone(), key.to_string(), value)
    }

    #[test]
    fn test_token_and_metadata_split() {
        let store = Arc::new(MemoryStore::new());
        let lock = held(&store, "res", "host-1");

        assert_eq!(lock.key(), "res");
        assert_eq!(lock.token(), TOKEN);
        assert_eq!(lock.metadata(), "host-1");
        assert_eq!(format!("{}{}", lock.token(), lock.metadata()), lock.value());
    }

    #[test]
    fn test_debug_hides_metadata() {
        let store = Arc::new(MemoryStore::new());
        let lock = held(&store, "res", "secret-metadata");

        let debug = format!("{:?}", lock);
        assert!(debug.contains("res"));
        assert!(debug.contains("memory"));
        assert!(!debug.contains("secret-metadata"));
    }

    #[tokio::test]
    async fn test_release_then_release_again() {
        let store = Arc::new(MemoryStore::new());
        let lock = held(&store, "res", "");

        lock.release().await.unwrap();
        assert!(store.get("res").is_none());
        assert!(matches!(lock.release().await, Err(LockError::LockNotHeld)));
    }

    #[tokio::test]
    async fn test_refresh_after_takeover() {
        let store = Arc::new(MemoryStore::new());
        let lock = held(&store, "res", "");
        store.set("res", "someone-else", Duration::from_secs(10));

        assert!(matches!(
            lock.refresh(Duration::from_secs(5)).await,
            Err(LockError::NotObtained)
        ));
        assert_eq!(lock.time_to_live().await.unwrap(), Duration::ZERO);
        assert_eq!(store.get("res").as_deref(), Some("someone-else"));
    }
}
