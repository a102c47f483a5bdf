//! Lock storage backends
//!
//! A lock only needs two things from its store:
//!
//! - **create-if-absent** with an expiration, used to acquire
//! - **check-and-act**, a compare-then-act step the store runs atomically,
//!   used to refresh, release and query the TTL of a held lock
//!
//! Backends:
//!
//! - **Redis**: `SET NX PX` plus Lua scripts (feature `redis`)
//! - **Memory**: in-process store using DashMap (single instance, tests)

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use crate::error::LockResult;
use async_trait::async_trait;
use std::time::Duration;

/// Compare-then-act operations a store must run as one indivisible step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAndAct {
    /// Set a new expiration if the value matches
    Refresh {
        /// New time-to-live
        ttl: Duration,
    },
    /// Delete the key if the value matches
    Release,
    /// Report the remaining expiration if the value matches
    TimeToLive,
}

impl CheckAndAct {
    /// Operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Refresh { .. } => "refresh",
            Self::Release => "release",
            Self::TimeToLive => "ttl",
        }
    }
}

/// Result of a check-and-act step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Value matched and the refresh or release was applied
    Acted,
    /// Value matched; remaining time-to-live of the key
    Remaining(Duration),
    /// The key holds a different value
    Mismatch,
    /// The key does not exist
    Absent,
}

/// Trait for lock storage backends
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with the given expiration, only if the key is
    /// absent. Returns whether the key was newly set.
    async fn create_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool>;

    /// Compare the value at `key` with `expected` and run `op` if they match,
    /// all in one atomic step.
    async fn check_and_act(
        &self,
        op: CheckAndAct,
        key: &str,
        expected: &str,
    ) -> LockResult<ScriptOutcome>;

    /// Get store type name for debugging
    fn store_type(&self) -> &'static str;
}

/// Convert a TTL to whole milliseconds for the store, never below 1 ms.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
