//! Distributed Locks for Armature
//!
//! Token-based mutual exclusion on top of a shared key-value store. There
//! is no lock server: the store's atomic create-if-absent decides who gets
//! the lock, and server-side scripts compare the stored token before any
//! refresh or release.
//!
//! ## Features
//!
//! - **Ownership tokens** - 128 random bits per acquisition, plus optional metadata
//! - **Pluggable retries** - no retry, constant, exponential, and bounded strategies
//! - **Atomic refresh/release** - compare-then-act runs as one step in the store
//! - **Cancellation** - acquisition waits can be cut short with a `CancellationToken`
//! - **Backends** - Redis (`SET NX PX` + Lua) and an in-memory store for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use armature_redislock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LockClient::connect(&RedisConfig::from_env().build()).await?;
//!
//!     let options = Options::new()
//!         .with_retry(retry::LimitedRetry::new(
//!             retry::ExponentialBackoff::new(Duration::from_millis(16), Duration::from_secs(1)),
//!             10,
//!         ))
//!         .with_metadata("worker-1");
//!
//!     let lock = client.obtain("my-resource", Duration::from_secs(30), options).await?;
//!
//!     // Critical section
//!     lock.refresh(Duration::from_secs(30)).await?;
//!     println!("{:?} left", lock.time_to_live().await?);
//!
//!     lock.release().await?;
//!     Ok(())
//! }
//! ```
//!
//! Locks are not released on drop. A handle that is never released expires
//! with its TTL.

pub mod client;
#[cfg(feature = "redis")]
pub mod config;
pub mod error;
pub mod lock;
pub mod options;
pub mod retry;
pub mod stores;
pub mod token;

pub use client::{LockClient, with_cancel};
#[cfg(feature = "redis")]
pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{LockError, LockResult};
pub use lock::Lock;
pub use options::Options;
pub use retry::RetryStrategy;
#[cfg(feature = "redis")]
pub use stores::RedisStore;
pub use stores::{CheckAndAct, LockStore, MemoryStore, ScriptOutcome};
pub use token::TOKEN_LEN;

pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::client::{LockClient, with_cancel};
    pub use crate::error::{LockError, LockResult};
    pub use crate::lock::Lock;
    pub use crate::options::Options;
    pub use crate::retry::{
        ExponentialBackoff, LimitedRetry, LinearBackoff, NoRetry, RetryStrategy,
    };
    pub use crate::stores::{LockStore, MemoryStore};
    pub use tokio_util::sync::CancellationToken;
}
