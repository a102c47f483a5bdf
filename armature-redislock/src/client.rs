//! Lock acquisition

use crate::error::{LockError, LockResult};
use crate::lock::Lock;
use crate::options::Options;
use crate::retry::RetryStrategy;
use crate::stores::LockStore;
use crate::token::TokenGenerator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Client that acquires locks from a [`LockStore`].
///
/// Cheap to clone; clones share the store and the token generator. Safe to
/// use from many tasks at once, for the same or different keys.
#[derive(Clone)]
pub struct LockClient {
    store: Arc<dyn LockStore>,
    tokens: Arc<TokenGenerator>,
}

impl LockClient {
    /// Create a client on top of a store
    ///
    /// # Examples
    ///
    /// ```rust
    /// use armature_redislock::{LockClient, MemoryStore};
    ///
    /// let client = LockClient::new(MemoryStore::new());
    /// ```
    pub fn new(store: impl LockStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Create a client on top of a shared store
    pub fn from_arc(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            tokens: Arc::new(TokenGenerator::new()),
        }
    }

    /// Connect to Redis and create a client on top of it
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use armature_redislock::{LockClient, RedisConfig};
    ///
    /// let client = LockClient::connect(&RedisConfig::from_env().build()).await?;
    /// ```
    #[cfg(feature = "redis")]
    pub async fn connect(config: &crate::config::RedisConfig) -> LockResult<Self> {
        Ok(Self::new(crate::stores::RedisStore::connect(config).await?))
    }

    /// Acquire the lock at `key`, expiring after `ttl`.
    ///
    /// On contention the retry strategy from `options` decides how long to
    /// wait before the next attempt. Retries stop when the strategy returns
    /// zero or when `ttl` has elapsed since the call started, and the call
    /// fails with [`LockError::NotObtained`].
    ///
    /// Note that `ttl` is used twice: as the lock's expiration once acquired
    /// and as the total time spent retrying. Long-lived locks are therefore
    /// also waited on for longer.
    ///
    /// Store errors and entropy failures are returned immediately and never
    /// retried.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use armature_redislock::{LockClient, Options, retry::LinearBackoff};
    /// use std::time::Duration;
    ///
    /// let options = Options::new()
    ///     .with_retry(LinearBackoff::new(Duration::from_millis(100)))
    ///     .with_metadata("worker-1");
    /// let lock = client.obtain("jobs:nightly", Duration::from_secs(30), options).await?;
    ///
    /// // Critical section
    ///
    /// lock.release().await?;
    /// ```
    pub async fn obtain(&self, key: &str, ttl: Duration, options: Options) -> LockResult<Lock> {
        self.obtain_with_cancel(key, ttl, options, &CancellationToken::new())
            .await
    }

    /// Like [`obtain`](Self::obtain), but gives up with
    /// [`LockError::Cancelled`] as soon as `cancel` fires.
    ///
    /// Cancelling only affects this call.
    pub async fn obtain_with_cancel(
        &self,
        key: &str,
        ttl: Duration,
        options: Options,
        cancel: &CancellationToken,
    ) -> LockResult<Lock> {
        let token = self.tokens.generate()?;
        let (retry, metadata) = options.into_parts();
        let value = token + &metadata;

        with_cancel(cancel, self.acquire(key, value, ttl, retry, cancel)).await
    }

    async fn acquire(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        mut retry: Box<dyn RetryStrategy>,
        cancel: &CancellationToken,
    ) -> LockResult<Lock> {
        // A ttl too large to represent as an instant never times out
        let deadline = Instant::now().checked_add(ttl);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if self.store.create_if_absent(key, &value, ttl).await? {
                info!(key = %key, attempts = attempts, "Acquired lock");
                return Ok(Lock::new(self.store.clone(), key.to_string(), value));
            }

            let backoff = retry.next_backoff();
            if backoff.is_zero() {
                debug!(key = %key, attempts = attempts, "Giving up on lock: retries exhausted");
                return Err(LockError::NotObtained);
            }

            debug!(key = %key, attempts = attempts, backoff = ?backoff, "Lock held elsewhere, backing off");

            tokio::select! {
                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                _ = wait_until(deadline) => {
                    debug!(key = %key, attempts = attempts, "Giving up on lock: deadline reached");
                    return Err(LockError::NotObtained);
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

impl std::fmt::Debug for LockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockClient")
            .field("store", &self.store.store_type())
            .finish()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run `future` unless `cancel` fires first.
///
/// Useful for making [`Lock`] operations cancellable:
///
/// ```rust,ignore
/// let ttl = with_cancel(&shutdown, lock.time_to_live()).await?;
/// ```
pub async fn with_cancel<T, F>(cancel: &CancellationToken, future: F) -> LockResult<T>
where
    F: Future<Output = LockResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LockError::Cancelled),
        result = future => result,
    }
}
