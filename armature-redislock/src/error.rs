//! Error types for distributed locks

use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Distributed lock errors
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock could not be acquired within the retry budget, or a refresh
    /// found that the lock is no longer ours
    #[error("redislock: not obtained")]
    NotObtained,

    /// Release found the key absent or holding another value
    #[error("redislock: lock not held")]
    LockNotHeld,

    /// The caller cancelled the operation
    #[error("redislock: operation cancelled")]
    Cancelled,

    /// The entropy source failed while generating a token
    #[error("redislock: failed to generate token: {0}")]
    Randomness(#[source] std::io::Error),

    /// Store error (memory, timeouts, etc.)
    #[error("Lock store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Lock configuration error: {0}")]
    Config(String),

    /// Redis error, passed through unchanged
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl LockError {
    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this is a "not obtained" outcome
    pub fn is_not_obtained(&self) -> bool {
        matches!(self, Self::NotObtained)
    }

    /// Check if this is a "lock not held" outcome
    pub fn is_lock_not_held(&self) -> bool {
        matches!(self, Self::LockNotHeld)
    }

    /// Check if the caller cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
