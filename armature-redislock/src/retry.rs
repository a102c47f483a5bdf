//! Retry strategies for lock acquisition.
//!
//! A strategy is asked for the next backoff once per failed acquisition
//! attempt. Returning [`Duration::ZERO`] tells the client to stop retrying.

use std::fmt::Debug;
use std::time::Duration;

/// Largest exponent used by [`ExponentialBackoff`]; later steps stay here.
const MAX_EXPONENT: u32 = 26;

/// Backoff policy consulted between acquisition attempts.
///
/// Strategies may keep per-acquisition state (attempt counters). Each
/// [`Options`](crate::Options) owns its strategy and is consumed by a single
/// `obtain` call, so state never leaks between acquisitions.
pub trait RetryStrategy: Send + Debug {
    /// Get the wait before the next attempt, or zero to give up.
    fn next_backoff(&mut self) -> Duration;
}

impl RetryStrategy for Box<dyn RetryStrategy> {
    fn next_backoff(&mut self) -> Duration {
        (**self).next_backoff()
    }
}

/// Never retry: the first failed attempt ends the acquisition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_backoff(&mut self) -> Duration {
        Duration::ZERO
    }
}

/// Retry forever at a constant interval.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    backoff: Duration,
}

impl LinearBackoff {
    /// Create a constant backoff of `backoff` between attempts
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }
}

impl RetryStrategy for LinearBackoff {
    fn next_backoff(&mut self) -> Duration {
        self.backoff
    }
}

/// Bound another strategy to `max` retries.
///
/// The inner strategy is consulted for the first `max + 1` calls; every call
/// after that returns zero.
#[derive(Debug)]
pub struct LimitedRetry<S = Box<dyn RetryStrategy>> {
    inner: S,
    count: u32,
    max: u32,
}

impl<S: RetryStrategy> LimitedRetry<S> {
    /// Wrap `inner` with a retry limit
    pub fn new(inner: S, max: u32) -> Self {
        Self {
            inner,
            count: 0,
            max,
        }
    }
}

impl<S: RetryStrategy> RetryStrategy for LimitedRetry<S> {
    fn next_backoff(&mut self) -> Duration {
        if self.count > self.max {
            return Duration::ZERO;
        }
        self.count += 1;
        self.inner.next_backoff()
    }
}

/// Exponential backoff in milliseconds.
///
/// The n-th call (starting at 1) yields 2^n ms, raised to `min` and limited
/// to `max`. A zero `max` leaves the delay uncapped. Past 2^26 ms the step
/// stops growing.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    count: u32,
    min: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create an exponential backoff bounded by `min` and `max`
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { count: 0, min, max }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_backoff(&mut self) -> Duration {
        self.count = self.count.saturating_add(1);
        let exponent = self.count.min(MAX_EXPONENT);
        let delay = Duration::from_millis(1u64 << exponent);

        if delay < self.min {
            self.min
        } else if !self.max.is_zero() && delay > self.max {
            self.max
        } else {
            delay
        }
    }
}

/// Boxed [`NoRetry`]
pub fn no_retry() -> Box<dyn RetryStrategy> {
    Box::new(NoRetry)
}

/// Boxed [`LinearBackoff`]
pub fn linear_backoff(backoff: Duration) -> Box<dyn RetryStrategy> {
    Box::new(LinearBackoff::new(backoff))
}

/// Boxed [`LimitedRetry`] around an already boxed strategy
pub fn limit_retry(strategy: Box<dyn RetryStrategy>, max: u32) -> Box<dyn RetryStrategy> {
    Box::new(LimitedRetry::new(strategy, max))
}

/// Boxed [`ExponentialBackoff`]
pub fn exponential_backoff(min: Duration, max: Duration) -> Box<dyn RetryStrategy> {
    Box::new(ExponentialBackoff::new(min, max))
}
