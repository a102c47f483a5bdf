//! Per-acquisition options

use crate::retry::{NoRetry, RetryStrategy};

/// Options for a single [`LockClient::obtain`](crate::LockClient::obtain) call.
///
/// Defaults: no retry and empty metadata.
#[derive(Debug)]
pub struct Options {
    retry: Box<dyn RetryStrategy>,
    metadata: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry: Box::new(NoRetry),
            metadata: String::new(),
        }
    }
}

impl Options {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry strategy
    pub fn with_retry(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.retry = Box::new(strategy);
        self
    }

    /// Set metadata stored after the token in the lock value
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Get the metadata
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    pub(crate) fn into_parts(self) -> (Box<dyn RetryStrategy>, String) {
        (self.retry, self.metadata)
    }
}
