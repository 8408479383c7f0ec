//! Bounded retry for operations that classify their own failures.
//!
//! The executor never inspects error content: the operation decides whether a
//! failure is transient via [`RetryClass::is_retryable`]. The base policy has
//! no delay between attempts; callers opt in with [`RetryExecutor::with_delay`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Failure classification consumed by [`RetryExecutor`].
pub trait RetryClass: Sized {
    fn is_retryable(&self) -> bool;

    /// Tag the last failure once the attempt ceiling is reached.
    fn exhausted(self, attempts: u32) -> Self;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    max_attempts: u32,
    delay: Option<Duration>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryExecutor {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), delay: None }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = (!delay.is_zero()).then_some(delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds, fails fatally, or `max_attempts`
    /// invocations have failed retryably. The operation receives the 1-based
    /// attempt number.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClass + Display,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    warn!("[Retry] {} gave up after {} attempt(s): {}", label, attempt, e);
                    return Err(e.exhausted(attempt));
                },
                Err(e) => {
                    debug!(
                        "[Retry] {} transient failure, attempt {}/{}: {}",
                        label, attempt, self.max_attempts, e
                    );
                    if let Some(delay) = self.delay {
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }
    }
}
