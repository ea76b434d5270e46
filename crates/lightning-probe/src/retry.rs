//! Retry Executor and Poll Loops
//!
//! Two timing primitives sit beneath every page interaction:
//!
//! - [`execute_with_retry`]: bounded attempts with deterministic exponential
//!   backoff (no jitter). Used by fill/type/click.
//! - [`Poller`] / [`poll_until`]: fixed-interval polling against a deadline.
//!   Used by the field resolver and element waits.
//!
//! Both sleep on the tokio clock, so tests can run them under a paused clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of attempts for interaction primitives
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts (400ms)
pub const DEFAULT_BASE_DELAY_MS: u64 = 400;

/// Default backoff multiplier
pub const DEFAULT_MULTIPLIER: u32 = 2;

/// Bounded retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait after the first failure
    pub base_delay: Duration,
    /// Growth factor applied per further failure
    pub multiplier: u32,
    /// Stop immediately on errors that are not transient
    pub transient_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            multiplier: DEFAULT_MULTIPLIER,
            transient_only: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and base delay
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: DEFAULT_MULTIPLIER,
            transient_only: false,
        }
    }

    /// Set the backoff multiplier
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Only retry errors classified as transient
    #[must_use]
    pub const fn transient_only(mut self) -> Self {
        self.transient_only = true;
        self
    }

    /// A single attempt, no waiting
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Attempt budget, never below one
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the failed attempt with 0-based index `attempt_index`:
    /// `base_delay × multiplier^attempt_index`
    #[must_use]
    pub fn delay_after(&self, attempt_index: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt_index);
        self.base_delay.saturating_mul(factor)
    }

    /// Sum of all waits a permanently failing operation incurs
    #[must_use]
    pub fn worst_case_delay(&self) -> Duration {
        (0..self.attempts().saturating_sub(1))
            .map(|i| self.delay_after(i))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Failure after every attempt was spent
#[derive(Debug)]
pub struct RetryError<E> {
    /// Attempts made
    pub attempts: u32,
    /// Wall-clock time spent, waits included
    pub elapsed: Duration,
    last: E,
}

impl<E> RetryError<E> {
    /// The last underlying failure
    #[must_use]
    pub const fn last(&self) -> &E {
        &self.last
    }

    /// Unwrap the last underlying failure
    pub fn into_last(self) -> E {
        self.last
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed after {} attempt(s) ({:.2}s): {}",
            self.attempts,
            self.elapsed.as_secs_f64(),
            self.last
        )
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last)
    }
}

/// Run `operation` until it succeeds or the policy's attempts are spent.
///
/// Every error is retried the same way; see [`execute_with_retry_if`] to
/// stop early on some errors.
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    execute_with_retry_if(policy, operation, |_| true).await
}

/// Like [`execute_with_retry`], but gives up at once when `should_retry`
/// returns false for a failure.
pub async fn execute_with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let start = Instant::now();
    let attempts = policy.attempts();
    let mut index = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if index > 0 {
                    tracing::debug!(attempt = index + 1, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let made = index + 1;
                if made >= attempts || !should_retry(&err) {
                    return Err(RetryError {
                        attempts: made,
                        elapsed: start.elapsed(),
                        last: err,
                    });
                }
                let delay = policy.delay_after(index);
                tracing::debug!(
                    attempt = made,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                index += 1;
            }
        }
    }
}

/// Default resolver poll interval (300ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

/// Fixed-interval poll clock bounded by a deadline.
///
/// ```ignore
/// let mut poller = Poller::new(timeout, interval);
/// loop {
///     if let Some(v) = probe().await { return Ok(v); }
///     if !poller.wait_next().await { break; }
/// }
/// ```
///
/// The last probe always happens at or after the deadline, and a wait never
/// sleeps past it.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    start: Instant,
    deadline: Instant,
    interval: Duration,
    polls: u32,
}

impl Poller {
    /// Start a poll clock now
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        let start = Instant::now();
        Self {
            start,
            deadline: start + timeout,
            interval,
            polls: 1,
        }
    }

    /// Sleep until the next poll. Returns false once the deadline has passed.
    pub async fn wait_next(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let remaining = self.deadline - now;
        tokio::time::sleep(self.interval.min(remaining)).await;
        self.polls += 1;
        true
    }

    /// Time since the clock started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Number of polls granted so far, counting the first
    #[must_use]
    pub const fn polls(&self) -> u32 {
        self.polls
    }
}

/// Poll `probe` until it yields a value or `timeout` passes.
///
/// Returns the elapsed time on expiry.
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, Duration>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut poller = Poller::new(timeout, interval);
    loop {
        if let Some(value) = probe().await {
            return Ok(value);
        }
        if !poller.wait_next().await {
            return Err(poller.elapsed());
        }
    }
}
