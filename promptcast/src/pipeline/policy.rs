//! Failure policies for remote calls.
//!
//! A worker hands each remote call to its [`FailurePolicy`]. The policy
//! bounds every attempt with the per-call timeout and decides whether a
//! failed attempt is tried again. Whatever the policy, the item is dropped
//! once the policy gives up; workers never propagate item failures.

use super::error::StageFailure;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Backoff doubling stops after this many retries.
const MAX_BACKOFF_SHIFT: u32 = 10;

/// What a stage does when a remote call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and drop the item.
    #[default]
    DropOnFailure,
    /// Retry retryable failures with exponential backoff, then drop.
    RetryWithBackoff {
        /// Attempts after the first one
        max_retries: u32,
        /// Delay before the first retry; doubles on every further retry
        initial_backoff: Duration,
    },
}

impl FailurePolicy {
    /// Retry policy with the default backoff.
    pub fn retry_with_backoff(max_retries: u32) -> Self {
        FailurePolicy::RetryWithBackoff {
            max_retries,
            initial_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Total attempts a call gets, including the first.
    pub fn max_attempts(&self) -> u32 {
        match self {
            FailurePolicy::DropOnFailure => 1,
            FailurePolicy::RetryWithBackoff { max_retries, .. } => max_retries.saturating_add(1),
        }
    }

    /// Delay after the `failed_attempts`-th failure.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        match self {
            FailurePolicy::DropOnFailure => Duration::ZERO,
            FailurePolicy::RetryWithBackoff {
                initial_backoff, ..
            } => {
                let shift = failed_attempts.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
                initial_backoff.saturating_mul(1 << shift)
            }
        }
    }

    /// Runs `call` under this policy.
    ///
    /// Each attempt is cancelled after `call_timeout` and reported as the
    /// stage's timeout error. `on_retry` is invoked with the error and the
    /// attempt number before every retry.
    pub async fn execute<T, E, F, Fut, R>(
        &self,
        call_timeout: Duration,
        mut on_retry: R,
        mut call: F,
    ) -> Result<T, E>
    where
        E: StageFailure,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(&E, u32),
    {
        let attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(call_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    on_retry(&e, attempt);
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::DropOnFailure => f.write_str("drop"),
            FailurePolicy::RetryWithBackoff {
                max_retries,
                initial_backoff,
            } => write!(f, "retry(max={}, backoff={:?})", max_retries, initial_backoff),
        }
    }
}
