use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::{Cancellation, Context};

/// Constant-interval policy for retrying failed connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (excludes the initial attempt).
    pub max_retries: u32,
    /// Delay between a failed attempt and the next one.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// A policy that performs no retries (single attempt only).
    pub fn none() -> Self {
        Self::default()
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Upper bound on time spent waiting between attempts.
    pub fn total_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_retries)
    }
}

/// Outcome of a [`with_retry`] run that did not succeed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The context ended before an attempt succeeded.
    Cancelled(Cancellation),
    /// Every attempt failed; `last` is the final attempt's error.
    Exhausted { attempts: u32, last: E },
}

/// Execute a closure with retry logic according to the given policy.
///
/// Calls `f` up to `policy.max_attempts()` times. Each attempt and each
/// inter-attempt wait is raced against `ctx`; an ended context aborts with
/// [`RetryError::Cancelled`] without waiting out the remaining budget, and a
/// context that has already ended makes no attempt at all.
pub async fn with_retry<F, Fut, T, E>(
    ctx: &Context,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match ctx.run(f()).await.map_err(RetryError::Cancelled)? {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::warn!(
                attempt,
                error = %err,
                "final connection attempt failed"
            );
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        tracing::warn!(
            attempt,
            max = max_attempts,
            delay_ms = policy.interval.as_millis() as u64,
            error = %err,
            "connection attempt failed, retrying"
        );
        ctx.sleep(policy.interval)
            .await
            .map_err(RetryError::Cancelled)?;
    }
}
