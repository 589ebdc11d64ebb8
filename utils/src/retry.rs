//! Linear retry-with-backoff, the single retry policy for every store write.
//!
//! Attempt `n` (0-based) that fails is followed by a sleep of `n * BACKOFF_STEP`
//! before attempt `n + 1`, so the first retry is immediate. No sleep follows the
//! final attempt. The sleep uses `tokio::time`, so it suspends only the calling
//! task and is skipped over instantly under a paused test clock.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Backoff increment between consecutive attempts.
pub const BACKOFF_STEP: Duration = Duration::from_secs(1);

/// Every attempt failed; carries the error from the last one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed after {attempts} retries: {last_error}")]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` up to `max_retries` times (at least once).
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_retries: u32,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let attempts = max_retries.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!(attempt = attempt + 1, attempts, error = %e, "attempt failed");
                if attempt + 1 >= attempts {
                    return Err(RetryExhausted {
                        attempts,
                        last_error: e,
                    });
                }
                tokio::time::sleep(BACKOFF_STEP * attempt).await;
                attempt += 1;
            }
        }
    }
}
