//! Retry mechanism with exponential backoff
//!
//! Bounded retry around a fallible operation. The async and sync variants share
//! the same semantics and differ only in how they wait between attempts.

use crate::backoff::RetryPolicy;
use crate::error::{RelaisError, Result};
use std::fmt::Display;
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Retry an async operation, retrying only transient network failures.
///
/// Uses [`RelaisError::is_retryable`] as the predicate.
pub async fn retry_async<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async_with(policy, RelaisError::is_retryable, operation).await
}

/// Retry an async operation with a caller-supplied retry predicate.
///
/// The operation runs at most `policy.max_attempts()` times. The last failure
/// is returned unchanged; a failure rejected by `is_retryable` is returned
/// immediately.
pub async fn retry_async_with<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        debug!("Executing attempt {}/{}", attempt + 1, max_attempts);

        let err = match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            debug!("Non-retryable error: {}", err);
            return Err(err);
        }

        if attempt + 1 >= max_attempts {
            error!("All {} attempts failed. Last error: {}", max_attempts, err);
            return Err(err);
        }

        let delay = policy.get_delay(attempt);
        warn!(
            "Attempt {} failed: {}. Retrying in {:.2}s...",
            attempt + 1,
            err,
            delay.as_secs_f64()
        );
        sleep(delay).await;
        attempt += 1;
    }
}

/// Retry a synchronous operation, retrying only transient network failures.
pub fn retry_sync<F, T>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    retry_sync_with(policy, RelaisError::is_retryable, operation)
}

/// Retry a synchronous operation with a caller-supplied retry predicate.
///
/// Blocks the calling thread between attempts.
pub fn retry_sync_with<F, T, E, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> std::result::Result<T, E>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        debug!("Executing attempt {}/{}", attempt + 1, max_attempts);

        let err = match operation() {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            debug!("Non-retryable error: {}", err);
            return Err(err);
        }

        if attempt + 1 >= max_attempts {
            error!("All {} attempts failed. Last error: {}", max_attempts, err);
            return Err(err);
        }

        let delay = policy.get_delay(attempt);
        warn!(
            "Attempt {} failed: {}. Retrying in {:.2}s...",
            attempt + 1,
            err,
            delay.as_secs_f64()
        );
        std::thread::sleep(delay);
        attempt += 1;
    }
}

/// Predicate that retries every failure.
///
/// Matches the historical behaviour of retrying on any error.
pub fn always<E>(_: &E) -> bool {
    true
}
