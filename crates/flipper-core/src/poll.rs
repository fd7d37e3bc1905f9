//! Bounded waiting.
//!
//! The client's UI reacts to input with unpredictable latency, so
//! every observation is a poll with a deadline: probe, sleep, probe
//! again, give up after the timeout. Nothing in the bot ever waits
//! unboundedly.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Default probe spacing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default deadline for a single UI reaction.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from bounded waiting.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Condition not met within {0:?}")]
    TimedOut(Duration),
}

/// Result type for polling operations.
pub type PollResult<T> = Result<T, PollError>;

/// Poll `probe` every `interval` until it yields a value or `timeout`
/// elapses. The probe runs at least once, even with a zero timeout.
pub async fn poll_until<F, Fut, T>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> PollResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        if let Some(value) = probe().await {
            trace!(attempts, "poll condition met");
            return Ok(value);
        }
        attempts += 1;
        if tokio::time::Instant::now() >= deadline {
            return Err(PollError::TimedOut(timeout));
        }
        tokio::time::sleep_until(deadline.min(tokio::time::Instant::now() + interval)).await;
    }
}

/// Poll with the default interval and timeout.
pub async fn poll_default<F, Fut, T>(probe: F) -> PollResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    poll_until(DEFAULT_POLL_TIMEOUT, DEFAULT_POLL_INTERVAL, probe).await
}

/// Run a fallible operation up to `max_attempts` times, returning the
/// first success or the last error.
pub async fn retry<F, Fut, T, E>(max_attempts: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(_) => trace!(attempt, attempts, "retry attempt failed"),
        }
    }
    // the final attempt's outcome is the caller's
    op().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn poll_returns_as_soon_as_condition_holds() {
        let count = AtomicU32::new(0);
        let result = poll_until(Duration::from_secs(10), Duration::from_millis(100), || {
            let n = count.fetch_add(1, Ordering::SeqCst);
            async move {
                if n >= 3 {
                    Some(n)
                } else {
                    None
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_when_condition_never_holds() {
        let count = AtomicU32::new(0);
        let result: PollResult<()> =
            poll_until(Duration::from_secs(1), Duration::from_millis(100), || {
                count.fetch_add(1, Ordering::SeqCst);
                async { None }
            })
            .await;
        assert!(matches!(result, Err(PollError::TimedOut(_))));
        // ~1s / 100ms spacing plus the initial probe
        let probes = count.load(Ordering::SeqCst);
        assert!(probes >= 10 && probes <= 12, "probes = {}", probes);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_probes_at_least_once_with_zero_timeout() {
        let count = AtomicU32::new(0);
        let _: PollResult<()> = poll_until(Duration::ZERO, Duration::from_millis(100), || {
            count.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_stops_at_first_success() {
        let count = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(5, || {
            let n = count.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 2 {
                    Ok(n)
                } else {
                    Err("not yet")
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_returns_last_error_after_exhaustion() {
        let count = AtomicU32::new(0);
        let result: Result<(), u32> = retry(5, || {
            let n = count.fetch_add(1, Ordering::SeqCst);
            async move { Err(n) }
        })
        .await;
        assert_eq!(result, Err(4));
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn retry_treats_zero_attempts_as_one() {
        let result: Result<(), &str> = retry(0, || async { Err("nope") }).await;
        assert!(result.is_err());
    }
}
