use std::future::Future;

use rand::Rng as _;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Errors that know whether the failed call is worth repeating.
///
/// Implemented by the remote feed and download error types so each
/// collaborator call gets the same classification at every call site.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Bounded retry policy: `max_retries` repeats after the first attempt,
/// with capped exponential backoff and jitter between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 9,
            base_delay_secs: 2,
            max_delay_secs: 60,
        }
    }
}

impl RetryConfig {
    /// Policy that makes `attempts` calls in total before giving up.
    pub fn with_attempts(attempts: u32, base_delay_secs: u64) -> Self {
        Self {
            max_retries: attempts.saturating_sub(1),
            base_delay_secs,
            max_delay_secs: 60,
        }
    }

    /// Total number of calls made, including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Compute the delay for a given retry attempt (0-indexed).
    ///
    /// Formula: `min(base_delay * 2^retry, max_delay) + random_jitter(0..base_delay)`.
    /// A zero base delay yields no wait at all.
    pub fn delay_for_retry(&self, retry: u32) -> std::time::Duration {
        let exp_delay = self
            .base_delay_secs
            .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX));
        let capped = exp_delay.min(self.max_delay_secs);
        let jitter = if self.base_delay_secs > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_secs)
        } else {
            0
        };
        std::time::Duration::from_secs(capped + jitter)
    }
}

/// Retry an async operation with exponential backoff and jitter.
///
/// Returns the first `Ok` result, or the last error if retries are exhausted
/// or the classifier returns `Abort`.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classifier: C,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = config.attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if classifier(&e) == RetryAction::Abort {
                    return Err(e);
                }
                attempt += 1;
                if attempt >= total_attempts {
                    return Err(e);
                }
                let delay = config.delay_for_retry(attempt - 1);
                tracing::warn!(
                    "Retryable error (attempt {}/{}), retrying in {}s: {}",
                    attempt,
                    total_attempts,
                    delay.as_secs(),
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// [`retry_with_backoff`] with the classification supplied by the error type.
pub async fn retry_call<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    retry_with_backoff(
        config,
        |e: &E| {
            if e.is_retryable() {
                RetryAction::Retry
            } else {
                RetryAction::Abort
            }
        },
        operation,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn no_wait(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_default_config_makes_ten_attempts() {
        assert_eq!(RetryConfig::default().attempts(), 10);
    }

    #[test]
    fn test_with_attempts() {
        let config = RetryConfig::with_attempts(5, 1);
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.attempts(), 5);
        assert_eq!(RetryConfig::with_attempts(0, 1).attempts(), 1);
    }

    #[test]
    fn test_delay_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_secs: 2,
            max_delay_secs: 60,
        };
        let d = config.delay_for_retry(0);
        assert!(d.as_secs() >= 2 && d.as_secs() < 4);
        let d = config.delay_for_retry(2);
        assert!(d.as_secs() >= 8 && d.as_secs() < 10);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_secs: 5,
            max_delay_secs: 30,
        };
        let d = config.delay_for_retry(10);
        assert!(d.as_secs() >= 30 && d.as_secs() < 35);
    }

    #[test]
    fn test_delay_zero_base_is_deterministic() {
        assert_eq!(no_wait(3).delay_for_retry(0).as_secs(), 0);
        assert_eq!(no_wait(3).delay_for_retry(7).as_secs(), 0);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result: Result<i32, String> = retry_with_backoff(
            &no_wait(3),
            |_| RetryAction::Retry,
            || {
                let cc = cc.clone();
                async move {
                    if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(99)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result: Result<i32, String> = retry_with_backoff(
            &no_wait(2),
            |_| RetryAction::Retry,
            || {
                let cc = cc.clone();
                async move {
                    let n = cc.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {n}"))
                }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_call_aborts_on_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result: Result<(), Flaky> = retry_call(&no_wait(5), || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(false))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_call_repeats_transient() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result: Result<(), Flaky> = retry_call(&no_wait(4), || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(true))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
