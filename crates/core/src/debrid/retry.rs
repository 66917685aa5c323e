//! Retry wrapper for gated requests.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::config::RetryConfig;

use super::RequestError;

impl RetryConfig {
    /// Create an ExponentialBackoff from this config.
    pub fn to_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_interval: Duration::from_secs_f64(self.max_delay_secs.max(0.0)),
            multiplier: 2.0,
            randomization_factor: 0.25,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached. Only transient and rate-limit errors are retried.
pub async fn retry_request<T, Fut, F>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, RequestError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;
    let mut backoff = config.to_backoff();

    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempts >= max_attempts {
                    warn!(
                        operation = %operation_name,
                        attempts = attempts,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let Some(duration) = backoff.next_backoff() else {
                    return Err(e);
                };
                warn!(
                    operation = %operation_name,
                    attempt = attempts,
                    error = %e,
                    retry_in_ms = duration.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_request(
            move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(RequestError::Transient("timeout".to_string()))
                } else {
                    Ok(n)
                }
            },
            &RetryConfig::default(),
            "test",
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = retry_request(
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RequestError::RateLimited)
            },
            &RetryConfig::default(),
            "test",
        )
        .await;

        assert_eq!(result, Err(RequestError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = retry_request(
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RequestError::Auth { status: 401 })
            },
            &RetryConfig::default(),
            "test",
        )
        .await;

        assert_eq!(result, Err(RequestError::Auth { status: 401 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_starts_at_base_delay_and_caps() {
        let config = RetryConfig::default();
        let mut backoff = config.to_backoff();
        let first = backoff.next_backoff().unwrap().as_secs_f64();
        assert!((3.0..=5.0).contains(&first));
        for _ in 0..5 {
            let next = backoff.next_backoff().unwrap().as_secs_f64();
            assert!(next <= 10.0 * 1.25 + 1e-9);
        }
    }
}
