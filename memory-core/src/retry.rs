//! Exponential backoff retry helper used by the remote embedding provider
//! and by backends around individual transient-error driver calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Implemented by error types that can tell the retry loop whether they are
/// worth retrying.
pub trait Retryable {
    fn is_recoverable(&self) -> bool;
}

impl Retryable for crate::error::Error {
    fn is_recoverable(&self) -> bool {
        self.is_recoverable()
    }
}

/// Backoff shape: exponential with a cap, plus jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        let capped = std::cmp::min(exp, self.max_delay);

        if self.jitter_factor <= 0.0 {
            return capped;
        }
        let jitter_range = capped.as_millis() as f64 * self.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        let adjusted = (capped.as_millis() as f64 + jitter).max(0.0);
        Duration::from_millis(adjusted as u64)
    }
}

/// Run `operation` up to `config.max_retries + 1` times, backing off between
/// attempts. Only retries errors for which [`Retryable::is_recoverable`]
/// returns `true`; the first non-recoverable error (or the final attempt's
/// error) is returned immediately.
pub async fn retry<F, T, E, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_recoverable() || attempt >= config.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                warn!(attempt, max_retries = config.max_retries, ?delay, ?err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Flaky(bool);
    impl Retryable for Flaky {
        fn is_recoverable(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter_factor: 0.0,
        };
        let result: Result<u32, Flaky> = retry(&config, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(Flaky(true))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn non_recoverable_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default();
        let result: Result<u32, Flaky> = retry(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Flaky(false))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
