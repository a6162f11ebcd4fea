//! Bounded retry for transient storage failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::QueueError;

/// Exponential backoff policy for busy/locked storage errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Run `op`, retrying while it fails with a retryable error.
    ///
    /// Non-retryable errors are returned immediately. Once retries are
    /// exhausted the last error is returned unchanged, so callers still see
    /// it as retryable.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, QueueError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueueError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} hit transient storage error (attempt {}/{}), retrying in {:?}: {}",
                        op_name, attempt, self.max_retries, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn busy() -> QueueError {
        QueueError::Storage {
            message: "database is locked".to_string(),
            retryable: true,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(30), Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result = policy
            .run("test-op", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(busy())
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            max_retries: 2,
            ..Default::default()
        };

        let result: Result<(), _> = policy
            .run("test-op", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(busy())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_immediate() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .run("test-op", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(QueueError::conflict("lost race"))
            })
            .await;

        assert!(matches!(result, Err(QueueError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
