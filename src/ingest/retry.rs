//! Bounded retry with exponential backoff
//!
//! Used by the fetch and embedding stages. The bound is small and fixed:
//! a failing document must never stall the rest of the batch.

use crate::errors::{EngineError, Result};
use std::time::Duration;
use tokio::time::sleep;

/// Base delay for exponential backoff
const BASE_DELAY_MS: u64 = 500;

/// Maximum delay cap
const MAX_DELAY_MS: u64 = 8000;

/// Retry policy with exponential backoff and jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    enable_jitter: bool,
}

impl RetryPolicy {
    /// Policy with the given attempt bound and default delays
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: BASE_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Execute `operation` until it succeeds or the attempt bound is hit.
    /// Non-retryable errors short-circuit immediately.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !Self::is_retryable(&e) {
                        return Err(e);
                    }

                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }

                    sleep(self.delay_for(attempt)).await;
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay_ms * 2u64.pow(attempt.min(16));
        let delay_ms = exponential.min(self.max_delay_ms);

        let final_delay = if self.enable_jitter {
            let jitter = (delay_ms / 4) as i64;
            let random_jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter as f64;
            ((delay_ms as i64) + random_jitter as i64).max(0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Transient failures are retried; malformed input never is
    fn is_retryable(error: &EngineError) -> bool {
        match error {
            EngineError::Timeout { .. } => true,
            EngineError::HttpError(_) => true,
            EngineError::FetchFailure { .. } => true,
            EngineError::EmbeddingFailure(_) => true,
            EngineError::RetrievalUnavailable(_) => true,
            EngineError::Generic(_) => true,

            EngineError::Validation(_) => false,
            EngineError::NotFound { .. } => false,
            EngineError::ExtractionFailure { .. } => false,
            EngineError::GroundingViolation(_) => false,
            EngineError::SerializationError(_) => false,
            EngineError::ConfigError(_) => false,
            EngineError::IoError(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 4,
            enable_jitter: false,
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = fast_policy(3)
            .run(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, EngineError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = fast_policy(5)
            .run(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(EngineError::Generic("transient".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_attempt_bound_respected() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = fast_policy(3)
            .run(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(EngineError::Generic("always fails".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = fast_policy(5)
            .run(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(EngineError::Validation("bad row".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            enable_jitter: false,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(8000));
    }
}
