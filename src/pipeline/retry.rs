//! Throttling-only retry with exponential backoff.

use crate::llm::BackendError;
use crate::retrieval::IndexError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of one pipeline step for one row.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("model call failed: {0}")]
    Backend(#[from] BackendError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("malformed model response: {message}")]
    MalformedResponse {
        message: String,
        raw_response: String,
    },

    #[error("gave up after {attempts} throttled attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<StepError> },
}

impl StepError {
    pub fn malformed(message: impl Into<String>, raw_response: impl Into<String>) -> Self {
        StepError::MalformedResponse {
            message: message.into(),
            raw_response: raw_response.into(),
        }
    }

    pub fn is_throttling(&self) -> bool {
        match self {
            StepError::Backend(e) => e.is_throttling(),
            StepError::Retrieval(e) => e.is_throttling(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub interval: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_rate: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            interval: Duration::from_secs(5),
            backoff_rate: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        self.interval.mul_f64(self.backoff_rate.powi(exponent))
    }

    /// Full delay schedule, one entry per permitted retry.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|r| self.delay_for(r)).collect()
    }

    /// Runs `op` until it succeeds, fails with a non-throttling error, or
    /// the retries are used up. Only the operation itself is repeated.
    pub async fn run<T, F, Fut>(&self, step: &str, mut op: F) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(step, attempt, "Step succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_throttling() => {
                    if attempt > self.max_retries {
                        warn!(step, attempts = attempt, "Throttling retries exhausted");
                        return Err(StepError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        step,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn throttled() -> StepError {
        StepError::Backend(BackendError::RateLimitError { retry_after: None })
    }

    #[test]
    fn default_schedule_doubles_from_five_seconds() {
        let secs: Vec<u64> = RetryPolicy::default()
            .schedule()
            .iter()
            .map(Duration::as_secs)
            .collect();
        assert_eq!(secs, vec![5, 10, 20, 40, 80]);
    }

    #[test]
    fn classifies_step_errors() {
        assert!(throttled().is_throttling());
        assert!(StepError::Retrieval(IndexError::Throttled {
            message: "429".to_string()
        })
        .is_throttling());
        assert!(!StepError::malformed("bad", "{").is_throttling());
    }

    #[tokio::test(start_paused = true)]
    async fn four_throttles_then_success_waits_75_seconds() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = RetryPolicy::default()
            .run("clean", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 4 {
                        Err(throttled())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(75));
        assert!(elapsed < Duration::from_secs(76));
    }

    #[tokio::test(start_paused = true)]
    async fn six_throttles_exhaust_retries() {
        let calls = AtomicU32::new(0);

        let err = RetryPolicy::default()
            .run("select", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(throttled()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        match err {
            StepError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 6);
                assert!(last.is_throttling());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_throttling_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let err = RetryPolicy::default()
            .run("candidates", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StepError::malformed("not json", "oops")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::MalformedResponse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
