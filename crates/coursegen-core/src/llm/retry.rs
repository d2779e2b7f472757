//! Exponential backoff with jitter for generation-service calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::ServiceError;

/// How many times to attempt a call and how long to wait between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles each retry).
    pub initial_backoff: Duration,
    /// Upper bound on a single delay, before jitter.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based), jitter excluded.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, returns a non-retryable error, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= attempts => {
                    if attempts == 1 {
                        return Err(e);
                    }
                    return Err(ServiceError::RetryExhausted {
                        attempts,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = with_jitter(self.backoff(attempt));
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "generation call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Add up to 25% random jitter.
fn with_jitter(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let extra = rand::rng().random_range(0.0..=0.25);
    base.mul_f64(1.0 + extra)
}
