//! Bounded retry with exponential backoff
//!
//! Only transient failures are retried. Every attempt, retries included,
//! passes through the provider's rate limiter.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{ProviderConfig, ProviderError, RateLimiter};

/// Retry policy for one provider
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based): 1s, 2s, 4s, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Total attempts this policy allows, the first included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out
    ///
    /// Each attempt is bounded by `timeout`; an elapsed attempt counts as
    /// transient.
    pub async fn run<T, F, Fut>(
        &self,
        provider: &str,
        limiter: &RateLimiter,
        timeout: Duration,
        mut op: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;
        loop {
            limiter.acquire().await;

            let result = match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Transient(format!(
                    "{}: timed out after {:?}",
                    provider, timeout
                ))),
            };

            match result {
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        "{} attempt {}/{} failed ({}), retrying in {:?}",
                        provider,
                        retry,
                        self.max_attempts(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!("{} giving up after {} attempt(s): {}", provider, retry + 1, e);
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}
