/*!
 * Generic retry wrapper for adapter calls.
 *
 * Every call into an external generation service goes through [`RetryPolicy`]:
 * exponential backoff bounded at a fixed attempt budget, rate-limit waits
 * taken from the service's suggestion when it sends one, and a per-call
 * timeout independent of the retry count. The policy is adapter-agnostic:
 * it receives an operation and reads only the error classification.
 */

use std::future::Future;
use std::time::Duration;
use log::{error, warn};

use crate::app_config::RetryConfig;
use crate::errors::{AdapterError, AdapterFamily};

/// Result of running an operation under a retry policy
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result after the last attempt
    pub result: Result<T, AdapterError>,
    /// Number of attempts actually made (1-based)
    pub attempts: u32,
}

/// Backoff/rate-limit wrapper around a single fallible adapter operation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    max_attempts: u32,

    /// Base backoff in milliseconds, doubled on each retry
    backoff_base_ms: u64,

    /// Upper bound for a single backoff wait
    backoff_max_ms: u64,

    /// Fixed per-call timeout; expiry is a retryable error
    call_timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy with explicit settings
    pub fn new(
        max_attempts: u32,
        backoff_base_ms: u64,
        backoff_max_ms: u64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base_ms,
            backoff_max_ms,
            call_timeout,
        }
    }

    /// Create a policy from the run configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base_ms,
            config.backoff_max_ms,
            Duration::from_secs(config.call_timeout_secs),
        )
    }

    /// Same policy with a different per-call timeout.
    ///
    /// Long-poll operations like track composition need a budget covering
    /// their whole polling phase, not the one-shot call default.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run an operation to completion under this policy.
    pub async fn run<T, Op, Fut>(
        &self,
        family: AdapterFamily,
        label: &str,
        op: Op,
    ) -> RetryOutcome<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        self.run_observed(family, label, op, |_, _| {}).await
    }

    /// Run an operation under this policy, notifying `on_retry` with the
    /// attempt number and error before each wait-and-retry.
    ///
    /// Non-retryable errors return after exactly one attempt without
    /// consuming the remaining budget.
    pub async fn run_observed<T, Op, Fut, Obs>(
        &self,
        family: AdapterFamily,
        label: &str,
        mut op: Op,
        mut on_retry: Obs,
    ) -> RetryOutcome<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
        Obs: FnMut(u32, &AdapterError),
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let attempt_result = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Timeout { family, after: self.call_timeout }),
            };

            let err = match attempt_result {
                Ok(value) => return RetryOutcome { result: Ok(value), attempts },
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!("Non-retryable failure for {}: {}", label, err);
                return RetryOutcome { result: Err(err), attempts };
            }

            if attempts >= self.max_attempts {
                error!("All {} attempts failed for {}: {}", self.max_attempts, label, err);
                return RetryOutcome { result: Err(err), attempts };
            }

            // Rate-limit waits come from the service when it told us how long
            let delay = err.retry_after().unwrap_or_else(|| self.backoff_delay(attempts));
            warn!(
                "Attempt {}/{} failed for {}: {}. Retrying in {:?}",
                attempts, self.max_attempts, label, err, delay
            );
            on_retry(attempts, &err);
            tokio::time::sleep(delay).await;
        }
    }

    // @returns: Exponential backoff for the given 1-based attempt, capped
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}
