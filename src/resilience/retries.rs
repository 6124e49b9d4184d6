//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failure is worth another attempt (`Retryable`)
//! - Execute attempts with exponential backoff between them
//! - Return the last failure unchanged once attempts are exhausted
//!
//! # Design Decisions
//! - No jitter: delays are deterministic so tests can assert them
//! - Non-retryable failures propagate on the first attempt
//! - Disabled retries still run the operation exactly once

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Classifies failures as transient or permanent.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// One scheduled retry: the attempt that just failed and the wait before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt_index: u32,
    pub delay: Duration,
}

/// Backoff parameters for a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    /// The retry scheduled after attempt `attempt_index` (0-based) fails.
    pub fn attempt(&self, attempt_index: u32) -> RetryAttempt {
        RetryAttempt {
            attempt_index,
            delay: calculate_backoff(
                attempt_index,
                self.base_delay.as_millis() as u64,
                self.max_delay.as_millis() as u64,
                self.multiplier,
            ),
        }
    }

    fn effective_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Runs fallible async operations under a `RetryPolicy`.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.effective_attempts();
        let mut attempt_index = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt_index + 1 >= max_attempts {
                if max_attempts > 1 {
                    tracing::error!(
                        operation = operation_name,
                        attempts = max_attempts,
                        error = %err,
                        "Retries exhausted"
                    );
                }
                return Err(err);
            }

            let retry = self.policy.attempt(attempt_index);
            tracing::warn!(
                operation = operation_name,
                attempt = retry.attempt_index + 1,
                max_attempts = max_attempts,
                delay_ms = retry.delay.as_millis() as u64,
                error = %err,
                "Retrying after transient failure"
            );
            metrics::record_retry(operation_name);

            tokio::time::sleep(retry.delay).await;
            attempt_index += 1;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
