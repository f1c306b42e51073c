// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry logic for completion calls with exponential backoff

use crate::config::settings::RetryConfig;
use crate::error::ApiError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy with smart defaults
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Base delay in milliseconds (exponentially increased)
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Jitter percentage (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the initial one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        // Exponential backoff: base * 2^attempt
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let exponential_ms = self.base_delay_ms.saturating_mul(factor);
        let capped_ms = exponential_ms.min(self.max_delay_ms);

        if self.jitter <= 0.0 {
            return Duration::from_millis(capped_ms);
        }

        let jitter_range = (capped_ms as f64 * self.jitter) as i64;
        let mut rng = rand::rng();
        let jitter_ms = rng.random_range(-jitter_range..=jitter_range);

        let final_ms = (capped_ms as i64 + jitter_ms).max(0) as u64;
        Duration::from_millis(final_ms)
    }

    /// Backoff delay, stretched to the server's `Retry-After` hint when it
    /// is longer. The hint is still bounded by `max_delay_ms`.
    pub fn delay_after(&self, attempt: u32, error: &ApiError) -> Duration {
        let backoff = self.delay(attempt);
        match error {
            ApiError::RateLimited(Some(seconds)) => {
                let hint_ms = seconds.saturating_mul(1000).min(self.max_delay_ms);
                backoff.max(Duration::from_millis(hint_ms))
            }
            _ => backoff,
        }
    }
}

/// Successful outcome plus the number of attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Terminal failure: the last error and the number of attempts made
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted {
    pub error: ApiError,
    pub attempts: u32,
}

/// Retry an operation with exponential backoff
///
/// The operation receives the 0-based attempt number. Non-retryable
/// errors (see [`crate::error::ErrorKind::is_retryable`]) end the loop
/// immediately; otherwise up to `policy.max_retries` retries are made,
/// strictly one after another.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
    operation_name: &str,
) -> Result<Attempted<T>, Exhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "succeeded after retry"
                    );
                }
                return Ok(Attempted {
                    value,
                    attempts: attempt + 1,
                });
            }
            Err(error) => {
                if !error.kind().is_retryable() {
                    tracing::warn!(
                        operation = operation_name,
                        kind = %error.kind(),
                        "non-retryable failure: {}",
                        error
                    );
                    return Err(Exhausted {
                        error,
                        attempts: attempt + 1,
                    });
                }

                if attempt >= policy.max_retries {
                    tracing::warn!(
                        operation = operation_name,
                        retries = policy.max_retries,
                        "exhausted all retries: {}",
                        error
                    );
                    return Err(Exhausted {
                        error,
                        attempts: attempt + 1,
                    });
                }

                let delay = policy.delay_after(attempt, &error);
                tracing::debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed: {}; retrying",
                    error
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
