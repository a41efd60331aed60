//! Exponential backoff with jitter
//!
//! Wraps any fallible async operation. Errors decide for themselves whether
//! another attempt could help by implementing [`Retryable`].

use crate::config::RetryConfig;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as worth retrying or not
pub trait Retryable {
    /// False for failures another attempt cannot fix (HTTP 4xx and the like)
    fn is_retryable(&self) -> bool;
}

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (0 is treated as 1)
    pub max_attempts: u32,

    /// Delay after the first failed attempt; doubled after each further failure
    pub base_delay: Duration,

    /// Upper bound (exclusive) of the random delay added to every wait
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the default one second of jitter
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter: Duration::from_millis(1000),
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Wait after failed attempt `attempt` (0-indexed): `base * 2^attempt + jitter`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        backoff.saturating_add(self.random_jitter())
    }

    fn random_jitter(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts
///
/// # Behavior
///
/// | Outcome of attempt | Action |
/// |--------------------|--------|
/// | `Ok` | Return immediately |
/// | `Err`, not retryable | Return the error immediately |
/// | `Err`, retryable, attempts left | Sleep `delay_for(attempt)`, try again |
/// | `Err`, retryable, last attempt | Return that error unchanged |
///
/// No delay is slept after the final attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::debug!("Not retrying: {}", error);
            return Err(error);
        }

        attempt += 1;
        if attempt >= max_attempts {
            tracing::debug!("Giving up after {} attempts: {}", attempt, error);
            return Err(error);
        }

        let delay = policy.delay_for(attempt - 1);
        tracing::debug!(
            "Attempt {}/{} failed ({}), retrying in {:?}",
            attempt,
            max_attempts,
            error,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
