//! Bounded caller-side retry for transactional commands
//!
//! The engine commands never retry on their own. Routes wrap the mutating
//! commands in [`retry_transactional`], which re-invokes the command only when
//! its error reports itself as a transient persistence failure.

use std::{fmt::Display, future::Future, time::Duration};

use crate::config::{VersioningConfig, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_RETRY_MAX_ATTEMPTS};

/// Attempt budget and linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff_base * n`
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &VersioningConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            backoff_base: config.retry_backoff(),
        }
    }

    /// Delay slept after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

/// Errors that know whether a fresh attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `f` until it succeeds, fails permanently, or the budget is spent
#[tracing::instrument(skip(policy, f))]
pub async fn retry_transactional<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transactional operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            result => return result,
        }
    }
}
