//! Bounded retries with linear backoff
//!
//! Every network call of a run goes through [`RetryPolicy::execute`]. Only
//! transient [`SourceError::Fetch`] failures are retried; cancellation wins
//! over both the running attempt and the backoff sleep.

use crate::config::CrawlerConfig;
use crate::source::SourceError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Outcome of a retry loop that did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// The run was cancelled; propagate, do not record as a failure
    #[error("Cancelled")]
    Cancelled,

    /// Every attempt failed, or a non-transient error ended the loop early
    #[error("Gave up after {attempts} attempt(s): {source}")]
    Exhausted { attempts: u32, source: SourceError },
}

/// Retry configuration shared by all fetches of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub step_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, step_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            step_delay,
        }
    }

    /// Builds the policy from the `[crawler]` section
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_base(),
            config.backoff_step(),
        )
    }

    /// Delay slept after the failed attempt with zero-based index `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_add(self.step_delay.saturating_mul(attempt))
    }

    /// Runs `operation` until it succeeds, fails fatally or attempts run out
    ///
    /// # Arguments
    ///
    /// * `cancel` - Run-wide cancellation token
    /// * `label` - Resource description used in log lines
    /// * `operation` - Produces one attempt per call
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - An attempt succeeded
    /// * `Err(RetryError::Cancelled)` - The token fired before or during an attempt or sleep
    /// * `Err(RetryError::Exhausted)` - No attempt succeeded
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        label: &str,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            attempt += 1;

            if !error.is_transient() {
                tracing::warn!("{}: {}", label, error);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            if attempt >= self.max_attempts {
                tracing::warn!("{}: giving up after {} attempts: {}", label, attempt, error);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let delay = self.delay_after(attempt - 1);
            tracing::debug!(
                "{}: attempt {}/{} failed ({}), retrying in {:?}",
                label,
                attempt,
                self.max_attempts,
                error,
                delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
