//! Retry with exponential backoff for transient provider failures.

use std::time::Duration;

use tokio::time::sleep;

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay
    pub max_delay: Duration,
    /// Multiplier applied per retry
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Compute the delay before retry number `attempt` (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }
}

/// Whether an error is worth retrying.
///
/// Rate limits and network failures are the steady-state transient errors
/// of public academic APIs; parse errors and missing papers are permanent.
pub fn is_transient(err: &SourceError) -> bool {
    matches!(err, SourceError::Network(_) | SourceError::RateLimit)
}

/// Execute an async operation, retrying transient failures with
/// exponential backoff. Permanent errors are returned immediately.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(err) if is_transient(&err) && attempt < config.max_attempts => {
                let delay = config.delay_for(attempt);
                tracing::debug!(attempt, ?delay, error = %err, "Transient error, retrying");
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Retry settings used by the HTTP-backed source adapters
pub fn api_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(10),
        backoff_multiplier: 2.0,
    }
}
