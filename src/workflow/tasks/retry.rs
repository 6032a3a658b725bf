use log::warn;
use std::time::Duration;

use crate::config::AppConfig;
use crate::workflow::tasks::transform::TransformError;

/// Per-invocation timeout plus bounded exponential backoff for transform branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.max_transform_attempts,
            backoff: config.retry_backoff(),
            timeout: config.transform_timeout(),
        }
    }

    /// Delay before attempt `attempt + 1`; doubles each time.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, TransformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransformError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransformError::Timeout(self.timeout)),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label, attempt, max_attempts, delay, err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
