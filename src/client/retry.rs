// src/client/retry.rs
use crate::client::ApiError;
use crate::config::ApiConfig;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for callers of the API client. The client itself never
/// retries; the probe layer wraps its calls in this.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

#[derive(Debug)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryStrategy {
    pub fn from_api_config(config: &ApiConfig) -> Self {
        Self {
            // retries counts attempts after the first one
            max_attempts: config.retries + 1,
            backoff_base: config.retry_delay(),
            backoff_max: config.retry_max_delay(),
        }
    }

    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_max,
        }
    }

    /// Run `f` until it succeeds or attempts are exhausted.
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_with_decision(&mut f, |_| RetryDecision::Retry)
            .await
    }

    /// Run `f` with a caller-supplied test for which errors are worth
    /// retrying.
    pub async fn execute_with_decision<F, Fut, T, E>(
        &self,
        mut f: F,
        should_retry: impl Fn(&E) -> RetryDecision,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if let RetryDecision::NoRetry = should_retry(&error) {
                        debug!("Error is non-retryable: {}", error);
                        return Err(error);
                    }
                    if attempt >= self.max_attempts {
                        warn!("Giving up after {} attempts: {}", attempt, error);
                        return Err(error);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    debug!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempt, error, backoff
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    /// Exponential backoff with 0-25% jitter: base * 2^(attempt - 1),
    /// capped at the configured maximum.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff_base.as_millis() as u64;
        let max = self.backoff_max.as_millis() as u64;

        let exponential = base.saturating_mul(2u64.saturating_pow(attempt - 1));
        let capped = exponential.min(max);
        let jitter = (capped as f64 * rand::random::<f64>() * 0.25) as u64;

        Duration::from_millis(capped + jitter)
    }

    /// Timeouts and transport errors are transient; HTTP statuses follow
    /// the usual 408/429/5xx rule.
    pub fn is_retryable_error(error: &ApiError) -> RetryDecision {
        match error {
            ApiError::Timeout(_) | ApiError::Transport(_) => RetryDecision::Retry,
            ApiError::Parse(_) => RetryDecision::NoRetry,
            ApiError::Status { status, .. } => match StatusCode::from_u16(*status) {
                Ok(status) => Self::is_retryable_status(status),
                Err(_) => RetryDecision::NoRetry,
            },
        }
    }

    pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
        match status {
            StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => RetryDecision::Retry,
            s if s.is_client_error() => RetryDecision::NoRetry,
            s if s.is_server_error() => RetryDecision::Retry,
            _ => RetryDecision::NoRetry,
        }
    }
}
