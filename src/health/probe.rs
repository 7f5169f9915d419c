// src/health/probe.rs
use crate::client::{ApiClient, ApiError, RequestOptions, RetryStrategy};
use crate::health::HealthStatus;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One named health source the poller queries each cycle.
#[async_trait]
pub trait HealthSource: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> Result<HealthStatus, ApiError>;
}

/// Remote source probed through the shared API client. Transient failures
/// are retried per the configured strategy before the source is declared
/// unhealthy.
pub struct RemoteHealthSource {
    name: String,
    endpoint: String,
    client: Arc<ApiClient>,
    retry: RetryStrategy,
}

impl RemoteHealthSource {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        client: Arc<ApiClient>,
        retry: RetryStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
            retry,
        }
    }
}

#[async_trait]
impl HealthSource for RemoteHealthSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<HealthStatus, ApiError> {
        let response = self
            .retry
            .execute_with_decision(
                || {
                    self.client
                        .get::<HealthStatus>(&self.endpoint, RequestOptions::default())
                },
                RetryStrategy::is_retryable_error,
            )
            .await?;

        match response.data {
            Some(health) if response.success => Ok(health),
            _ => Err(ApiError::Parse(
                response
                    .message
                    .or(response.error)
                    .unwrap_or_else(|| "Health check failed".to_string()),
            )),
        }
    }
}

/// Outcome of probing one source in one poll cycle.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub health: HealthStatus,
    pub response_time_ms: u64,
    /// Present when the probe itself failed; `health` then carries a
    /// synthesized unhealthy document.
    pub error: Option<String>,
}

impl SourceReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Probe one source, timing the check call only. Errors never escape: a
/// failed probe becomes an unhealthy report for that source alone.
pub async fn probe(source: &dyn HealthSource) -> SourceReport {
    let start = Instant::now();
    let result = source.check().await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(health) => {
            debug!(source = source.name(), status = %health.status, response_time_ms, "probe ok");
            SourceReport {
                name: source.name().to_string(),
                health,
                response_time_ms,
                error: None,
            }
        }
        Err(e) => {
            let message = e.to_string();
            debug!(source = source.name(), error = %message, response_time_ms, "probe failed");
            let mut health = HealthStatus::unhealthy(source.name(), message.clone());
            health.services[0].response_time_ms = Some(response_time_ms);
            SourceReport {
                name: source.name().to_string(),
                health,
                response_time_ms,
                error: Some(message),
            }
        }
    }
}
