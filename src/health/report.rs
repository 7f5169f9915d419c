// src/health/report.rs
use crate::config::Config;
use crate::health::poller::PollSnapshot;
use crate::health::{format_uptime, HealthStatus, ServiceHealth, ServiceStatus};
use std::time::Instant;

/// Builds the health document served by `/api/health`: the process's own
/// checks plus the latest remote-source reports, aggregated worst-of.
pub struct HealthReporter {
    started: Instant,
    app_name: String,
    version: String,
    required_env: Vec<String>,
}

impl HealthReporter {
    pub fn new(config: &Config) -> Self {
        Self {
            started: Instant::now(),
            app_name: config.app.name.clone(),
            version: config
                .app
                .version
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            required_env: config.server.required_env.clone(),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn build(&self, snapshot: &PollSnapshot) -> HealthStatus {
        let build_start = Instant::now();
        let uptime_ms = self.uptime_ms();
        let mut services = Vec::new();

        services.push(
            ServiceHealth::healthy("HTTP Server")
                .with_response_time(build_start.elapsed().as_millis() as u64)
                .with_message(format!(
                    "{} {}, up {}",
                    self.app_name,
                    self.version,
                    format_uptime(uptime_ms)
                )),
        );

        services.push(self.environment_check());

        for report in &snapshot.sources {
            let mut entry = ServiceHealth {
                name: report.name.clone(),
                status: report.health.status,
                response_time_ms: Some(report.response_time_ms),
                message: report.error.clone(),
            };
            if entry.message.is_none() {
                entry.message = Some(format!("status: {}", report.health.status));
            }
            services.push(entry);
        }

        HealthStatus::from_services(uptime_ms, Some(self.version.clone()), services)
    }

    /// Missing required variables degrade the service rather than failing
    /// it; the process is still up and serving.
    fn environment_check(&self) -> ServiceHealth {
        let missing: Vec<&str> = self
            .required_env
            .iter()
            .filter(|var| std::env::var(var.as_str()).is_err())
            .map(|var| var.as_str())
            .collect();

        if missing.is_empty() {
            ServiceHealth::healthy("Environment Configuration")
                .with_response_time(0)
                .with_message(format!("{} required variables set", self.required_env.len()))
        } else {
            ServiceHealth {
                name: "Environment Configuration".to_string(),
                status: ServiceStatus::Degraded,
                response_time_ms: Some(0),
                message: Some(format!("Missing: {}", missing.join(", "))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, AppConfig, HealthConfig, ServerConfig};
    use crate::health::poller::{PollSnapshot, PollState};
    use crate::health::probe::SourceReport;

    fn test_config(required_env: Vec<String>) -> Config {
        Config {
            server: ServerConfig {
                required_env,
                ..ServerConfig::default()
            },
            api: ApiConfig {
                base_url: "http://localhost:3001/api".parse().unwrap(),
                timeout_ms: 10_000,
                retries: 0,
                retry_delay_ms: 1_000,
                retry_max_delay_ms: 30_000,
            },
            health: HealthConfig::default(),
            app: AppConfig::default(),
        }
    }

    fn empty_snapshot() -> PollSnapshot {
        PollSnapshot {
            state: PollState::Succeeded,
            sources: Vec::new(),
            last_updated: None,
            error: None,
        }
    }

    #[test]
    fn report_without_sources_is_healthy() {
        let reporter = HealthReporter::new(&test_config(vec![]));
        let health = reporter.build(&empty_snapshot());
        assert_eq!(health.status, ServiceStatus::Healthy);
        assert_eq!(health.services.len(), 2);
        assert!(health.version.is_some());
    }

    #[test]
    fn missing_required_env_degrades() {
        let reporter = HealthReporter::new(&test_config(vec![
            "QUANTX_TEST_SURELY_UNSET_VARIABLE".to_string(),
        ]));
        let health = reporter.build(&empty_snapshot());
        assert_eq!(health.status, ServiceStatus::Degraded);

        let env = health
            .services
            .iter()
            .find(|s| s.name == "Environment Configuration")
            .unwrap();
        assert_eq!(env.status, ServiceStatus::Degraded);
        assert!(env
            .message
            .as_deref()
            .unwrap()
            .contains("QUANTX_TEST_SURELY_UNSET_VARIABLE"));
    }

    #[test]
    fn failed_source_makes_report_unhealthy() {
        let reporter = HealthReporter::new(&test_config(vec![]));
        let snapshot = PollSnapshot {
            state: PollState::PartiallySucceeded,
            sources: vec![SourceReport {
                name: "backend".to_string(),
                health: HealthStatus::unhealthy("backend", "connection refused"),
                response_time_ms: 12,
                error: Some("connection refused".to_string()),
            }],
            last_updated: None,
            error: None,
        };

        let health = reporter.build(&snapshot);
        assert_eq!(health.status, ServiceStatus::Unhealthy);

        let backend = health.services.iter().find(|s| s.name == "backend").unwrap();
        assert_eq!(backend.status, ServiceStatus::Unhealthy);
        assert_eq!(backend.response_time_ms, Some(12));
        assert_eq!(backend.message.as_deref(), Some("connection refused"));
    }
}
