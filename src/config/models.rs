// src/config/models.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    /// Environment variables the environment-configuration health check
    /// requires; missing ones degrade the served status.
    #[serde(default)]
    pub required_env: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Url,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Endpoint path probed against the API base URL, e.g. "/health".
    #[serde(default = "default_health_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_health_endpoint() -> String {
    "/health".to_string()
}

fn default_app_name() -> String {
    "QuantX Platform".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_path: default_metrics_path(),
            required_env: Vec::new(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_interval_ms(),
            sources: Vec::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Environment overrides for the settings operators most often tune.
    /// Unset variables leave the file values alone.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("QUANTX_API_URL") {
            self.api.base_url = value
                .parse()
                .with_context(|| format!("Invalid QUANTX_API_URL: {}", value))?;
        }
        if let Ok(value) = std::env::var("QUANTX_API_TIMEOUT_MS") {
            self.api.timeout_ms = value
                .parse()
                .with_context(|| format!("Invalid QUANTX_API_TIMEOUT_MS: {}", value))?;
        }
        if let Ok(value) = std::env::var("QUANTX_API_RETRIES") {
            self.api.retries = value
                .parse()
                .with_context(|| format!("Invalid QUANTX_API_RETRIES: {}", value))?;
        }
        if let Ok(value) = std::env::var("QUANTX_API_RETRY_DELAY_MS") {
            self.api.retry_delay_ms = value
                .parse()
                .with_context(|| format!("Invalid QUANTX_API_RETRY_DELAY_MS: {}", value))?;
        }
        if let Ok(value) = std::env::var("QUANTX_HEALTH_INTERVAL_MS") {
            self.health.interval_ms = value
                .parse()
                .with_context(|| format!("Invalid QUANTX_HEALTH_INTERVAL_MS: {}", value))?;
        }
        Ok(())
    }

    /// Validate everything up front and report every problem at once
    /// instead of failing on the first one.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.api.timeout_ms < 1_000 {
            errors.push(format!(
                "api.timeout_ms must be at least 1000 (got {})",
                self.api.timeout_ms
            ));
        }
        if self.health.interval_ms < 1_000 {
            errors.push(format!(
                "health.interval_ms must be at least 1000 (got {})",
                self.health.interval_ms
            ));
        }
        if self.api.retry_max_delay_ms < self.api.retry_delay_ms {
            errors.push(format!(
                "api.retry_max_delay_ms ({}) must not be less than api.retry_delay_ms ({})",
                self.api.retry_max_delay_ms, self.api.retry_delay_ms
            ));
        }
        if self.api.base_url.host_str().is_none() {
            errors.push(format!("api.base_url has no host: {}", self.api.base_url));
        }
        if self.server.port == 0 {
            errors.push("server.port must be non-zero".to_string());
        }

        let mut seen = HashSet::new();
        for source in &self.health.sources {
            if source.name.trim().is_empty() {
                errors.push("health.sources entries must have a non-empty name".to_string());
            } else if !seen.insert(source.name.as_str()) {
                errors.push(format!("duplicate health source name: {}", source.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Invalid configuration:\n  - {}", errors.join("\n  - ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig::default(),
            api: ApiConfig {
                base_url: "http://localhost:3001/api".parse().unwrap(),
                timeout_ms: default_timeout_ms(),
                retries: default_retries(),
                retry_delay_ms: default_retry_delay_ms(),
                retry_max_delay_ms: default_retry_max_delay_ms(),
            },
            health: HealthConfig::default(),
            app: AppConfig::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validation_collects_all_errors() {
        let mut config = base_config();
        config.api.timeout_ms = 10;
        config.health.interval_ms = 10;
        config.server.port = 0;
        config.health.sources = vec![
            SourceConfig {
                name: "backend".to_string(),
                endpoint: "/health".to_string(),
            },
            SourceConfig {
                name: "backend".to_string(),
                endpoint: "/health".to_string(),
            },
        ];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api.timeout_ms"));
        assert!(err.contains("health.interval_ms"));
        assert!(err.contains("server.port"));
        assert!(err.contains("duplicate health source name: backend"));
    }

    #[test]
    fn parses_minimal_yaml() {
        let yaml = "api:\n  base_url: http://localhost:3001/api\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.health.interval_ms, 30_000);
        assert_eq!(config.api.retries, 3);
        assert_eq!(config.api.retry_delay_ms, 1_000);
        assert!(config.health.enabled);
    }
}
