// src/health/status.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity-ordered service status. `Ord` ranks `Healthy < Degraded <
/// Unhealthy`, which is what worst-of aggregation relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Healthy => write!(f, "healthy"),
            ServiceStatus::Degraded => write!(f, "degraded"),
            ServiceStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// One health check result for one named dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ServiceStatus::Healthy,
            response_time_ms: None,
            message: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ServiceStatus::Unhealthy,
            response_time_ms: None,
            message: Some(message.into()),
        }
    }

    pub fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Aggregated health document. The overall `status` is always derived from
/// `services` via [`aggregate`]; use [`HealthStatus::from_services`] so an
/// inconsistent value cannot be constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub services: Vec<ServiceHealth>,
}

impl HealthStatus {
    /// Build a document whose overall status is derived from its services.
    pub fn from_services(uptime_ms: u64, version: Option<String>, services: Vec<ServiceHealth>) -> Self {
        Self {
            status: aggregate(&services),
            timestamp: Utc::now(),
            uptime_ms,
            version,
            services,
        }
    }

    /// Terminal document for a probe or endpoint that failed outright.
    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_services(0, None, vec![ServiceHealth::unhealthy(name, message)])
    }
}

/// Worst-of aggregation: `unhealthy > degraded > healthy`, independent of
/// ordering. An empty sequence is `Healthy` -- absence of negative evidence
/// is not itself negative evidence.
pub fn aggregate(services: &[ServiceHealth]) -> ServiceStatus {
    services
        .iter()
        .map(|s| s.status)
        .max()
        .unwrap_or(ServiceStatus::Healthy)
}

/// Uniform response envelope shared with probed backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn fail_with_data(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Some(data),
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Human-readable uptime: largest two or three units, smallest dropped as
/// the duration grows (e.g. 90061000 ms -> "1d 1h 1m").
pub fn format_uptime(uptime_ms: u64) -> String {
    let seconds = uptime_ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h {}m", days, hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
