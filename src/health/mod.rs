// src/health/mod.rs
mod poller;
mod probe;
mod report;
mod status;

pub use poller::{HealthPoller, PollSnapshot, PollState};
pub use probe::{probe, HealthSource, RemoteHealthSource, SourceReport};
pub use report::HealthReporter;
pub use status::{aggregate, format_uptime, ApiResponse, HealthStatus, ServiceHealth, ServiceStatus};
