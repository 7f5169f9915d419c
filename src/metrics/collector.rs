// src/metrics/collector.rs
use crate::health::ServiceStatus;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Prometheus text exposition of everything registered.
    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        // Encoding into a Vec cannot fail.
        let _ = encoder.encode(&metric_families, &mut buffer);
        buffer
    }
}

pub struct MetricsCollector {
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub source_health_status: IntGaugeVec,
    pub poll_cycles_total: IntCounter,
    pub healthy_sources: IntGauge,
    pub total_sources: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let probes_total = IntCounterVec::new(
            Opts::new("health_probes_total", "Total health probes issued"),
            &["source", "outcome"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "health_probe_duration_seconds",
                "Health probe duration in seconds",
            ),
            &["source"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let source_health_status = IntGaugeVec::new(
            Opts::new(
                "health_source_status",
                "Source health (2=healthy, 1=degraded, 0=unhealthy)",
            ),
            &["source"],
        )?;
        registry.register(Box::new(source_health_status.clone()))?;

        let poll_cycles_total =
            IntCounter::new("health_poll_cycles_total", "Completed poll cycles")?;
        registry.register(Box::new(poll_cycles_total.clone()))?;

        let healthy_sources =
            IntGauge::new("health_healthy_sources", "Sources whose last probe succeeded")?;
        registry.register(Box::new(healthy_sources.clone()))?;

        let total_sources = IntGauge::new("health_total_sources", "Configured health sources")?;
        registry.register(Box::new(total_sources.clone()))?;

        Ok(Self {
            probes_total,
            probe_duration_seconds,
            source_health_status,
            poll_cycles_total,
            healthy_sources,
            total_sources,
        })
    }

    pub fn record_probe(&self, source: &str, success: bool, duration: std::time::Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.probes_total
            .with_label_values(&[source, outcome])
            .inc();
        self.probe_duration_seconds
            .with_label_values(&[source])
            .observe(duration.as_secs_f64());
    }

    pub fn update_source_health(&self, source: &str, status: ServiceStatus) {
        let value = match status {
            ServiceStatus::Healthy => 2,
            ServiceStatus::Degraded => 1,
            ServiceStatus::Unhealthy => 0,
        };
        self.source_health_status
            .with_label_values(&[source])
            .set(value);
    }

    pub fn record_poll_cycle(&self, healthy: usize, total: usize) {
        self.poll_cycles_total.inc();
        self.healthy_sources.set(healthy as i64);
        self.total_sources.set(total as i64);
    }
}
