// src/health/poller.rs
use crate::health::probe::{probe, HealthSource, SourceReport};
use crate::metrics::MetricsCollector;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Refresh lifecycle: `Idle -> Loading -> {Succeeded, PartiallySucceeded,
/// Failed}`, and any terminal state re-enters `Loading` on the next tick or
/// manual trigger. Between cycles the snapshot keeps its terminal state;
/// that standing terminal state is the "idle, ready for the next refresh"
/// position, so `Idle` itself only appears before the first cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Loading,
    Succeeded,
    PartiallySucceeded,
    Failed,
}

/// Latest aggregated picture across all configured sources. Readers get it
/// lock-free through the poller's `ArcSwap`.
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub state: PollState,
    pub sources: Vec<SourceReport>,
    pub last_updated: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl PollSnapshot {
    fn idle() -> Self {
        Self {
            state: PollState::Idle,
            sources: Vec::new(),
            last_updated: None,
            error: None,
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.name == name)
    }
}

/// Periodically probes every configured source and keeps the most recent
/// snapshot. Probes run concurrently and settle individually; one failing
/// source never cancels its siblings.
pub struct HealthPoller {
    sources: Vec<Arc<dyn HealthSource>>,
    interval: Duration,
    snapshot: ArcSwap<PollSnapshot>,
    refresh: Notify,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HealthPoller {
    pub fn new(
        sources: Vec<Arc<dyn HealthSource>>,
        interval: Duration,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            sources,
            interval,
            snapshot: ArcSwap::from_pointee(PollSnapshot::idle()),
            refresh: Notify::new(),
            shutdown_tx,
            shutdown_rx,
            metrics,
        }
    }

    pub fn snapshot(&self) -> Arc<PollSnapshot> {
        self.snapshot.load_full()
    }

    /// Wake the run loop for an immediate refresh. Safe to call while a
    /// cycle is already in flight; results overwrite the snapshot in
    /// completion order.
    pub fn trigger_refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Drive the interval timer and manual-refresh wakeups until shutdown.
    /// The first tick fires immediately, so a fresh poller populates its
    /// snapshot right away.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.interval);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(interval = ?self.interval, sources = self.sources.len(), "starting health poller");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_once().await;
                }
                _ = self.refresh.notified() => {
                    debug!("manual refresh requested");
                    self.refresh_once().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("health poller shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One poll cycle: probe everything concurrently, settle all outcomes,
    /// publish one snapshot. Overlapping cycles are tolerated; the last
    /// cycle to complete wins.
    pub async fn refresh_once(&self) {
        let cycle = Uuid::new_v4();
        debug!(%cycle, "poll cycle started");

        // Enter Loading without discarding the previous data.
        let previous = self.snapshot.load_full();
        self.snapshot.store(Arc::new(PollSnapshot {
            state: PollState::Loading,
            sources: previous.sources.clone(),
            last_updated: previous.last_updated,
            error: None,
        }));

        let tasks: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = source.clone();
                let name = source.name().to_string();
                let handle = tokio::spawn(async move { probe(source.as_ref()).await });
                (name, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        let joined = join_all(tasks.into_iter().map(|(name, handle)| async move {
            match handle.await {
                Ok(report) => report,
                Err(e) => {
                    warn!(source = %name, error = %e, "probe task panicked");
                    SourceReport {
                        name: name.clone(),
                        health: crate::health::HealthStatus::unhealthy(
                            name,
                            "Health probe task failed",
                        ),
                        response_time_ms: 0,
                        error: Some("Health probe task failed".to_string()),
                    }
                }
            }
        }))
        .await;
        reports.extend(joined);

        let failed = reports.iter().filter(|r| r.failed()).count();
        let total = reports.len();

        let (state, error) = if total > 0 && failed == total {
            (
                PollState::Failed,
                Some("All health sources unavailable".to_string()),
            )
        } else if failed > 0 {
            (PollState::PartiallySucceeded, None)
        } else {
            (PollState::Succeeded, None)
        };

        if let Some(metrics) = &self.metrics {
            for report in &reports {
                metrics.record_probe(
                    &report.name,
                    !report.failed(),
                    Duration::from_millis(report.response_time_ms),
                );
                metrics.update_source_health(&report.name, report.health.status);
            }
            metrics.record_poll_cycle(total - failed, total);
        }

        match state {
            PollState::Failed => warn!(%cycle, total, "poll cycle failed: all sources unavailable"),
            _ => info!(%cycle, healthy = total - failed, total, "poll cycle complete"),
        }

        self.snapshot.store(Arc::new(PollSnapshot {
            state,
            sources: reports,
            last_updated: Some(Utc::now()),
            error,
        }));
    }
}
