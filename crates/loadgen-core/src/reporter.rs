//! Periodic throughput/latency reporting.

use crate::backend::BackendStatus;
use crate::config::{PayloadShape, RunConfig, RuntimeTuning};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::pool::ConnectionPool;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration fields echoed on every report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHeader {
    pub payload: PayloadShape,
    pub pool_size: usize,
    pub app_threads: usize,
    pub tuning: RuntimeTuning,
}

impl From<&RunConfig> for ReportHeader {
    fn from(config: &RunConfig) -> Self {
        Self {
            payload: config.payload,
            pool_size: config.pool_size,
            app_threads: config.app_threads,
            tuning: config.tuning,
        }
    }
}

/// One interval's worth of output.
#[derive(Debug, Clone)]
pub struct IntervalReport {
    pub at: DateTime<Local>,
    pub header: ReportHeader,
    pub statuses: Vec<BackendStatus>,
    pub snapshot: MetricsSnapshot,
}

impl IntervalReport {
    /// Aggregate line: configuration echo, interval operation count and mean latency.
    pub fn summary_line(&self) -> String {
        let latency = match self.snapshot.mean_latency_ms() {
            Some(ms) => format!("{ms:.3}ms"),
            None => "n/a".to_string(),
        };
        format!(
            "[{}] hash_size={} payload_size={}B pool={} workers={} worker_threads={} io_threads={} | requests={} mean_latency={}",
            self.at.format("%H:%M:%S"),
            self.header.payload.field_count,
            self.header.payload.field_size,
            self.header.pool_size,
            self.header.app_threads,
            self.header.tuning.worker_threads,
            self.header.tuning.io_threads,
            self.snapshot.operation_count,
            latency,
        )
    }

    /// One status line per pool handle followed by the aggregate line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.statuses.iter().map(|s| s.to_string()).collect();
        lines.push(self.summary_line());
        lines
    }
}

/// What the reporter saw over the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterTotals {
    /// Sum of every drained interval.
    pub total: MetricsSnapshot,
    /// Number of reports emitted.
    pub reports: u64,
}

pub struct Reporter {
    metrics: MetricsAggregator,
    pool: Arc<ConnectionPool>,
    cancel: CancellationToken,
    interval: Duration,
    header: ReportHeader,
}

impl Reporter {
    pub fn new(
        metrics: MetricsAggregator,
        pool: Arc<ConnectionPool>,
        cancel: CancellationToken,
        interval: Duration,
        header: ReportHeader,
    ) -> Self {
        Self {
            metrics,
            pool,
            cancel,
            interval,
            header,
        }
    }

    /// Drain the metrics and build the report for the interval just ended.
    pub fn tick(&self) -> IntervalReport {
        IntervalReport {
            at: Local::now(),
            header: self.header,
            statuses: self.pool.statuses(),
            snapshot: self.metrics.drain(),
        }
    }

    /// Report once per interval until the run is cancelled. The first report
    /// comes one full interval after start.
    pub async fn run(self) -> ReporterTotals {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut totals = ReporterTotals::default();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.tick();
                    for line in report.lines() {
                        println!("{line}");
                    }
                    totals.total.absorb(report.snapshot);
                    totals.reports += 1;
                }
            }
        }

        debug!(
            "Reporter stopped after {} report(s), {} request(s) reported",
            totals.reports, totals.total.operation_count
        );
        totals
    }
}
