//! Load controller: owns one run from pool setup to shutdown.

use crate::backend::Connector;
use crate::config::{RampUp, RunConfig};
use crate::error::LoadError;
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::pool::ConnectionPool;
use crate::reporter::{ReportHeader, Reporter};
use crate::worker::{Worker, WorkerOutcome, WorkerSettings, WorkerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Every operation recorded during the run.
    pub total: MetricsSnapshot,
    /// Number of interval reports emitted.
    pub reports: u64,
    /// Final state of each worker, in creation order.
    pub workers: Vec<WorkerOutcome>,
    /// When each worker was scheduled, relative to the first.
    pub worker_start_offsets: Vec<Duration>,
    /// Wall-clock time from arming the timeout to the end of shutdown.
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn workers_in(&self, state: WorkerState) -> usize {
        self.workers.iter().filter(|w| w.state == state).count()
    }
}

pub struct LoadController {
    config: RunConfig,
}

impl LoadController {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute one benchmark run.
    ///
    /// Validates the configuration, builds the pool, clears the workload key,
    /// arms the timeout, then starts the reporter and ramps up workers. Returns
    /// once the timeout has fired, the reporter has stopped and every worker
    /// has exited.
    pub async fn run(&self, connector: &dyn Connector) -> Result<RunSummary, LoadError> {
        let config = &self.config;
        config.validate()?;

        let pool = Arc::new(ConnectionPool::initialize(config.pool_size, connector).await?);
        if let Err(e) = pool.reset_key(&config.key_name).await {
            pool.close().await;
            return Err(e);
        }

        let started = Instant::now();
        let cancel = CancellationToken::new();
        let timer = arm_timeout(cancel.clone(), config.timeout);
        let metrics = MetricsAggregator::new();

        info!(
            "Starting run: {} worker(s), {} ramp-up, {} handle(s), {} byte(s) per write, timeout {:?}",
            config.app_threads,
            config.ramp_up,
            config.pool_size,
            config.payload.total_bytes(),
            config.timeout
        );

        let reporter = tokio::spawn(
            Reporter::new(
                metrics.clone(),
                pool.clone(),
                cancel.clone(),
                config.report_interval,
                ReportHeader::from(config),
            )
            .run(),
        );

        let (workers, worker_start_offsets) =
            self.spawn_workers(&pool, &metrics, &cancel).await;

        let reporter_totals = match reporter.await {
            Ok(totals) => totals,
            Err(e) => {
                error!("Reporter task failed, stopping run: {e}");
                cancel.cancel();
                timer.abort();
                for result in futures::future::join_all(workers).await {
                    if let Err(e) = result {
                        error!("Worker task failed: {e}");
                    }
                }
                pool.close().await;
                return Err(LoadError::Task {
                    task: "reporter",
                    message: e.to_string(),
                });
            }
        };

        let mut outcomes = Vec::with_capacity(workers.len());
        for result in futures::future::join_all(workers).await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Worker task failed: {e}"),
            }
        }
        timer.abort();

        let mut total = reporter_totals.total;
        total.absorb(metrics.drain());
        pool.close().await;

        let summary = RunSummary {
            total,
            reports: reporter_totals.reports,
            workers: outcomes,
            worker_start_offsets,
            elapsed: started.elapsed(),
        };
        info!(
            "Run finished after {:?}: {} request(s), {} worker(s) exhausted, {} cancelled",
            summary.elapsed,
            summary.total.operation_count,
            summary.workers_in(WorkerState::Exhausted),
            summary.workers_in(WorkerState::Cancelled)
        );
        Ok(summary)
    }

    /// Schedule workers per the ramp-up mode. Stops scheduling once the run is cancelled.
    async fn spawn_workers(
        &self,
        pool: &ConnectionPool,
        metrics: &MetricsAggregator,
        cancel: &CancellationToken,
    ) -> (Vec<JoinHandle<WorkerOutcome>>, Vec<Duration>) {
        let config = &self.config;
        let settings = WorkerSettings {
            key: Arc::from(config.key_name.as_str()),
            payload: config.payload,
            request_limit: config.requests_per_worker,
            jitter: config.jitter,
        };

        let mut handles = Vec::with_capacity(config.app_threads);
        let mut offsets = Vec::with_capacity(config.app_threads);
        let first = Instant::now();

        for index in 0..config.app_threads {
            if index > 0 {
                if let RampUp::Paced { interval } = config.ramp_up {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }
            if cancel.is_cancelled() {
                info!(
                    "Run cancelled during ramp-up, {index} of {} worker(s) created",
                    config.app_threads
                );
                break;
            }

            let worker = Worker::new(
                index,
                pool.assign(index),
                metrics.clone(),
                cancel.clone(),
                settings.clone(),
            );
            offsets.push(first.elapsed());
            handles.push(tokio::spawn(worker.run()));

            if matches!(config.ramp_up, RampUp::Paced { .. }) {
                info!("Created {} application worker(s)", index + 1);
            }
        }
        if config.ramp_up == RampUp::Burst {
            info!("Created {} application worker(s)", handles.len());
        }

        (handles, offsets)
    }
}

/// Cancel `cancel` once `timeout` has elapsed. There is no disarm.
fn arm_timeout(cancel: CancellationToken, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        info!("Run timeout of {timeout:?} reached, stopping");
        cancel.cancel();
    })
}
