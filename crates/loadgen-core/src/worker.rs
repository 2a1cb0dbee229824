//! Worker: one concurrent request loop bound to a pool handle.

use crate::backend::Backend;
use crate::config::{JitterRange, PayloadShape};
use crate::metrics::MetricsAggregator;
use crate::payload;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    /// Reached its per-worker request cap.
    Exhausted,
    /// Observed the run's cancellation signal.
    Cancelled,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Exhausted => write!(f, "exhausted"),
            WorkerState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How a worker's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub index: usize,
    /// Terminal state, either `Exhausted` or `Cancelled`.
    pub state: WorkerState,
    /// Operations attempted, including failed ones.
    pub attempted: u64,
    /// Operations that completed and were recorded in the metrics.
    pub succeeded: u64,
}

/// Settings every worker of a run shares.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub key: Arc<str>,
    pub payload: PayloadShape,
    /// Per-worker request cap; 0 means no cap.
    pub request_limit: u64,
    pub jitter: JitterRange,
}

pub struct Worker {
    index: usize,
    backend: Arc<dyn Backend>,
    metrics: MetricsAggregator,
    cancel: CancellationToken,
    settings: WorkerSettings,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        index: usize,
        backend: Arc<dyn Backend>,
        metrics: MetricsAggregator,
        cancel: CancellationToken,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            index,
            backend,
            metrics,
            cancel,
            settings,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn budget_spent(&self, attempted: u64) -> bool {
        self.settings.request_limit > 0 && attempted >= self.settings.request_limit
    }

    /// Run the request loop until the cap is reached or the run is cancelled.
    ///
    /// Cancellation is checked before every iteration and during the jitter
    /// sleep; an operation that has started is always allowed to finish.
    pub async fn run(mut self) -> WorkerOutcome {
        self.state = WorkerState::Running;
        debug!(
            "Worker {} running against {}",
            self.index,
            self.backend.name()
        );

        let mut attempted = 0u64;
        let mut succeeded = 0u64;

        self.state = loop {
            if self.cancel.is_cancelled() {
                break WorkerState::Cancelled;
            }
            if self.budget_spent(attempted) {
                break WorkerState::Exhausted;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break WorkerState::Cancelled,
                _ = tokio::time::sleep(self.settings.jitter.sample()) => {}
            }

            let fields = payload::generate(&self.settings.payload, &mut rand::rng());
            let started = Instant::now();
            match self
                .backend
                .read_and_overwrite(&self.settings.key, &fields)
                .await
            {
                Ok(()) => {
                    self.metrics.record(started.elapsed());
                    succeeded += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Worker {} operation on {} failed: {e}",
                        self.index,
                        self.backend.name()
                    );
                }
                Err(e) => {
                    error!(
                        "Worker {} cannot use {}: {e}",
                        self.index,
                        self.backend.name()
                    );
                }
            }
            attempted += 1;
        };

        debug!(
            "Worker {} {} after {attempted} request(s), {succeeded} succeeded",
            self.index, self.state
        );

        WorkerOutcome {
            index: self.index,
            state: self.state,
            attempted,
            succeeded,
        }
    }
}
