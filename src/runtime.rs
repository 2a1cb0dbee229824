//! Async runtime sized from the run's tuning options.

use loadgen_core::RuntimeTuning;
use tokio::runtime::{Builder, Runtime};

/// Build the multi-thread runtime the workers run on.
///
/// `worker_threads` sizes the core scheduler; `io_threads` caps the blocking
/// pool that pooled connections and blocking waits run on.
pub fn build(tuning: &RuntimeTuning) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(tuning.worker_threads)
        .max_blocking_threads(tuning.io_threads)
        .thread_name("loadgen-worker")
        .enable_all()
        .build()
}
