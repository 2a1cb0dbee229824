//! End-to-end runs of the load controller against in-process backends.
//!
//! All scenarios run on a paused tokio clock, so timeouts, pacing and jitter
//! elapse in simulated time.

mod common;

use common::{init_tracing, ShapeCheckingConnector, UnreachableConnector};
use loadgen_core::{
    BackendKind, LoadController, LoadError, MemoryConnector, PayloadShape, RampUp, RunConfig,
    WorkerState,
};
use std::time::Duration;

fn base_config() -> RunConfig {
    RunConfig {
        app_threads: 3,
        ramp_up: RampUp::Burst,
        requests_per_worker: 5,
        timeout: Duration::from_secs(5),
        pool_size: 1,
        backend: BackendKind::Memory,
        ..RunConfig::default()
    }
}

/// Request cap reached well before the timeout: every worker exhausts its budget.
#[tokio::test(start_paused = true)]
async fn test_burst_run_with_request_cap_records_every_operation() {
    init_tracing();
    let connector = MemoryConnector::new();

    let summary = LoadController::new(base_config())
        .run(&connector)
        .await
        .expect("run should complete");

    assert_eq!(summary.total.operation_count, 15);
    assert_eq!(connector.store().writes(), 15);
    assert_eq!(summary.workers.len(), 3);
    assert_eq!(summary.workers_in(WorkerState::Exhausted), 3);
    assert!(summary.workers.iter().all(|w| w.succeeded == 5));
    // The run is timeout-bound even when workers finish early.
    assert!(summary.elapsed >= Duration::from_secs(5));
    assert!(summary.reports >= 4);
}

/// Timeout fires before any worker reaches its cap.
#[tokio::test(start_paused = true)]
async fn test_timeout_cancels_workers_before_cap() {
    init_tracing();
    let connector = MemoryConnector::new().with_latency(Duration::from_millis(2));
    let config = RunConfig {
        requests_per_worker: 100_000,
        timeout: Duration::from_secs(1),
        ..base_config()
    };
    let cap = config.app_threads as u64 * config.requests_per_worker;

    let summary = LoadController::new(config)
        .run(&connector)
        .await
        .expect("run should complete");

    assert_eq!(summary.workers.len(), 3);
    assert_eq!(summary.workers_in(WorkerState::Cancelled), 3);
    assert!(summary.total.operation_count > 0);
    assert!(summary.total.operation_count < cap);
    assert_eq!(
        summary.total.operation_count,
        summary.workers.iter().map(|w| w.succeeded).sum::<u64>()
    );
}

/// Every write carries exactly hash_size fields of payload_size random bytes.
#[tokio::test(start_paused = true)]
async fn test_every_write_has_configured_shape() {
    init_tracing();
    let shape = PayloadShape {
        field_count: 15,
        field_size: 128,
    };
    let connector = ShapeCheckingConnector::new(shape);
    let config = RunConfig {
        payload: shape,
        pool_size: 2,
        requests_per_worker: 20,
        ..base_config()
    };

    let summary = LoadController::new(config)
        .run(&connector)
        .await
        .expect("run should complete");

    assert_eq!(connector.total_writes(), 60);
    assert_eq!(summary.total.operation_count, 60);
    assert!(
        connector.violations().is_empty(),
        "{:?}",
        connector.violations()
    );
}

#[tokio::test(start_paused = true)]
async fn test_paced_ramp_up_spacing() {
    init_tracing();
    let pacing = Duration::from_millis(100);
    let connector = MemoryConnector::new();
    let config = RunConfig {
        app_threads: 6,
        ramp_up: RampUp::Paced { interval: pacing },
        requests_per_worker: 1,
        timeout: Duration::from_secs(3),
        ..base_config()
    };

    let summary = LoadController::new(config)
        .run(&connector)
        .await
        .expect("run should complete");

    let offsets = &summary.worker_start_offsets;
    assert_eq!(offsets.len(), 6);
    assert_eq!(offsets[0], Duration::ZERO);
    for (n, offset) in offsets.iter().enumerate() {
        assert!(
            *offset >= pacing * n as u32,
            "worker {n} scheduled at {offset:?}, expected at least {:?}",
            pacing * n as u32
        );
    }
    assert_eq!(summary.total.operation_count, 6);
}

#[tokio::test(start_paused = true)]
async fn test_burst_schedules_all_workers_at_once() {
    let connector = MemoryConnector::new();
    let summary = LoadController::new(RunConfig {
        app_threads: 8,
        ..base_config()
    })
    .run(&connector)
    .await
    .expect("run should complete");

    assert!(summary
        .worker_start_offsets
        .iter()
        .all(|offset| *offset == Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn test_workers_share_handles_round_robin() {
    let connector = MemoryConnector::new();
    let summary = LoadController::new(RunConfig {
        app_threads: 5,
        pool_size: 2,
        requests_per_worker: 4,
        ..base_config()
    })
    .run(&connector)
    .await
    .expect("run should complete");

    let handles = connector.handles();
    assert_eq!(handles.len(), 2);
    let per_handle: Vec<u64> = handles
        .iter()
        .map(|h| loadgen_core::Backend::status(h.as_ref()).completed)
        .collect();
    // Workers 0, 2, 4 on handle 0 and workers 1, 3 on handle 1.
    assert_eq!(per_handle, vec![12, 8]);
    assert_eq!(summary.total.operation_count, 20);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_backend_aborts_before_workers_start() {
    let err = LoadController::new(base_config())
        .run(&UnreachableConnector)
        .await
        .unwrap_err();

    match err {
        LoadError::PoolInit { index, size, .. } => {
            assert_eq!(index, 0);
            assert_eq!(size, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_requests_run_until_timeout() {
    let connector = MemoryConnector::new();
    let summary = LoadController::new(RunConfig {
        app_threads: 2,
        requests_per_worker: 0,
        timeout: Duration::from_secs(2),
        ..base_config()
    })
    .run(&connector)
    .await
    .expect("run should complete");

    assert_eq!(summary.workers_in(WorkerState::Cancelled), 2);
    // Jitter is under 20ms, so each worker manages well over 50 requests in 2s.
    assert!(summary.workers.iter().all(|w| w.attempted > 50));
}
