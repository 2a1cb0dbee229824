//! Interval metrics shared by every worker and the reporter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Operation count and cumulative latency, drained once per reporting interval.
///
/// The two counters are independent atomics. A drain swaps each to zero in
/// turn, so an increment racing with a drain may land its count in one
/// interval and its latency in the next. Totals over a run are exact.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    operations: AtomicU64,
    latency_nanos: AtomicU64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed operation.
    pub fn record(&self, latency: Duration) {
        self.add(1, latency.as_nanos().min(u64::MAX as u128) as u64);
    }

    /// Add `count` operations totalling `latency_nanos`.
    pub fn add(&self, count: u64, latency_nanos: u64) {
        self.inner.operations.fetch_add(count, Ordering::Relaxed);
        self.inner
            .latency_nanos
            .fetch_add(latency_nanos, Ordering::Relaxed);
    }

    /// Read both counters and reset them to zero.
    pub fn drain(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operation_count: self.inner.operations.swap(0, Ordering::Relaxed),
            cumulative_latency_nanos: self.inner.latency_nanos.swap(0, Ordering::Relaxed),
        }
    }
}

/// Counters taken from the aggregator by one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub operation_count: u64,
    pub cumulative_latency_nanos: u64,
}

impl MetricsSnapshot {
    /// Mean latency per operation, or `None` when no operation completed.
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.operation_count == 0 {
            return None;
        }
        Some(Duration::from_nanos(
            self.cumulative_latency_nanos / self.operation_count,
        ))
    }

    /// Mean latency in fractional milliseconds, or `None` when no operation completed.
    pub fn mean_latency_ms(&self) -> Option<f64> {
        if self.operation_count == 0 {
            return None;
        }
        Some(self.cumulative_latency_nanos as f64 / self.operation_count as f64 / 1_000_000.0)
    }

    /// Fold another snapshot into this one.
    pub fn absorb(&mut self, other: MetricsSnapshot) {
        self.operation_count += other.operation_count;
        self.cumulative_latency_nanos += other.cumulative_latency_nanos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_resets() {
        let metrics = MetricsAggregator::new();
        metrics.record(Duration::from_micros(250));
        metrics.record(Duration::from_micros(750));

        let first = metrics.drain();
        assert_eq!(first.operation_count, 2);
        assert_eq!(first.cumulative_latency_nanos, 1_000_000);

        let second = metrics.drain();
        assert_eq!(second, MetricsSnapshot::default());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        const WORKERS: u64 = 16;
        const PER_WORKER: u64 = 1_000;
        const LATENCY: u64 = 1_500;

        let metrics = MetricsAggregator::new();
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let m = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..PER_WORKER {
                        m.add(1, LATENCY);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.drain();
        assert_eq!(snapshot.operation_count, WORKERS * PER_WORKER);
        assert_eq!(
            snapshot.cumulative_latency_nanos,
            WORKERS * PER_WORKER * LATENCY
        );
    }

    #[tokio::test]
    async fn test_concurrent_tasks_each_add_one() {
        const K: u64 = 64;
        const L: u64 = 2_000_000;

        let metrics = MetricsAggregator::new();
        let tasks: Vec<_> = (0..K)
            .map(|_| {
                let m = metrics.clone();
                tokio::spawn(async move { m.add(1, L) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = metrics.drain();
        assert_eq!(snapshot.operation_count, K);
        assert_eq!(snapshot.cumulative_latency_nanos, K * L);
    }

    #[test]
    fn test_mean_latency_without_operations() {
        let snapshot = MetricsSnapshot::default();
        assert_eq!(snapshot.mean_latency(), None);
        assert_eq!(snapshot.mean_latency_ms(), None);
    }

    #[test]
    fn test_mean_latency() {
        let snapshot = MetricsSnapshot {
            operation_count: 4,
            cumulative_latency_nanos: 10_000_000,
        };
        assert_eq!(snapshot.mean_latency(), Some(Duration::from_micros(2_500)));
        let ms = snapshot.mean_latency_ms().unwrap();
        assert!((ms - 2.5).abs() < f64::EPSILON, "{ms}");
    }

    #[test]
    fn test_absorb() {
        let mut total = MetricsSnapshot::default();
        total.absorb(MetricsSnapshot {
            operation_count: 3,
            cumulative_latency_nanos: 30,
        });
        total.absorb(MetricsSnapshot {
            operation_count: 2,
            cumulative_latency_nanos: 5,
        });
        assert_eq!(total.operation_count, 5);
        assert_eq!(total.cumulative_latency_nanos, 35);
    }
}
