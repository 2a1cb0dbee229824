//! Backend capability: the narrow interface the engine uses to talk to a store.
//!
//! A backend is one live connection (or connection set) to the store. Every
//! worker assigned to a handle calls it concurrently, so implementations do
//! their own internal synchronization; the engine never locks around a call.

use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One field of the workload hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashField {
    pub name: String,
    pub value: Vec<u8>,
}

/// A handle to the store.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used in status lines and logs, e.g. `multiplexed#0`.
    fn name(&self) -> &str;

    /// Delete `key` if it exists.
    async fn delete_key(&self, key: &str) -> Result<(), BackendError>;

    /// One unit of workload: read the whole hash at `key`, then overwrite it with `fields`.
    async fn read_and_overwrite(&self, key: &str, fields: &[HashField])
        -> Result<(), BackendError>;

    /// Point-in-time status of this handle.
    fn status(&self) -> BackendStatus;

    /// Release the underlying connections. Later calls fail with [`BackendError::Closed`].
    async fn close(&self) -> Result<(), BackendError>;
}

/// Creates backend handles for the pool.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish the handle for pool slot `index`.
    async fn connect(&self, index: usize) -> Result<Arc<dyn Backend>, BackendError>;
}

/// Status snapshot of one backend handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub name: String,
    /// Operations currently waiting on the store.
    pub in_flight: u64,
    /// Operations completed successfully since connect.
    pub completed: u64,
    /// Operations that returned an error since connect.
    pub failed: u64,
    /// Backend-specific detail, e.g. idle connections in a pool.
    pub detail: Option<String>,
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: in-flight={} completed={} failed={}",
            self.name, self.in_flight, self.completed, self.failed
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " {detail}")?;
        }
        Ok(())
    }
}

/// Per-handle operation counters backends embed to answer [`Backend::status`].
#[derive(Debug, Default)]
pub struct OpCounters {
    in_flight: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl OpCounters {
    /// Mark an operation as started. The returned guard settles it when finished.
    pub fn begin(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight {
            counters: self,
            settled: false,
        }
    }

    pub fn status(&self, name: &str, detail: Option<String>) -> BackendStatus {
        BackendStatus {
            name: name.to_string(),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            detail,
        }
    }
}

/// Guard for one in-flight operation. Dropping it unsettled counts as a failure.
pub struct InFlight<'a> {
    counters: &'a OpCounters,
    settled: bool,
}

impl InFlight<'_> {
    /// Record the operation's result and pass it through.
    pub fn settle<T>(mut self, result: Result<T, BackendError>) -> Result<T, BackendError> {
        self.settled = true;
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        match &result {
            Ok(_) => self.counters.completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.counters.failed.fetch_add(1, Ordering::Relaxed),
        };
        result
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
