//! In-process backend over a shared hash map.
//!
//! Used for dry runs (`--backend memory`) and as the engine's test backend.
//! All handles created by one [`MemoryConnector`] share one [`MemoryStore`],
//! the way pool handles share one server.

use crate::backend::{Backend, BackendStatus, Connector, HashField, OpCounters};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Hashes stored by key, plus counters for inspection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    hashes: Mutex<HashMap<String, Vec<HashField>>>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryStore {
    /// Current fields of the hash at `key`.
    pub fn get(&self, key: &str) -> Option<Vec<HashField>> {
        self.hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: &str, fields: Vec<HashField>) {
        self.hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), fields);
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }
}

/// One handle onto a [`MemoryStore`].
pub struct MemoryBackend {
    name: String,
    store: Arc<MemoryStore>,
    latency: Duration,
    counters: OpCounters,
    closed: AtomicBool,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>, store: Arc<MemoryStore>) -> Self {
        Self {
            name: name.into(),
            store,
            latency: Duration::ZERO,
            counters: OpCounters::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Delay every operation by `latency` to imitate a network round-trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.is_closed() {
            return Err(BackendError::Closed(self.name.clone()));
        }
        Ok(())
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_key(&self, key: &str) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.round_trip().await;
        self.store
            .hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        self.store.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn read_and_overwrite(
        &self,
        key: &str,
        fields: &[HashField],
    ) -> Result<(), BackendError> {
        self.ensure_open()?;
        let op = self.counters.begin();

        self.round_trip().await;
        let _current = self.store.get(key);
        self.store.reads.fetch_add(1, Ordering::Relaxed);

        self.round_trip().await;
        self.store.insert(key, fields.to_vec());
        self.store.writes.fetch_add(1, Ordering::Relaxed);

        op.settle(Ok(()))
    }

    fn status(&self) -> BackendStatus {
        let keys = self
            .store
            .hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        self.counters.status(&self.name, Some(format!("keys={keys}")))
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Creates [`MemoryBackend`] handles onto one shared store.
#[derive(Default)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    latency: Duration,
    handles: Mutex<Vec<Arc<MemoryBackend>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a simulated round-trip latency to every handle this connector creates.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    /// Handles created so far, in pool order.
    pub fn handles(&self) -> Vec<Arc<MemoryBackend>> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, index: usize) -> Result<Arc<dyn Backend>, BackendError> {
        let backend = Arc::new(
            MemoryBackend::new(format!("memory#{index}"), self.store.clone())
                .with_latency(self.latency),
        );
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(backend.clone());
        Ok(backend)
    }
}
