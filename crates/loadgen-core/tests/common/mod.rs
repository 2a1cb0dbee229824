//! Shared stub backends for run scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use loadgen_core::{
    Backend, BackendError, BackendStatus, Connector, HashField, OpCounters, PayloadShape,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("loadgen_core=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

/// Checks the shape of every write it receives against `expected`.
pub struct ShapeCheckingBackend {
    name: String,
    expected: PayloadShape,
    counters: OpCounters,
    pub writes: AtomicU64,
    pub violations: Mutex<Vec<String>>,
    pub last_write: Mutex<Option<Vec<HashField>>>,
}

#[async_trait]
impl Backend for ShapeCheckingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_key(&self, _key: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn read_and_overwrite(
        &self,
        _key: &str,
        fields: &[HashField],
    ) -> Result<(), BackendError> {
        let op = self.counters.begin();
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut violations = Vec::new();
        if fields.len() != self.expected.field_count {
            violations.push(format!(
                "expected {} fields, got {}",
                self.expected.field_count,
                fields.len()
            ));
        }
        for field in fields {
            if field.value.len() != self.expected.field_size {
                violations.push(format!(
                    "field {} has {} bytes, expected {}",
                    field.name,
                    field.value.len(),
                    self.expected.field_size
                ));
            }
        }
        self.violations.lock().unwrap().extend(violations);
        *self.last_write.lock().unwrap() = Some(fields.to_vec());

        op.settle(Ok(()))
    }

    fn status(&self) -> BackendStatus {
        self.counters.status(&self.name, None)
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

pub struct ShapeCheckingConnector {
    expected: PayloadShape,
    pub handles: Mutex<Vec<Arc<ShapeCheckingBackend>>>,
}

impl ShapeCheckingConnector {
    pub fn new(expected: PayloadShape) -> Self {
        Self {
            expected,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn total_writes(&self) -> u64 {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .map(|h| h.writes.load(Ordering::SeqCst))
            .sum()
    }

    pub fn violations(&self) -> Vec<String> {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .flat_map(|h| h.violations.lock().unwrap().clone())
            .collect()
    }
}

#[async_trait]
impl Connector for ShapeCheckingConnector {
    async fn connect(&self, index: usize) -> Result<Arc<dyn Backend>, BackendError> {
        let backend = Arc::new(ShapeCheckingBackend {
            name: format!("shape#{index}"),
            expected: self.expected,
            counters: OpCounters::default(),
            writes: AtomicU64::new(0),
            violations: Mutex::new(Vec::new()),
            last_write: Mutex::new(None),
        });
        self.handles.lock().unwrap().push(backend.clone());
        Ok(backend)
    }
}

/// Refuses every connection, like a store that is not running.
pub struct UnreachableConnector;

#[async_trait]
impl Connector for UnreachableConnector {
    async fn connect(&self, _index: usize) -> Result<Arc<dyn Backend>, BackendError> {
        Err(BackendError::Connect(
            "connection refused (os error 111)".to_string(),
        ))
    }
}
