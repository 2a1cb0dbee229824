//! Connection pool manager: a fixed set of backend handles created at startup.

use crate::backend::{Backend, BackendStatus, Connector};
use crate::error::LoadError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Backend handles owned for the lifetime of one run.
///
/// Workers get a handle by round-robin index and share it with every other
/// worker assigned to the same slot.
pub struct ConnectionPool {
    handles: Vec<Arc<dyn Backend>>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field(
                "handles",
                &self.handles.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ConnectionPool {
    /// Establish `size` handles in order. Any failure aborts the whole pool;
    /// handles already established are closed before the error is returned.
    pub async fn initialize(size: usize, connector: &dyn Connector) -> Result<Self, LoadError> {
        let mut handles: Vec<Arc<dyn Backend>> = Vec::with_capacity(size);
        for index in 0..size {
            match connector.connect(index).await {
                Ok(handle) => {
                    debug!("Established backend handle {}", handle.name());
                    handles.push(handle);
                }
                Err(source) => {
                    for handle in &handles {
                        if let Err(e) = handle.close().await {
                            warn!("Failed to close {} after pool init failure: {e}", handle.name());
                        }
                    }
                    return Err(LoadError::PoolInit {
                        index,
                        size,
                        source,
                    });
                }
            }
        }
        info!("Connection pool ready with {size} handle(s)");
        Ok(Self { handles })
    }

    /// Delete the workload key through the first handle so the run starts from an empty key.
    pub async fn reset_key(&self, key: &str) -> Result<(), LoadError> {
        let Some(first) = self.handles.first() else {
            return Ok(());
        };
        first
            .delete_key(key)
            .await
            .map_err(|source| LoadError::KeyReset {
                key: key.to_string(),
                source,
            })?;
        info!("Deleted workload key '{key}' via {}", first.name());
        Ok(())
    }

    /// Handle for worker `worker_index`: `handles[worker_index % len]`.
    pub fn assign(&self, worker_index: usize) -> Arc<dyn Backend> {
        self.handles[worker_index % self.handles.len()].clone()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn statuses(&self) -> Vec<BackendStatus> {
        self.handles.iter().map(|h| h.status()).collect()
    }

    /// Close every handle. Close failures are logged, never fatal.
    pub async fn close(&self) {
        for handle in &self.handles {
            if let Err(e) = handle.close().await {
                warn!("Failed to close backend {}: {e}", handle.name());
            }
        }
    }
}
