//! Redis backends for redis-loadgen.
//!
//! Two connection models are provided behind [`loadgen_core::Backend`]:
//!
//! - [`MultiplexedBackend`]: one multiplexed async connection per handle,
//!   shared by all workers assigned to it. Operations either await the client
//!   or block the worker thread on it, per [`CallStyle`].
//! - [`PooledBackend`]: a fixed set of blocking connections per handle. Each
//!   operation checks one out and runs on the blocking thread pool.

pub mod error;
pub mod multiplexed;
pub mod pooled;

#[cfg(test)]
mod testing;

pub use multiplexed::MultiplexedBackend;
pub use pooled::PooledBackend;

use async_trait::async_trait;
use loadgen_core::{
    Backend, BackendError, BackendKind, CallStyle, ConnectionParams, Connector, RunConfig,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("backend '{0}' is not served by Redis")]
pub struct UnsupportedBackend(pub BackendKind);

/// Creates Redis backend handles for the connection pool.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    kind: BackendKind,
    call_style: CallStyle,
    params: ConnectionParams,
    pooled_connections: usize,
}

impl RedisConnector {
    pub fn multiplexed(params: ConnectionParams, call_style: CallStyle) -> Self {
        Self {
            kind: BackendKind::Multiplexed,
            call_style,
            params,
            pooled_connections: 1,
        }
    }

    pub fn pooled(params: ConnectionParams, pooled_connections: usize) -> Self {
        Self {
            kind: BackendKind::Pooled,
            call_style: CallStyle::Await,
            params,
            pooled_connections,
        }
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, UnsupportedBackend> {
        match config.backend {
            BackendKind::Multiplexed => Ok(Self::multiplexed(
                config.connection.clone(),
                config.call_style,
            )),
            BackendKind::Pooled => Ok(Self::pooled(
                config.connection.clone(),
                config.pooled_connections,
            )),
            other => Err(UnsupportedBackend(other)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self, index: usize) -> Result<Arc<dyn Backend>, BackendError> {
        match self.kind {
            BackendKind::Multiplexed => {
                let backend =
                    MultiplexedBackend::connect(index, &self.params, self.call_style).await?;
                Ok(Arc::new(backend))
            }
            BackendKind::Pooled => {
                let backend =
                    PooledBackend::connect(index, &self.params, self.pooled_connections).await?;
                Ok(Arc::new(backend))
            }
            other => Err(BackendError::Connect(
                UnsupportedBackend(other).to_string(),
            )),
        }
    }
}
