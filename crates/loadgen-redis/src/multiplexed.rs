//! One multiplexed connection shared by every worker assigned to the handle.

use crate::error::{connect_error, operation_error};
use async_trait::async_trait;
use loadgen_core::{
    Backend, BackendError, BackendStatus, CallStyle, ConnectionParams, HashField, OpCounters,
};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, AsyncConnectionConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub struct MultiplexedBackend {
    name: String,
    url: String,
    connection: MultiplexedConnection,
    call_style: CallStyle,
    counters: OpCounters,
    closed: AtomicBool,
}

impl MultiplexedBackend {
    pub async fn connect(
        index: usize,
        params: &ConnectionParams,
        call_style: CallStyle,
    ) -> Result<Self, BackendError> {
        let client =
            redis::Client::open(params.url.as_str()).map_err(|e| connect_error(&params.url, e))?;
        let config = AsyncConnectionConfig::new()
            .set_connection_timeout(params.connect_timeout)
            .set_response_timeout(params.response_timeout);
        let connection = client
            .get_multiplexed_async_connection_with_config(&config)
            .await
            .map_err(|e| connect_error(&params.url, e))?;

        let name = format!("multiplexed#{index}");
        debug!("{name} connected to {}", params.url);
        Ok(Self {
            name,
            url: params.url.clone(),
            connection,
            call_style,
            counters: OpCounters::default(),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed(self.name.clone()));
        }
        Ok(())
    }

    async fn hgetall_then_hset(
        mut connection: MultiplexedConnection,
        key: &str,
        fields: &[HashField],
    ) -> Result<(), BackendError> {
        let _current: redis::Value = connection.hgetall(key).await.map_err(operation_error)?;

        let items: Vec<(&str, &[u8])> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_slice()))
            .collect();
        let _: () = connection
            .hset_multiple(key, items.as_slice())
            .await
            .map_err(operation_error)?;
        Ok(())
    }
}

#[async_trait]
impl Backend for MultiplexedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_key(&self, key: &str) -> Result<(), BackendError> {
        self.ensure_open()?;
        let mut connection = self.connection.clone();
        let _: () = connection.del(key).await.map_err(operation_error)?;
        Ok(())
    }

    async fn read_and_overwrite(
        &self,
        key: &str,
        fields: &[HashField],
    ) -> Result<(), BackendError> {
        self.ensure_open()?;
        let op = self.counters.begin();
        let connection = self.connection.clone();

        let result = match self.call_style {
            CallStyle::Await => Self::hgetall_then_hset(connection, key, fields).await,
            // Issue the async calls but park this worker thread until they finish.
            CallStyle::BlockingWait => tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(Self::hgetall_then_hset(
                    connection, key, fields,
                ))
            }),
        };
        op.settle(result)
    }

    fn status(&self) -> BackendStatus {
        self.counters.status(
            &self.name,
            Some(format!("style={} target={}", self.call_style, self.url)),
        )
    }

    async fn close(&self) -> Result<(), BackendError> {
        // The connection's driver task stops once the last clone is dropped.
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
