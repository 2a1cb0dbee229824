//! A set of blocking connections per handle, checked out for each operation.

use crate::error::{connect_error, operation_error};
use async_trait::async_trait;
use loadgen_core::{Backend, BackendError, BackendStatus, ConnectionParams, HashField, OpCounters};
use redis::{Commands, Connection, RedisResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub struct PooledBackend {
    name: String,
    client: redis::Client,
    params: ConnectionParams,
    depth: usize,
    idle: Arc<Mutex<Vec<Connection>>>,
    permits: Semaphore,
    counters: OpCounters,
    closed: AtomicBool,
}

fn open_connection(client: &redis::Client, params: &ConnectionParams) -> RedisResult<Connection> {
    let connection = client.get_connection_with_timeout(params.connect_timeout)?;
    connection.set_read_timeout(Some(params.response_timeout))?;
    connection.set_write_timeout(Some(params.response_timeout))?;
    Ok(connection)
}

fn hgetall_then_hset(
    connection: &mut Connection,
    key: &str,
    fields: &[HashField],
) -> Result<(), BackendError> {
    let _current: redis::Value = connection.hgetall(key).map_err(operation_error)?;

    let items: Vec<(&str, &[u8])> = fields
        .iter()
        .map(|f| (f.name.as_str(), f.value.as_slice()))
        .collect();
    let _: () = connection
        .hset_multiple(key, items.as_slice())
        .map_err(operation_error)?;
    Ok(())
}

impl PooledBackend {
    /// Open `depth` connections up front; any failure fails the handle.
    pub async fn connect(
        index: usize,
        params: &ConnectionParams,
        depth: usize,
    ) -> Result<Self, BackendError> {
        let client =
            redis::Client::open(params.url.as_str()).map_err(|e| connect_error(&params.url, e))?;

        let connections = {
            let client = client.clone();
            let task_params = params.clone();
            tokio::task::spawn_blocking(move || {
                (0..depth)
                    .map(|_| open_connection(&client, &task_params))
                    .collect::<RedisResult<Vec<_>>>()
            })
            .await
            .map_err(|e| BackendError::Connect(format!("connection task failed: {e}")))?
            .map_err(|e| connect_error(&params.url, e))?
        };

        let name = format!("pooled#{index}");
        debug!("{name} opened {depth} connection(s) to {}", params.url);
        Ok(Self {
            name,
            client,
            params: params.clone(),
            depth,
            idle: Arc::new(Mutex::new(connections)),
            permits: Semaphore::new(depth),
            counters: OpCounters::default(),
            closed: AtomicBool::new(false),
        })
    }

    fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Run `op` on a checked-out connection on the blocking pool. A connection
    /// that fails is discarded and reopened by a later checkout.
    async fn with_connection<F>(&self, op: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut Connection) -> Result<(), BackendError> + Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BackendError::Closed(self.name.clone()))?;

        let checked_out = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let client = self.client.clone();
        let params = self.params.clone();

        let (connection, result) = tokio::task::spawn_blocking(move || {
            let mut connection = match checked_out {
                Some(connection) => connection,
                None => match open_connection(&client, &params) {
                    Ok(connection) => connection,
                    Err(e) => return (None, Err(operation_error(e))),
                },
            };
            let result = op(&mut connection);
            (Some(connection), result)
        })
        .await
        .map_err(|e| BackendError::Transport(format!("blocking call failed: {e}")))?;

        match (connection, &result) {
            (Some(connection), Ok(())) if !self.closed.load(Ordering::Acquire) => {
                self.idle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(connection);
            }
            (Some(_), Err(e)) => {
                warn!("{} discarding connection after error: {e}", self.name);
            }
            _ => {}
        }
        result
    }
}

#[async_trait]
impl Backend for PooledBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_key(&self, key: &str) -> Result<(), BackendError> {
        let key = key.to_string();
        self.with_connection(move |connection| {
            let _: () = connection.del(&key).map_err(operation_error)?;
            Ok(())
        })
        .await
    }

    async fn read_and_overwrite(
        &self,
        key: &str,
        fields: &[HashField],
    ) -> Result<(), BackendError> {
        let op = self.counters.begin();
        let key = key.to_string();
        let fields = fields.to_vec();
        let result = self
            .with_connection(move |connection| hgetall_then_hset(connection, &key, &fields))
            .await;
        op.settle(result)
    }

    fn status(&self) -> BackendStatus {
        self.counters.status(
            &self.name,
            Some(format!(
                "idle={}/{} target={}",
                self.idle_count(),
                self.depth,
                self.params.url
            )),
        )
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        self.permits.close();
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
