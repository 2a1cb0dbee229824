//! Mapping of Redis client errors onto backend errors.

use loadgen_core::BackendError;
use redis::RedisError;

/// Classify a Redis error raised by a workload operation.
pub fn operation_error(err: RedisError) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        BackendError::Transport(err.to_string())
    } else {
        BackendError::Protocol(err.to_string())
    }
}

/// Classify a Redis error raised while establishing a connection.
pub fn connect_error(url: &str, err: RedisError) -> BackendError {
    BackendError::Connect(format!("{url}: {err}"))
}
