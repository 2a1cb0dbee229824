//! Error types for the load-generation engine.

use thiserror::Error;

/// Invalid option values or combinations, detected before any connection is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A single option is outside its accepted range.
    #[error("invalid value for --{option}: {reason}")]
    OutOfRange {
        option: &'static str,
        reason: String,
    },

    /// Two or more options cannot be used together.
    #[error("incompatible options: {0}")]
    Incompatible(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by a backend, either while connecting or on a single operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or the handshake failed.
    #[error("connect error: {0}")]
    Connect(String),

    /// The operation did not complete within the transport's timeout.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// I/O or connection-level failure during an operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with an error or an unexpected reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The handle was used after `close()`.
    #[error("backend '{0}' is closed")]
    Closed(String),
}

impl BackendError {
    /// Whether this error is scoped to a single operation and the worker may carry on.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout(_) | BackendError::Transport(_) | BackendError::Protocol(_)
        )
    }
}

/// Fatal errors that abort a run before or while it starts.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A pool handle could not be established; no partial pool is used.
    #[error("failed to establish backend handle {index} of {size}: {source}")]
    PoolInit {
        index: usize,
        size: usize,
        #[source]
        source: BackendError,
    },

    /// The pre-run delete of the workload key failed.
    #[error("failed to reset workload key '{key}': {source}")]
    KeyReset {
        key: String,
        #[source]
        source: BackendError,
    },

    /// A spawned task panicked.
    #[error("{task} task failed: {message}")]
    Task { task: &'static str, message: String },
}
