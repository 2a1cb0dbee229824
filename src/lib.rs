//! redis-loadgen
//!
//! A load generator that drives concurrent hash read/modify workloads against
//! Redis and reports live throughput and latency, to compare how client
//! connection models (multiplexing, pooling, call style) behave under load.
//!
//! # CLI Usage
//!
//! ```bash
//! # 24 workers, one created per second, against a local server for 10 minutes
//! redis-loadgen
//!
//! # 64 workers created at once, 4 multiplexed connections, 500 requests each
//! redis-loadgen --app_threads 64 --dynamic false -m 4 -r 500
//!
//! # Pooled blocking connections, 20 per handle
//! redis-loadgen --service_stack --pooled_connections 20
//!
//! # Dry run against the in-process store
//! redis-loadgen --backend memory -t 1
//! ```

use clap::{ArgAction, Parser, ValueEnum};
use loadgen_core::{
    BackendKind, CallStyle, ConnectionParams, PayloadShape, RampUp, RunConfig, RuntimeTuning,
    DEFAULT_REPORT_INTERVAL,
};
use serde::Serialize;
use std::time::Duration;

pub mod runtime;

/// Startup delay used by `--profile`.
pub const PROFILE_DELAY: Duration = Duration::from_secs(30);

/// Backend variant selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendArg {
    /// One multiplexed connection per handle
    Multiplexed,
    /// A set of blocking connections per handle
    Pooled,
    /// In-process store, no network
    Memory,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Multiplexed => BackendKind::Multiplexed,
            BackendArg::Pooled => BackendKind::Pooled,
            BackendArg::Memory => BackendKind::Memory,
        }
    }
}

/// How the multiplexed backend issues its calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStyleArg {
    /// Await each call
    Await,
    /// Issue the async call and block the worker thread until it completes
    BlockingWait,
}

impl From<CallStyleArg> for CallStyle {
    fn from(arg: CallStyleArg) -> Self {
        match arg {
            CallStyleArg::Await => CallStyle::Await,
            CallStyleArg::BlockingWait => CallStyle::BlockingWait,
        }
    }
}

#[derive(Parser, Debug, Clone, Serialize)]
#[command(name = "redis-loadgen")]
#[command(about = "Drive concurrent hash read/modify load against Redis and report throughput and latency")]
#[command(long_about = None)]
pub struct Options {
    /// Number of application workers to create
    #[arg(long = "app_threads", default_value_t = 24)]
    pub app_threads: usize,

    /// Create workers one at a time, --pacing_ms apart, instead of all at once
    #[arg(
        short = 'd',
        long = "dynamic",
        default_value_t = true,
        default_missing_value = "true",
        num_args = 0..=1,
        action = ArgAction::Set
    )]
    pub dynamic: bool,

    /// Delay between worker creations when --dynamic is set
    #[arg(long = "pacing_ms", default_value_t = 1000)]
    pub pacing_ms: u64,

    /// Core worker threads of the async runtime
    #[arg(long = "worker_threads", default_value_t = 24)]
    pub worker_threads: usize,

    /// Maximum threads of the blocking I/O pool
    #[arg(long = "io_threads", default_value_t = 24)]
    pub io_threads: usize,

    /// Wait 30 seconds before starting so a profiler can attach
    #[arg(short = 'p', long = "profile")]
    pub profile: bool,

    /// Number of fields in the hash
    #[arg(long = "hash_size", default_value_t = 15)]
    pub hash_size: usize,

    /// Byte size of each field value
    #[arg(long = "payload_size", default_value_t = 128)]
    pub payload_size: usize,

    /// Hash key the workload reads and overwrites
    #[arg(short = 'k', long = "key_name", default_value = "key")]
    pub key_name: String,

    /// Number of backend handles (multiplexers or connection pools)
    #[arg(short = 'm', long = "mux_count", default_value_t = 1)]
    pub mux_count: usize,

    /// Run duration in minutes
    #[arg(short = 't', long = "time_out", default_value_t = 10)]
    pub time_out: u64,

    /// Requests per worker; 0 runs until the timeout
    #[arg(short = 'r', long = "requests", default_value_t = 100_000)]
    pub requests: u64,

    /// Backend variant
    #[arg(long = "backend", value_enum)]
    pub backend: Option<BackendArg>,

    /// Shorthand for --backend pooled
    #[arg(long = "service_stack", conflicts_with = "backend")]
    pub service_stack: bool,

    /// Call style of the multiplexed backend
    #[arg(long = "call_style", value_enum)]
    pub call_style: Option<CallStyleArg>,

    /// Shorthand for --call_style blocking-wait
    #[arg(long = "async", conflicts_with = "call_style")]
    pub async_calls: bool,

    /// Connections per handle for the pooled backend
    #[arg(long = "pooled_connections", default_value_t = 10)]
    pub pooled_connections: usize,

    /// Redis server URL
    #[arg(long = "redis_url", env = "REDIS_URL", default_value = "redis://127.0.0.1/")]
    pub redis_url: String,

    /// Connection establishment timeout
    #[arg(long = "connect_timeout_ms", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Per-request response timeout
    #[arg(long = "response_timeout_ms", default_value_t = 5000)]
    pub response_timeout_ms: u64,
}

impl Options {
    pub fn backend_kind(&self) -> BackendKind {
        match (self.backend, self.service_stack) {
            (Some(arg), _) => arg.into(),
            (None, true) => BackendKind::Pooled,
            (None, false) => BackendKind::Multiplexed,
        }
    }

    pub fn call_style(&self) -> CallStyle {
        match (self.call_style, self.async_calls) {
            (Some(arg), _) => arg.into(),
            (None, true) => CallStyle::BlockingWait,
            (None, false) => CallStyle::Await,
        }
    }

    /// Resolve the options into the engine's run configuration.
    ///
    /// Ranges are not checked here; call [`RunConfig::validate`] on the result.
    pub fn to_run_config(&self) -> RunConfig {
        let ramp_up = if self.dynamic {
            RampUp::Paced {
                interval: Duration::from_millis(self.pacing_ms),
            }
        } else {
            RampUp::Burst
        };

        RunConfig {
            app_threads: self.app_threads,
            ramp_up,
            requests_per_worker: self.requests,
            timeout: Duration::from_secs(self.time_out.saturating_mul(60)),
            payload: PayloadShape {
                field_count: self.hash_size,
                field_size: self.payload_size,
            },
            key_name: self.key_name.clone(),
            pool_size: self.mux_count,
            backend: self.backend_kind(),
            call_style: self.call_style(),
            pooled_connections: self.pooled_connections,
            tuning: RuntimeTuning {
                worker_threads: self.worker_threads,
                io_threads: self.io_threads,
            },
            connection: ConnectionParams {
                url: self.redis_url.clone(),
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                response_timeout: Duration::from_millis(self.response_timeout_ms),
            },
            report_interval: DEFAULT_REPORT_INTERVAL,
            ..RunConfig::default()
        }
    }
}
