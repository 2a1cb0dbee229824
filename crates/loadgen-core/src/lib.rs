//! Concurrent load-generation engine for redis-loadgen.
//!
//! Drives a read/modify workload against a key-value store through a
//! swappable [`Backend`] and reports live throughput and latency.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │  LoadController  │── arms timeout ──▶ CancellationToken
//!                 └────────┬─────────┘
//!        ramp-up (burst / paced) │ spawns
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!     ┌─────────┐           ┌─────────┐           ┌──────────┐
//!     │ Worker 0│  ...      │ Worker N│           │ Reporter │ 1/s
//!     └────┬────┘           └────┬────┘           └────┬─────┘
//!          │ handles[i % pool]   │                     │ drain + status
//!          ▼                     ▼                     ▼
//!     ┌──────────────────────────────┐       ┌───────────────────┐
//!     │ ConnectionPool (Backend × m) │       │ MetricsAggregator │
//!     └──────────────────────────────┘       └───────────────────┘
//! ```
//!
//! Workers record into the shared [`MetricsAggregator`]; the [`Reporter`]
//! drains it once per interval. Every loop polls the cancellation token at
//! the top of its iteration, so in-flight operations always complete.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod payload;
pub mod pool;
pub mod reporter;
pub mod worker;

pub use backend::{Backend, BackendStatus, Connector, HashField, OpCounters};
pub use config::{
    BackendKind, CallStyle, ConnectionParams, JitterRange, PayloadShape, RampUp, RunConfig,
    RuntimeTuning, DEFAULT_PACING_INTERVAL, DEFAULT_REPORT_INTERVAL,
};
pub use controller::{LoadController, RunSummary};
pub use error::{BackendError, ConfigError, LoadError};
pub use memory::{MemoryBackend, MemoryConnector, MemoryStore};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use pool::ConnectionPool;
pub use reporter::{IntervalReport, ReportHeader, Reporter, ReporterTotals};
pub use worker::{Worker, WorkerOutcome, WorkerSettings, WorkerState};
