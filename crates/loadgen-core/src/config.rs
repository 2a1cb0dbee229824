//! Run configuration resolved once at startup.

use crate::error::ConfigError;
use serde::Serialize;
use std::time::Duration;

/// Default delay between worker creations in paced mode.
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_secs(1);

/// Default reporting cadence.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// How workers are brought up at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RampUp {
    /// All workers scheduled at once.
    Burst,
    /// Workers scheduled one at a time, `interval` apart.
    Paced { interval: Duration },
}

impl std::fmt::Display for RampUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RampUp::Burst => write!(f, "burst"),
            RampUp::Paced { interval } => write!(f, "paced({}ms)", interval.as_millis()),
        }
    }
}

/// Which backend implementation a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One multiplexed connection per pool handle, shared by its workers.
    Multiplexed,
    /// A set of blocking connections per pool handle, checked out per operation.
    Pooled,
    /// In-process hash map; no network.
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Multiplexed => write!(f, "multiplexed"),
            BackendKind::Pooled => write!(f, "pooled"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiplexed" | "mux" => Ok(BackendKind::Multiplexed),
            "pooled" | "pool" => Ok(BackendKind::Pooled),
            "memory" | "mem" => Ok(BackendKind::Memory),
            _ => Err(ConfigError::Invalid(format!(
                "unknown backend '{s}', expected one of: multiplexed, pooled, memory"
            ))),
        }
    }
}

/// How a backend issues its calls from inside a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStyle {
    /// Await the asynchronous call.
    #[default]
    Await,
    /// Issue the asynchronous call and block the worker thread on its result.
    BlockingWait,
}

impl std::fmt::Display for CallStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStyle::Await => write!(f, "await"),
            CallStyle::BlockingWait => write!(f, "blocking-wait"),
        }
    }
}

/// Shape of the hash written on every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayloadShape {
    /// Number of fields in the hash.
    pub field_count: usize,
    /// Byte length of each field value.
    pub field_size: usize,
}

impl PayloadShape {
    pub fn total_bytes(&self) -> usize {
        self.field_count * self.field_size
    }
}

/// Sizing hints for the async runtime the workers run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeTuning {
    /// Core worker threads.
    pub worker_threads: usize,
    /// Upper bound on the blocking (I/O) thread pool.
    pub io_threads: usize,
}

impl Default for RuntimeTuning {
    fn default() -> Self {
        Self {
            worker_threads: 24,
            io_threads: 24,
        }
    }
}

/// Where and how backends connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionParams {
    pub url: String,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1/".to_string(),
            connect_timeout: Duration::from_millis(5000),
            response_timeout: Duration::from_millis(5000),
        }
    }
}

/// Half-open range `[min, max)` the per-iteration jitter sleep is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JitterRange {
    pub min: Duration,
    pub max: Duration,
}

impl Default for JitterRange {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1),
            max: Duration::from_millis(20),
        }
    }
}

impl JitterRange {
    /// Draw one jitter delay, uniformly from the range.
    pub fn sample(&self) -> Duration {
        use rand::Rng;

        let min = self.min.as_micros() as u64;
        let max = self.max.as_micros() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_micros(rand::rng().random_range(min..max))
    }
}

/// Immutable configuration for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    /// Number of workers to create.
    pub app_threads: usize,
    pub ramp_up: RampUp,
    /// Per-worker request cap; 0 runs until the timeout fires.
    pub requests_per_worker: u64,
    /// Total wall-clock duration of the run.
    pub timeout: Duration,
    pub payload: PayloadShape,
    pub key_name: String,
    /// Number of backend handles created up front.
    pub pool_size: usize,
    pub backend: BackendKind,
    pub call_style: CallStyle,
    /// Connection depth of each pooled-backend handle.
    pub pooled_connections: usize,
    pub tuning: RuntimeTuning,
    pub connection: ConnectionParams,
    pub report_interval: Duration,
    pub jitter: JitterRange,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            app_threads: 24,
            ramp_up: RampUp::Paced {
                interval: DEFAULT_PACING_INTERVAL,
            },
            requests_per_worker: 100_000,
            timeout: Duration::from_secs(10 * 60),
            payload: PayloadShape {
                field_count: 15,
                field_size: 128,
            },
            key_name: "key".to_string(),
            pool_size: 1,
            backend: BackendKind::Multiplexed,
            call_style: CallStyle::Await,
            pooled_connections: 10,
            tuning: RuntimeTuning::default(),
            connection: ConnectionParams::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            jitter: JitterRange::default(),
        }
    }
}

impl RunConfig {
    /// Check value ranges and option combinations before anything touches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::OutOfRange {
                option: "mux_count",
                reason: "at least one backend handle is required".to_string(),
            });
        }
        if self.payload.field_count == 0 {
            return Err(ConfigError::OutOfRange {
                option: "hash_size",
                reason: "a hash write needs at least one field".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                option: "time_out",
                reason: "the run duration must be positive".to_string(),
            });
        }
        if self.key_name.is_empty() {
            return Err(ConfigError::OutOfRange {
                option: "key_name",
                reason: "the target key cannot be empty".to_string(),
            });
        }
        if self.tuning.worker_threads == 0 {
            return Err(ConfigError::OutOfRange {
                option: "worker_threads",
                reason: "the runtime needs at least one worker thread".to_string(),
            });
        }
        if self.tuning.io_threads == 0 {
            return Err(ConfigError::OutOfRange {
                option: "io_threads",
                reason: "the runtime needs at least one blocking thread".to_string(),
            });
        }
        if self.pooled_connections == 0 {
            return Err(ConfigError::OutOfRange {
                option: "pooled_connections",
                reason: "each pooled handle needs at least one connection".to_string(),
            });
        }
        if let RampUp::Paced { interval } = self.ramp_up {
            if interval.is_zero() {
                return Err(ConfigError::OutOfRange {
                    option: "pacing_ms",
                    reason: "paced ramp-up needs a positive interval, use burst mode instead"
                        .to_string(),
                });
            }
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                option: "report_interval",
                reason: "the reporting cadence must be positive".to_string(),
            });
        }
        if self.jitter.min >= self.jitter.max {
            return Err(ConfigError::Invalid(format!(
                "jitter range [{:?}, {:?}) is empty",
                self.jitter.min, self.jitter.max
            )));
        }
        if self.backend == BackendKind::Pooled && self.call_style == CallStyle::BlockingWait {
            return Err(ConfigError::Incompatible(
                "the pooled backend already issues blocking calls; --async / --call_style blocking-wait only applies to the multiplexed backend"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
