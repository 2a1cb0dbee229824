//! Command-line interface for redis-loadgen
//!
//! Parses the options, echoes them as JSON, then runs one time-boxed
//! benchmark on a runtime sized by `--worker_threads` / `--io_threads`.
//! Report lines go to stdout, logs to stderr.

use anyhow::Context;
use clap::Parser;
use loadgen_core::{BackendKind, LoadController, MemoryConnector, RunConfig, RunSummary};
use loadgen_redis::RedisConnector;
use redis_loadgen::{runtime, Options, PROFILE_DELAY};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options::parse();
    println!(
        "{}",
        serde_json::to_string_pretty(&options).context("Failed to render options")?
    );

    let config = options.to_run_config();
    config.validate().context("Invalid options")?;
    debug!(
        "Resolved run configuration: {}",
        serde_json::to_string(&config).context("Failed to render run configuration")?
    );

    if options.profile {
        println!(
            "Waiting {}s for a profiler to attach to process {}",
            PROFILE_DELAY.as_secs(),
            std::process::id()
        );
        std::thread::sleep(PROFILE_DELAY);
    }

    let runtime = runtime::build(&config.tuning).context("Failed to build async runtime")?;
    let summary = runtime.block_on(execute(config))?;

    let mean = summary
        .total
        .mean_latency_ms()
        .map(|ms| format!("{ms:.3}ms"))
        .unwrap_or_else(|| "n/a".to_string());
    info!(
        "Completed {} request(s) over {} report(s), mean latency {mean}",
        summary.total.operation_count, summary.reports
    );
    Ok(())
}

async fn execute(config: RunConfig) -> anyhow::Result<RunSummary> {
    let backend = config.backend;
    let controller = LoadController::new(config);

    let summary = match backend {
        BackendKind::Memory => controller.run(&MemoryConnector::new()).await,
        BackendKind::Multiplexed | BackendKind::Pooled => {
            let connector = RedisConnector::from_config(controller.config())?;
            controller.run(&connector).await
        }
    };
    summary.with_context(|| format!("Load run against the {backend} backend failed"))
}
