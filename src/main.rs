//! # Bosmix: Ordinal Data with the BOS Model
//!
//! ## Usage
//! ```bash
//! # Learn parameters and impute
//! bosmix --data answers.txt --out run1
//!
//! # Impute with learned parameters
//! bosmix --data new.txt --params run1.params.tsv --out run2
//!
//! # With profiling output
//! bosmix --data answers.txt --out run1 --profile
//! ```

use std::time::Instant;

use anyhow::Context;

use bosmix::config::Config;
use bosmix::pipelines::AnalysisPipeline;
use bosmix::utils::telemetry::{HeartbeatConfig, HeartbeatHandle, Stage, TelemetryBlackboard};
use bosmix::utils::threading::init_global_pool;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber for hierarchical profiling output
fn init_profiling() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_timer(fmt::time::uptime()),
        )
        .init();
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> anyhow::Result<()> {
    let start = Instant::now();

    let config = Config::parse_and_validate().context("invalid configuration")?;

    if config.profile {
        init_profiling();
        eprintln!("=== Profiling enabled ===\n");
    } else {
        init_logging();
    }

    let n_threads = config.nthreads();
    init_global_pool(n_threads);

    eprintln!("Bosmix v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Threads: {}", n_threads);

    let telemetry = TelemetryBlackboard::new();
    let heartbeat = HeartbeatHandle::spawn(telemetry.clone(), HeartbeatConfig::default())
        .context("failed to start heartbeat thread")?;

    telemetry.set_stage(Stage::LoadingData);

    if config.is_prediction_mode() {
        eprintln!("Mode: Prediction");
    } else {
        eprintln!("Mode: Learning");
    }
    eprintln!("Input: {:?}", config.data);

    let data_path = config.data.clone();
    let mut pipeline = AnalysisPipeline::new(config, Some(telemetry.clone()));
    pipeline
        .run()
        .with_context(|| format!("run on {:?} failed", data_path))?;

    telemetry.set_stage(Stage::Complete);
    heartbeat.shutdown();

    let elapsed = start.elapsed();
    eprintln!("\nCompleted in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
