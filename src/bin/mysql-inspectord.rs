//! mysql-inspectord - periodic MySQL health inspector.
//!
//! Captures snapshots on one cadence and runs the collectors on another,
//! emitting each inspection pass to stdout until interrupted.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use mysql_inspector::VERSION;
use mysql_inspector::collector::CollectorRegistry;
use mysql_inspector::config::{
    ConfigError, ConnectionArgs, InspectorConfig, OutputFormat, parse_secs,
};
use mysql_inspector::inspector::Inspector;
use mysql_inspector::report::stdout_sink;
use mysql_inspector::source::{MetricSource, MysqlSource};
use mysql_inspector::storage::SnapshotStore;
use mysql_inspector::util::init_logging;

/// Startup failures (bad config, unreachable server).
const EXIT_STARTUP: u8 = 2;

/// Periodic MySQL health inspector.
#[derive(Parser)]
#[command(name = "mysql-inspectord", about = "Periodic MySQL health inspector", version)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// JSON config file; flags override its values.
    #[arg(short, long, env = "MYSQL_INSPECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between snapshot captures.
    #[arg(long, value_parser = parse_secs)]
    capture_interval: Option<Duration>,

    /// Seconds between inspection passes.
    #[arg(long, value_parser = parse_secs)]
    inspect_interval: Option<Duration>,

    /// Snapshots kept in memory (at least 2).
    #[arg(long)]
    max_snapshots: Option<usize>,

    /// Report format.
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn into_config(self) -> Result<InspectorConfig, ConfigError> {
        let mut config = InspectorConfig::load(self.config.as_deref())?;
        self.connection.apply(&mut config.connection);
        if let Some(every) = self.capture_interval {
            config.capture_interval = every;
        }
        if let Some(every) = self.inspect_interval {
            config.inspect_interval = every;
        }
        if let Some(max) = self.max_snapshots {
            config.max_snapshots = max;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(
        args.verbose,
        args.quiet,
        &["mysql_inspector", "mysql_inspectord"],
    );

    info!("mysql-inspectord {} starting", VERSION);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    info!(
        host = %config.connection.host,
        port = config.connection.port,
        capture_interval_s = config.capture_interval.as_secs_f64(),
        inspect_interval_s = config.inspect_interval.as_secs_f64(),
        max_snapshots = config.max_snapshots,
        "config loaded"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: InspectorConfig) -> ExitCode {
    // Setup signal handler before anything can block.
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    }) {
        error!(error = %e, "failed to install signal handler");
        return ExitCode::from(EXIT_STARTUP);
    }

    let source = match MysqlSource::open(&config.connection, config.timeouts.auxiliary).await {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "cannot connect to MySQL");
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    info!(endpoint = source.endpoint(), "connected");

    let source: Arc<dyn MetricSource> = Arc::new(source);
    let store = SnapshotStore::new(source, config.timeouts, config.max_snapshots)
        .with_replica_status(config.collectors.is_enabled("replication"))
        .with_server_variables(config.collectors.is_enabled("slow_query"));
    let registry = CollectorRegistry::with_defaults(&config.thresholds);
    info!(collectors = ?registry.names(), "collectors registered");

    let inspector = Inspector::new(
        Arc::new(store),
        registry,
        stdout_sink(config.output),
        &config,
    );
    if let Err(e) = inspector
        .start(config.capture_interval, config.inspect_interval)
        .await
    {
        error!(error = %e, "inspector failed to start");
        return ExitCode::from(EXIT_STARTUP);
    }

    if shutdown_rx.recv().await.is_none() {
        warn!("signal channel closed");
    }
    info!("received shutdown signal");
    inspector.stop().await;

    info!("mysql-inspectord stopped");
    ExitCode::SUCCESS
}
