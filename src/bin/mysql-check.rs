//! mysql-check - one-shot MySQL health check.
//!
//! Runs every enabled collector once, prints the report and exits with
//! 0 (OK), 1 (WARN) or 2 (CRITICAL). Exit code 3 means the check could not
//! run at all.

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
use tracing::{error, warn};

use mysql_inspector::collector::CollectorRegistry;
use mysql_inspector::config::{
    ConfigError, ConnectionArgs, InspectorConfig, OutputFormat, parse_secs,
};
use mysql_inspector::inspector::check_once;
use mysql_inspector::report::stdout_sink;
use mysql_inspector::source::{MetricSource, MysqlSource};
use mysql_inspector::util::init_logging;

const EXIT_STARTUP: u8 = 3;

/// One-shot MySQL health check.
#[derive(Parser)]
#[command(name = "mysql-check", about = "One-shot MySQL health check", version)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// JSON config file; flags override its values.
    #[arg(short, long, env = "MYSQL_INSPECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between the two samples of rate collectors.
    #[arg(long, value_parser = parse_secs)]
    period: Option<Duration>,

    /// Skip rate collectors (no sampling wait).
    #[arg(long)]
    no_periodic: bool,

    /// Overall deadline in seconds.
    #[arg(long, value_parser = parse_secs)]
    timeout: Option<Duration>,

    /// Collectors to disable (repeatable).
    #[arg(long = "disable", value_name = "COLLECTOR")]
    disabled: Vec<String>,

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
        if let Some(period) = self.period {
            config.period = period;
        }
        if self.no_periodic {
            config.run_periodic = false;
        }
        if let Some(timeout) = self.timeout {
            config.total_timeout = timeout;
        }
        for name in &self.disabled {
            config.collectors.set(name, false);
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
    init_logging(args.verbose, args.quiet, &["mysql_inspector", "mysql_check"]);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::from(EXIT_STARTUP);
        }
    };

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
    let source = match MysqlSource::open(&config.connection, config.timeouts.auxiliary).await {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "cannot connect to MySQL");
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    let source: Arc<dyn MetricSource> = Arc::new(source);
    let registry = CollectorRegistry::with_defaults(&config.thresholds);

    let result = match check_once(source, &registry, &config).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "health check failed");
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    if let Err(e) = stdout_sink(config.output).emit(&result) {
        warn!(error = %e, "failed to write report");
    }

    ExitCode::from(result.overall.exit_code())
}
