use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing::{error, info};

use release_watch::config::Config;
use release_watch::error::ConfigError;
use release_watch::logging;
use release_watch::metrics::PrometheusMetrics;
use release_watch::notify::{LogNotifier, LogWebHookSender};
use release_watch::service::http::{DEFAULT_GITHUB_API, HttpQuerier};
use release_watch::service::track::Tracker;

#[derive(Parser)]
#[command(name = "release-watch")]
#[command(version, about = "Watch services for new releases and deployed-version changes")]
struct Cli {
    /// Config file to load
    #[arg(long = "config.file", default_value = "config.yml")]
    config_file: PathBuf,

    /// ERROR, WARN, INFO, VERBOSE or DEBUG
    #[arg(long = "log.level")]
    log_level: Option<String>,

    /// Prefix log lines with timestamps
    #[arg(long = "log.timestamps")]
    log_timestamps: Option<bool>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the config and exit
    Check,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config_file)?;
    config.settings.from_flags.level = cli.log_level;
    config.settings.from_flags.timestamps = cli.log_timestamps;
    logging::init(&config.settings)?;

    if let Err(errs) = config.check_values() {
        eprintln!("{}", ConfigError::Invalid(errs));
        return Ok(ExitCode::FAILURE);
    }

    match cli.command {
        Some(Command::Check) => {
            info!("{:?} is valid", cli.config_file);
            Ok(ExitCode::SUCCESS)
        }
        None => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(run(config)),
    }
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    let querier = Arc::new(HttpQuerier::new(DEFAULT_GITHUB_API)?);
    let metrics = Arc::new(PrometheusMetrics::new()?);

    let tracker = Arc::new(
        Tracker::new(
            querier.clone(),
            querier,
            Arc::new(LogWebHookSender),
            metrics.clone(),
        )
        .with_notifier(Arc::new(LogNotifier)),
    );

    let services = config.into_services();
    info!("Tracking {} services", services.len());
    let handles = tracker.track_all(services);

    tokio::select! {
        _ = join_all(handles) => error!("All tracking tasks stopped"),
        result = tokio::signal::ctrl_c() => result?,
    }

    match metrics.encode_text() {
        Ok(text) => info!("Final metrics:\n{}", text),
        Err(e) => error!("{}", e),
    }
    Ok(ExitCode::SUCCESS)
}
