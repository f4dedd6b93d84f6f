mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::{lookup::LookupCommands, report::ReportCommands, watch::WatchArgs};
use peer_flow::{ingestor::source::SnapshotSource, monitor::Monitor, settings::Settings};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "peer-flow",
    about = "Classify Lightning channels by forwarding flow and track running rebalances",
    version,
    author,
    after_help = r#"Configuration:
    Configuration can be provided via:
    1. Environment variables with PEER_FLOW__ prefix (e.g., PEER_FLOW__CLASSIFIER__SHARE_THRESHOLD_PCT)
    2. .env file in the current directory
    3. Config file with -c option (see config.example.toml)

Examples:
    # Channel buckets as tables
    peer-flow classify

    # Peer report as JSON
    peer-flow -c config.toml peers --format json-pretty

    # Running rebalances
    peer-flow jobs

    # Alert on unprofitable outbound peers every 10 minutes
    peer-flow watch --interval 10m"#
)]
pub struct Cli {
    /// Path to the configuration file (TOML format)
    ///
    /// If not provided, will attempt to load from environment variables
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Report(ReportCommands),
    #[command(flatten)]
    Lookup(LookupCommands),
    /// Periodically check for unprofitable outbound peers and broken rebalances
    Watch(WatchArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let settings = if let Some(config_path) = &self.config {
            Settings::from_path(config_path)?
        } else {
            Settings::from_env()?
        };
        init_logging(&settings.log_level)?;
        debug!("Loaded settings:\n{}", settings);

        let source = SnapshotSource::new(&settings.source.snapshot_path);
        let monitor = Monitor::new(settings, source);

        match self.command {
            Commands::Report(cmd) => cli::report::handle(&monitor, cmd),
            Commands::Lookup(cmd) => cli::lookup::handle(&monitor, cmd),
            Commands::Watch(args) => cli::watch::handle(monitor, args).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}

fn init_logging(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
