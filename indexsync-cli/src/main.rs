//! indexsync command-line entry point
//!
//! Usage:
//!   indexsync --config indexsync.json discover-attributes --attributes attributes.json
//!   indexsync --config indexsync.json sync-attributes --attributes attributes.json
//!
//! Intended to be driven by the host's cron: `schedule` queues a run, the
//! other subcommands each execute one job and exit.

use anyhow::Result;
use clap::Parser;
use indexsync_cli::{Cli, Runner};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!(command = ?cli.command, config = %cli.config.display(), "starting");
    let runner = Runner::open(&cli.config, &cli.data_dir)?;
    let mut stdout = std::io::stdout().lock();
    runner.run(&cli.command, &mut stdout).await
}
