//! ## idlewatch
//! Replay position scenarios through the pause detector and inspect the
//! effective configuration.

use clap::Parser;
use idlewatch_telemetry::logging::EventLogger;

mod commands;
mod error;
mod scenario;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_ref())?;
    EventLogger::init(&config.telemetry.log_level);

    commands::run_command(cli, config).await?;
    Ok(())
}
