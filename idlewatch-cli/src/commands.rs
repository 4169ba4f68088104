use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use idlewatch_config::IdlewatchConfig;
use idlewatch_detection::DetectorSettings;
use idlewatch_telemetry::MetricsRecorder;

use crate::error::CliError;
use crate::scenario::{Replay, Scenario};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to the layered `config/` lookup
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Feed a scenario file through the detector and print the events
    Replay(ReplayArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    #[arg(short, long)]
    pub scenario: PathBuf,
    /// Worker threads; a device always stays on the same worker
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
    /// Print Prometheus metrics after the replay
    #[arg(long)]
    pub metrics: bool,
}

pub fn load_config(path: Option<&PathBuf>) -> Result<IdlewatchConfig, CliError> {
    let config = match path {
        Some(path) => IdlewatchConfig::load_from_path(path)?,
        None => IdlewatchConfig::load()?,
    };
    Ok(config)
}

pub async fn run_command(cli: Cli, config: IdlewatchConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Replay(args) => run_replay(args, config).await,
        Commands::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

async fn run_replay(args: ReplayArgs, config: IdlewatchConfig) -> Result<(), CliError> {
    let scenario = Scenario::load(&args.scenario)?;
    info!(
        devices = scenario.devices.len(),
        positions = scenario.positions.len(),
        "Loaded scenario {}",
        args.scenario.display()
    );

    let metrics = Arc::new(MetricsRecorder::new()?);
    let replay = Replay::new(
        DetectorSettings::from(&config.detector),
        config.detector.default_percent,
        args.workers,
        metrics.clone(),
    );
    let report = replay.run(scenario).await?;

    for event in &report.events {
        println!(
            "{}\tdevice={}\tposition={}",
            event.kind, event.device_id, event.sample_id
        );
    }
    println!(
        "positions={} events={} failures={} reaped={}",
        report.positions,
        report.events.len(),
        report.failures,
        report.reaped
    );
    if args.metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}
