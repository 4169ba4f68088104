use std::path::PathBuf;

use thiserror::Error;
use tokio::task::JoinError;

use idlewatch_config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot read scenario {path}: {source}")]
    ScenarioIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario: {0}")]
    ScenarioFormat(#[from] serde_yaml::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Replay worker failed: {0}")]
    Worker(#[from] JoinError),
}
