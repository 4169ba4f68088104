//! # idlewatch configuration
//!
//! Layered configuration for the pause detector and its binary.
//!
//! Hierarchy, later layers win:
//! 1. Default values
//! 2. `config/idlewatch.yaml`
//! 3. `config/<IDLEWATCH_ENV>.yaml`
//! 4. `IDLEWATCH_*` environment variables, nested with `__`

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

mod detector;
mod error;
mod telemetry;
mod validation;

pub use detector::DetectorConfig;
pub use detector::{DEFAULT_SPEED_THRESHOLD, DEFAULT_WINDOW_SPAN_SECS};
pub use error::ConfigError;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/idlewatch.yaml";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct IdlewatchConfig {
    /// Sliding window and threshold parameters.
    #[validate(nested)]
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Logging parameters.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl IdlewatchConfig {
    /// Load configuration from the default files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(IdlewatchConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            debug!("{BASE_FILE} not found, using default configuration");
        }

        let env = std::env::var("IDLEWATCH_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, still honouring the environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment = Figment::from(Serialized::defaults(IdlewatchConfig::default()))
            .merge(Yaml::file(path));
        Self::extract(figment)
    }

    /// Render the effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::from)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed("IDLEWATCH_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
