//! Logging configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[validate(custom(function = validation::validate_log_level))]
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}
