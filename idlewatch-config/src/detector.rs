//! Sliding window parameters for the pause detector.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Trailing window length, 15 minutes.
pub const DEFAULT_WINDOW_SPAN_SECS: u64 = 15 * 60;
/// Speeds strictly below this count as paused.
pub const DEFAULT_SPEED_THRESHOLD: f64 = 5.0;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Length of the trailing window (seconds).
    #[validate(range(min = 60, max = 86_400))]
    #[serde(default = "default_window_span_secs")]
    pub window_span_secs: u64,

    /// Speed below which a sample counts as paused.
    #[validate(range(min = 0.0, max = 1_000.0))]
    #[serde(default = "default_speed_threshold")]
    pub speed_threshold: f64,

    /// Percent of the window used for devices without their own
    /// `ignitionDuringPausePercent` attribute. Zero disables them.
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default)]
    pub default_percent: f64,

    /// Drop windows that saw no sample for this long (seconds). Zero keeps
    /// them for the process lifetime.
    #[serde(default)]
    pub idle_reap_secs: u64,
}

fn default_window_span_secs() -> u64 {
    DEFAULT_WINDOW_SPAN_SECS
}

fn default_speed_threshold() -> f64 {
    DEFAULT_SPEED_THRESHOLD
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_span_secs: default_window_span_secs(),
            speed_threshold: default_speed_threshold(),
            default_percent: 0.0,
            idle_reap_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_default_detector_config() {
        let config = DetectorConfig::default();
        config.validate().expect("Default config should be valid");
        assert_eq!(config.window_span_secs, 900);
        assert_eq!(config.speed_threshold, 5.0);
    }

    #[test]
    fn percent_above_hundred_is_invalid() {
        let config = DetectorConfig {
            default_percent: 120.0,
            ..DetectorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_speed_threshold_is_invalid() {
        let config = DetectorConfig {
            speed_threshold: -1.0,
            ..DetectorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
