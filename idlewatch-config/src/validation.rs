//! Custom validation functions for configuration.

use validator::ValidationError;

/// Validate a `tracing` level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
