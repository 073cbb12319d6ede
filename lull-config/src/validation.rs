//! Custom validation functions shared by the config sections.

use lull_core::Timeout;
use validator::ValidationError;

/// A period must be finite and positive.
pub fn validate_period(period: &Timeout) -> Result<(), ValidationError> {
    if period.as_nanos() > 0 {
        Ok(())
    } else {
        Err(ValidationError::new("period_must_be_bounded"))
    }
}

/// Log level understood by `tracing`.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_ascii_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
