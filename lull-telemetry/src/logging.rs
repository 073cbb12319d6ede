//! ## lull-telemetry::logging
//! **Subscriber setup driven by [`TelemetryConfig`]**
//!
//! `RUST_LOG` wins when set and valid. Otherwise the configured
//! `log_level` is used as the filter.
//!
//! ### Future:
//! - per-crate levels in the config file

use lull_config::TelemetryConfig;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install log subscriber: {0}")]
    Init(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let builder = fmt()
        .with_env_filter(filter(&config.log_level))
        .with_thread_names(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(TelemetryError::Init)?;

    debug!(level = %config.log_level, json = config.json, "logging initialised");
    Ok(())
}

fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}
