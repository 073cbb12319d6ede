//! ## lull-cli
//! **Operator tool for the `lull` platform layer**
//!
//! Sleeps, drives a kernel timer for a number of ticks, or probes a TCP
//! port with a non-blocking connect. Handy for checking clock behaviour
//! and timeouts on a target machine.
//!
//! ### Future:
//! - IPv6 probes

use anyhow::Context;
use clap::Parser;
use lull_config::LullConfig;

mod commands;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LullConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LullConfig::load()?,
    };
    lull_telemetry::init(&config.telemetry)?;

    commands::run_command(cli.command, &config)
}
