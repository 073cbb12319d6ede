//! # lull-telemetry
//!
//! Installs the process-wide `tracing` subscriber for the `lull` binaries.
//! Library crates only emit events and never call into this crate.

pub mod logging;

pub use logging::{init, TelemetryError};
