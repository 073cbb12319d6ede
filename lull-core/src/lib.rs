//! # lull-core
//!
//! Foundation layer shared by every `lull` crate: the timeout representation
//! handed to poll and timer calls, the kernel time spec it converts into, and
//! the blocking sleep built on top of it.
//!
//! ### Key Submodules:
//! - `time`: `Timeout` value object, `TimeSpec` and `sleep`
//! - `error`: crate-level error type
//!
//! ### Future:
//! - `CLOCK_BOOTTIME` aware deadlines

pub mod error;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::time::*;
}

pub use error::CoreError;
pub use time::{sleep, TimeSpec, Timeout};
