//! # lull-net
//!
//! Descriptor-level networking for the `lull` platform layer.
//!
//! ### Key Submodules:
//! - `poll`: readiness wait over a set of descriptors, with a per-thread
//!   seam so tests can swap the kernel call for a scripted double
//! - `socket`: non-blocking TCP and socket-pair plumbing
//! - `event`: semaphore counter used for cross-thread wakeups
//!
//! Fallible calls return `std::io::Result` with the OS error attached.

pub mod event;
pub mod poll;
pub mod socket;

pub mod prelude {
    pub use crate::event::*;
    pub use crate::poll::*;
    pub use crate::socket::*;
}

pub use event::EventFd;
pub use poll::{install, poll, PollEvents, PollFd, Poller, PollerGuard, SystemPoller};
pub use socket::Connect;
