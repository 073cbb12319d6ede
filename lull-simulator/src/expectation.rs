//! Scripted poll calls.

use std::os::fd::RawFd;

use lull_core::Timeout;
use lull_net::{PollEvents, PollFd};

/// Events the code under test is expected to request for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Want {
    Nothing,
    Read,
    Write,
    ReadWrite,
}

impl From<Want> for PollEvents {
    fn from(want: Want) -> Self {
        match want {
            Want::Nothing => PollEvents::empty(),
            Want::Read => PollEvents::READABLE,
            Want::Write => PollEvents::WRITABLE,
            Want::ReadWrite => PollEvents::READABLE | PollEvents::WRITABLE,
        }
    }
}

/// Readiness handed back for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Got {
    Nothing,
    Read,
    Write,
    ReadWrite,
    Error,
}

impl From<Got> for PollEvents {
    fn from(got: Got) -> Self {
        match got {
            Got::Nothing => PollEvents::empty(),
            Got::Read => PollEvents::READABLE,
            Got::Write => PollEvents::WRITABLE,
            Got::ReadWrite => PollEvents::READABLE | PollEvents::WRITABLE,
            Got::Error => PollEvents::ERROR,
        }
    }
}

/// What the scripted call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    /// Number of ready descriptors.
    Ready(usize),
    /// Fails with this errno.
    Fail(i32),
}

/// One expected poll call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub timeout: Timeout,
    /// The exact array the caller must pass, `revents` zeroed.
    pub watched: Vec<PollFd>,
    /// The array written back to the caller.
    pub ready: Vec<PollFd>,
    pub result: Scripted,
}

impl Expectation {
    /// A call that succeeds. The ready count is the number of results that
    /// are not [`Got::Nothing`].
    ///
    /// # Panics
    /// If `watches` and `results` differ in length.
    pub fn ready(timeout: Timeout, watches: &[(RawFd, Want)], results: &[Got]) -> Self {
        assert_eq!(
            watches.len(),
            results.len(),
            "every watched descriptor needs exactly one scripted result"
        );
        let watched = watched(watches);
        let ready = watched
            .iter()
            .zip(results)
            .map(|(fd, got)| fd.with_revents((*got).into()))
            .collect();
        let count = results.iter().filter(|got| **got != Got::Nothing).count();
        Self {
            timeout,
            watched,
            ready,
            result: Scripted::Ready(count),
        }
    }

    /// A call that fails with `errno`. Every `revents` comes back empty.
    pub fn fail(timeout: Timeout, watches: &[(RawFd, Want)], errno: i32) -> Self {
        let watched = watched(watches);
        Self {
            timeout,
            ready: watched.clone(),
            watched,
            result: Scripted::Fail(errno),
        }
    }

    pub fn nfds(&self) -> usize {
        self.watched.len()
    }
}

fn watched(watches: &[(RawFd, Want)]) -> Vec<PollFd> {
    watches
        .iter()
        .map(|(fd, want)| PollFd::new(*fd, (*want).into()))
        .collect()
}
