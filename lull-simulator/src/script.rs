//! Ordered poll script and its per-test session.

use std::collections::VecDeque;
use std::io;
use std::ops::Deref;
use std::os::fd::RawFd;
use std::sync::Arc;

use lull_core::Timeout;
use lull_net::{PollFd, Poller, PollerGuard};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::expectation::{Expectation, Got, Scripted, Want};

/// FIFO of expected poll calls.
///
/// Cloning gives another handle to the same queue, so a test can keep one
/// handle while another is installed as the thread's poller.
#[derive(Debug, Clone, Default)]
pub struct PollScript {
    queue: Arc<Mutex<VecDeque<Expectation>>>,
}

impl PollScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `expectation` to the tail and hands back a copy for
    /// inspection.
    pub fn expect(&self, expectation: Expectation) -> Expectation {
        self.queue.lock().push_back(expectation.clone());
        expectation
    }

    /// See [`Expectation::ready`].
    pub fn expect_ready(
        &self,
        timeout: Timeout,
        watches: &[(RawFd, Want)],
        results: &[Got],
    ) -> Expectation {
        self.expect(Expectation::ready(timeout, watches, results))
    }

    /// See [`Expectation::fail`].
    pub fn expect_fail(&self, timeout: Timeout, watches: &[(RawFd, Want)], errno: i32) -> Expectation {
        self.expect(Expectation::fail(timeout, watches, errno))
    }

    /// Expectations not consumed yet.
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }

    /// Asserts every scripted call happened.
    ///
    /// # Panics
    /// If expectations are left over.
    pub fn verify(&self) {
        let remaining = self.remaining();
        assert!(
            remaining == 0,
            "poll called fewer times than expected ({remaining} scripted call(s) never happened)"
        );
    }

    /// Drops whatever is left without asserting. Returns how many were
    /// discarded.
    pub fn cleanup(&self) -> usize {
        let mut queue = self.queue.lock();
        let discarded = queue.len();
        queue.clear();
        discarded
    }

    /// Routes [`lull_net::poll`] on this thread to the script until the
    /// session drops.
    pub fn install(&self) -> Session {
        Session {
            _guard: lull_net::install(self.clone()),
            script: self.clone(),
        }
    }
}

impl Poller for PollScript {
    /// Consumes the head expectation.
    ///
    /// # Panics
    /// If the script is empty, or the call differs from the head in
    /// descriptor count, timeout or descriptor array. A mismatched head is
    /// left in place.
    fn poll(&self, fds: &mut [PollFd], timeout: Timeout) -> io::Result<usize> {
        let mut queue = self.queue.lock();
        let Some(head) = queue.front() else {
            panic!(
                "poll called more times than expected (unscripted call with {} fd(s), timeout {timeout})",
                fds.len()
            );
        };
        assert_eq!(
            fds.len(),
            head.nfds(),
            "poll descriptor count mismatch: expected {:?}, got {:?}",
            head.watched,
            fds
        );
        assert_eq!(
            timeout.as_nanos(),
            head.timeout.as_nanos(),
            "poll timeout mismatch: expected {}, got {timeout}",
            head.timeout
        );
        assert_eq!(
            &*fds, &head.watched[..],
            "poll descriptor array mismatch (expected on the right)"
        );

        let Some(head) = queue.pop_front() else {
            unreachable!("head was just inspected under the same lock");
        };
        drop(queue);

        fds.copy_from_slice(&head.ready);
        trace!(nfds = fds.len(), timeout = %timeout, result = ?head.result, "consumed poll expectation");
        match head.result {
            Scripted::Ready(count) => Ok(count),
            Scripted::Fail(errno) => Err(io::Error::from_raw_os_error(errno)),
        }
    }
}

/// A script installed as the current thread's poller.
///
/// Dropping the session uninstalls the script and discards anything left,
/// so a failed test does not leak scripted calls into the next one.
#[must_use = "the script is uninstalled as soon as the session is dropped"]
pub struct Session {
    script: PollScript,
    // dropped after `Drop::drop`, restoring the previous poller
    _guard: PollerGuard,
}

impl Session {
    pub fn script(&self) -> &PollScript {
        &self.script
    }

    /// Asserts every scripted call happened, then tears the session down.
    pub fn verify(self) {
        self.script.verify();
    }
}

impl Deref for Session {
    type Target = PollScript;

    fn deref(&self) -> &PollScript {
        &self.script
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let discarded = self.script.cleanup();
        if discarded > 0 {
            warn!(discarded, "discarding unconsumed poll expectations");
        }
    }
}
