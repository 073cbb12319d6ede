//! ## lull-net::poll
//! **Readiness wait over a set of descriptors**
//!
//! [`poll`] is the single call site every component blocks on. It forwards
//! to the [`Poller`] installed on the calling thread, or to [`SystemPoller`]
//! (`poll(2)`) when none is installed. Installing is scoped by a
//! [`PollerGuard`], so an override never outlives the test that set it up
//! and never leaks into tests running on other threads.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Instant;

use bitflags::bitflags;
use lull_core::Timeout;
use tracing::trace;

bitflags! {
    /// Requested and returned readiness bits, in `poll(2)` encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollEvents: libc::c_short {
        const READABLE = libc::POLLIN;
        const PRIORITY = libc::POLLPRI;
        const WRITABLE = libc::POLLOUT;
        const ERROR = libc::POLLERR;
        const HANGUP = libc::POLLHUP;
        const INVALID = libc::POLLNVAL;
    }
}

/// One watched descriptor: what is requested and what came back.
///
/// Layout-compatible with `struct pollfd` so a slice can go straight to the
/// kernel.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct PollFd(libc::pollfd);

impl PollFd {
    pub const fn new(fd: RawFd, events: PollEvents) -> Self {
        Self(libc::pollfd {
            fd,
            events: events.bits(),
            revents: 0,
        })
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.0.fd
    }

    #[inline]
    pub fn events(&self) -> PollEvents {
        PollEvents::from_bits_retain(self.0.events)
    }

    #[inline]
    pub fn revents(&self) -> PollEvents {
        PollEvents::from_bits_retain(self.0.revents)
    }

    #[inline]
    pub fn set_revents(&mut self, revents: PollEvents) {
        self.0.revents = revents.bits();
    }

    /// Same descriptor and request, with `revents` replaced.
    #[must_use]
    pub fn with_revents(mut self, revents: PollEvents) -> Self {
        self.set_revents(revents);
        self
    }
}

impl PartialEq for PollFd {
    fn eq(&self, other: &Self) -> bool {
        self.0.fd == other.0.fd
            && self.0.events == other.0.events
            && self.0.revents == other.0.revents
    }
}

impl Eq for PollFd {}

impl fmt::Debug for PollFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollFd")
            .field("fd", &self.fd())
            .field("events", &self.events())
            .field("revents", &self.revents())
            .finish()
    }
}

/// A multiplexed readiness wait.
///
/// Blocks until at least one entry of `fds` is ready or `timeout` elapses,
/// fills in every entry's `revents` and returns how many entries are ready.
/// Zero means the timeout expired.
pub trait Poller {
    fn poll(&self, fds: &mut [PollFd], timeout: Timeout) -> io::Result<usize>;
}

/// `poll(2)`.
///
/// `EINTR` is retried with whatever is left of the timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPoller;

impl Poller for SystemPoller {
    fn poll(&self, fds: &mut [PollFd], timeout: Timeout) -> io::Result<usize> {
        let deadline = timeout.as_duration().map(|d| Instant::now() + d);
        let mut remaining = timeout;
        loop {
            // SAFETY: PollFd is repr(transparent) over pollfd and the
            // pointer/length pair comes from a live mutable slice.
            let ret = unsafe {
                libc::poll(
                    fds.as_mut_ptr().cast::<libc::pollfd>(),
                    fds.len() as libc::nfds_t,
                    remaining.to_poll_millis(),
                )
            };
            if ret >= 0 {
                return Ok(ret as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
            if let Some(deadline) = deadline {
                remaining = Timeout::from(deadline.saturating_duration_since(Instant::now()));
            }
            trace!(remaining = %remaining, "poll interrupted, retrying");
        }
    }
}

thread_local! {
    static INSTALLED: RefCell<Option<Rc<dyn Poller>>> = const { RefCell::new(None) };
}

/// Restores the previously installed poller when dropped.
#[must_use = "the poller is uninstalled as soon as the guard is dropped"]
pub struct PollerGuard {
    previous: Option<Rc<dyn Poller>>,
    // thread-local state, must be dropped on the installing thread
    _not_send: PhantomData<*const ()>,
}

impl Drop for PollerGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        INSTALLED.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Routes [`poll`] on the current thread to `poller` until the guard drops.
pub fn install<P: Poller + 'static>(poller: P) -> PollerGuard {
    let poller: Rc<dyn Poller> = Rc::new(poller);
    let previous = INSTALLED.with(|slot| slot.borrow_mut().replace(poller));
    PollerGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Waits for readiness on `fds` through the current thread's poller.
pub fn poll(fds: &mut [PollFd], timeout: Timeout) -> io::Result<usize> {
    trace!(nfds = fds.len(), timeout = %timeout, "poll");
    // cloned out so the slot is not borrowed while the poller runs
    let installed = INSTALLED.with(|slot| slot.borrow().clone());
    match installed {
        Some(poller) => poller.poll(fds, timeout),
        None => SystemPoller.poll(fds, timeout),
    }
}
