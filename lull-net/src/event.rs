//! ## lull-net::event
//! **Semaphore counter for cross-thread wakeups**
//!
//! A non-blocking `eventfd` in semaphore mode: every [`EventFd::post`] adds
//! to the counter and every successful [`EventFd::try_take`] removes one.
//! The descriptor is readable while the counter is non-zero, so it can sit
//! in the same poll set as sockets and timers.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

#[derive(Debug)]
pub struct EventFd {
    fd: OwnedFd,
}

impl EventFd {
    pub fn new() -> io::Result<Self> {
        // SAFETY: no pointers are passed.
        let fd = unsafe {
            libc::eventfd(
                0,
                libc::EFD_NONBLOCK | libc::EFD_SEMAPHORE | libc::EFD_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd was just returned by eventfd(2) and nothing else owns it.
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Adds `count` to the counter.
    pub fn post(&self, count: u64) -> io::Result<()> {
        let buf = count.to_ne_bytes();
        // SAFETY: buf is 8 live bytes, the size eventfd expects.
        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if ret == buf.len() as isize {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Takes one from the counter, `None` when it is zero.
    pub fn try_take(&self) -> io::Result<Option<u64>> {
        let mut buf = [0u8; 8];
        // SAFETY: buf is 8 writable bytes, the size eventfd expects.
        let ret = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if ret == buf.len() as isize {
            return Ok(Some(u64::from_ne_bytes(buf)));
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            Ok(None)
        } else {
            Err(err)
        }
    }
}

impl AsFd for EventFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for EventFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
