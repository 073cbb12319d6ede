//! # lull-timer
//! **Kernel countdown/interval timer backed by `timerfd`**
//!
//! A [`Timer`] owns exactly one timer descriptor. It is armed as a oneshot or
//! a periodic interval, and the kernel accumulates expirations until
//! [`Timer::ack`] consumes them. Readiness checks go through
//! [`lull_net::poll`], so a scripted poller installed on the test thread
//! drives [`Timer::is_ready`] and [`Timer::wait_ready`] deterministically.
//!
//! ```text
//! new() ──> Disarmed <──stop()── Oneshot | Periodic
//!              │                      ▲
//!              └──start_oneshot()─────┤
//!              └──start_periodic()────┘
//! ```
//!
//! Dropping the timer closes the descriptor.
//!
//! The kernel zeroes its expiration count whenever a timer is re-armed or
//! disarmed. `Timer` drains the count first and carries it until the next
//! ack, so stopping or re-arming never loses an unacknowledged expiration.
//!
//! ### Failure model
//! - creation failure is returned as [`TimerError::Create`]; callers at
//!   startup usually cannot go on without the timer
//! - arm/disarm failure means the descriptor is invalid, which is a bug in
//!   the caller, so those calls panic
//! - a wait timing out is an ordinary [`Wait::TimedOut`]

use std::cell::Cell;
use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

use lull_core::{TimeSpec, Timeout};
use lull_net::{poll, PollEvents, PollFd};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, trace};

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Failed to create timer: {0}")]
    Create(#[source] io::Error),

    #[error("Timer poll failed: {0}")]
    Poll(#[source] io::Error),

    #[error("Timer descriptor reported {0:?}")]
    Descriptor(PollEvents),
}

/// Clock a timer counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockId {
    #[default]
    Monotonic,
    Realtime,
    /// Monotonic, but keeps counting while the system is suspended.
    Boottime,
}

impl ClockId {
    fn raw(self) -> libc::clockid_t {
        match self {
            ClockId::Monotonic => libc::CLOCK_MONOTONIC,
            ClockId::Realtime => libc::CLOCK_REALTIME,
            ClockId::Boottime => libc::CLOCK_BOOTTIME,
        }
    }
}

/// Result of waiting for an expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Ready,
    TimedOut,
}

impl Wait {
    /// `1` for ready, `0` for timed out.
    pub fn code(self) -> i32 {
        match self {
            Wait::Ready => 1,
            Wait::TimedOut => 0,
        }
    }
}

/// Tri-state code for a wait result: `1` ready, `0` timed out, `-1` error.
pub fn wait_code(result: &Result<Wait, TimerError>) -> i32 {
    result.as_ref().map_or(-1, |wait| wait.code())
}

/// Kernel-held arm state, as read back from the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    Disarmed,
    Oneshot { remaining: Timeout },
    Periodic { remaining: Timeout, interval: Timeout },
}

#[derive(Debug)]
pub struct Timer {
    fd: OwnedFd,
    clock: ClockId,
    // expirations drained from the kernel by a re-arm, not yet acked
    carried: Cell<u64>,
}

impl Timer {
    /// Disarmed timer on the monotonic clock.
    pub fn new() -> Result<Self, TimerError> {
        Self::with_clock(ClockId::Monotonic)
    }

    pub fn with_clock(clock: ClockId) -> Result<Self, TimerError> {
        // SAFETY: no pointers are passed.
        let fd = unsafe {
            libc::timerfd_create(clock.raw(), libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
        };
        if fd < 0 {
            let err = io::Error::last_os_error();
            error!(?clock, %err, "timerfd_create failed");
            return Err(TimerError::Create(err));
        }
        debug!(fd, ?clock, "timer created");
        Ok(Self {
            // SAFETY: fd was just returned by timerfd_create and nothing else owns it.
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            clock,
            carried: Cell::new(0),
        })
    }

    pub fn clock(&self) -> ClockId {
        self.clock
    }

    /// Fires once after `duration`. [`Timeout::NO_WAIT`] disarms instead.
    ///
    /// Replaces whatever arm state the timer had.
    pub fn start_oneshot(&self, duration: Timeout) {
        self.settime(duration, Timeout::NO_WAIT);
    }

    /// Fires after `delay`, then every `period`.
    ///
    /// A `period` that is not positive means no repeat, the same as
    /// [`Timer::start_oneshot`].
    pub fn start_periodic(&self, delay: Timeout, period: Timeout) {
        let period = if period.is_forever() {
            Timeout::NO_WAIT
        } else {
            period
        };
        self.settime(delay, period);
    }

    /// Disarms. Expirations already counted stay until [`Timer::ack`].
    pub fn stop(&self) {
        self.settime(Timeout::NO_WAIT, Timeout::NO_WAIT);
    }

    fn settime(&self, value: Timeout, interval: Timeout) {
        let drained = self.read_expirations();
        self.carried.set(self.carried.get().saturating_add(drained));

        let spec = libc::itimerspec {
            it_value: value.to_time_spec().into(),
            it_interval: interval.to_time_spec().into(),
        };
        // SAFETY: spec lives across the call; old_value may be null.
        let ret = unsafe { libc::timerfd_settime(self.fd.as_raw_fd(), 0, &spec, ptr::null_mut()) };
        if ret != 0 {
            let err = io::Error::last_os_error();
            error!(fd = self.fd.as_raw_fd(), %err, "timerfd_settime failed");
            panic!("timerfd_settime failed on fd {}: {err}", self.fd.as_raw_fd());
        }
        debug!(fd = self.fd.as_raw_fd(), value = %value, interval = %interval, "timer set");
    }

    /// Reads back what the kernel holds for this timer.
    ///
    /// A oneshot that already fired reads as [`ArmState::Disarmed`].
    pub fn arm_state(&self) -> ArmState {
        // SAFETY: itimerspec is plain data and all-zero is a valid value.
        let mut current: libc::itimerspec = unsafe { mem::zeroed() };
        // SAFETY: current is a writable itimerspec.
        let ret = unsafe { libc::timerfd_gettime(self.fd.as_raw_fd(), &mut current) };
        if ret != 0 {
            let err = io::Error::last_os_error();
            error!(fd = self.fd.as_raw_fd(), %err, "timerfd_gettime failed");
            panic!("timerfd_gettime failed on fd {}: {err}", self.fd.as_raw_fd());
        }
        let value = TimeSpec::from(current.it_value);
        let interval = TimeSpec::from(current.it_interval);
        if value.is_zero() {
            ArmState::Disarmed
        } else if interval.is_zero() {
            ArmState::Oneshot {
                remaining: value.into(),
            }
        } else {
            ArmState::Periodic {
                remaining: value.into(),
                interval: interval.into(),
            }
        }
    }

    /// Whether an expiration is pending. Does not consume it.
    pub fn is_ready(&self) -> bool {
        matches!(self.wait_ready(Timeout::NO_WAIT), Ok(Wait::Ready))
    }

    /// Blocks up to `timeout` for an expiration to be pending. Does not
    /// consume it.
    pub fn wait_ready(&self, timeout: Timeout) -> Result<Wait, TimerError> {
        if self.carried.get() > 0 {
            return Ok(Wait::Ready);
        }
        let mut fds = [PollFd::new(self.fd.as_raw_fd(), PollEvents::READABLE)];
        let ready = poll(&mut fds, timeout).map_err(TimerError::Poll)?;
        let revents = fds[0].revents();
        if ready > 0 && revents.contains(PollEvents::READABLE) {
            return Ok(Wait::Ready);
        }
        if revents.intersects(PollEvents::ERROR | PollEvents::HANGUP | PollEvents::INVALID) {
            return Err(TimerError::Descriptor(revents));
        }
        Ok(Wait::TimedOut)
    }

    /// Consumes and returns the expirations counted since the last ack.
    /// Zero when none are pending.
    pub fn ack(&self) -> u64 {
        let expirations = self
            .carried
            .replace(0)
            .saturating_add(self.read_expirations());
        if expirations > 0 {
            trace!(fd = self.fd.as_raw_fd(), expirations, "timer acked");
        }
        expirations
    }

    // non-blocking read of the kernel counter, 0 when nothing is pending
    fn read_expirations(&self) -> u64 {
        let mut buf = [0u8; 8];
        // SAFETY: buf is 8 writable bytes, the size timerfd expects.
        let ret = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if ret == buf.len() as isize {
            u64::from_ne_bytes(buf)
        } else {
            0
        }
    }

    /// Releases the timer. Equivalent to dropping it.
    pub fn cleanup(self) {}
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(fd = self.fd.as_raw_fd(), "timer released");
    }
}

impl AsFd for Timer {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for Timer {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lull_core::sleep;
    use tracing_test::traced_test;

    #[test]
    fn fresh_timer_is_disarmed_and_idle() {
        let timer = Timer::new().unwrap();
        assert_eq!(timer.clock(), ClockId::Monotonic);
        assert_eq!(timer.arm_state(), ArmState::Disarmed);
        assert!(!timer.is_ready());
        assert_eq!(timer.ack(), 0);
    }

    #[test]
    fn every_clock_can_back_a_timer() {
        for clock in [ClockId::Monotonic, ClockId::Realtime, ClockId::Boottime] {
            let timer = Timer::with_clock(clock).unwrap();
            assert_eq!(timer.clock(), clock);
        }
    }

    #[test]
    fn oneshot_then_stop() {
        let timer = Timer::new().unwrap();
        timer.start_oneshot(Timeout::from_secs(10));
        match timer.arm_state() {
            ArmState::Oneshot { remaining } => {
                assert!(remaining.as_nanos() > 0);
                assert!(remaining.as_nanos() <= Timeout::from_secs(10).as_nanos());
            }
            other => panic!("expected oneshot, got {other:?}"),
        }
        timer.stop();
        assert_eq!(timer.arm_state(), ArmState::Disarmed);
    }

    #[test]
    fn oneshot_with_no_wait_disarms() {
        let timer = Timer::new().unwrap();
        timer.start_oneshot(Timeout::from_secs(10));
        timer.start_oneshot(Timeout::NO_WAIT);
        assert_eq!(timer.arm_state(), ArmState::Disarmed);
    }

    #[test]
    fn periodic_reports_interval() {
        let timer = Timer::new().unwrap();
        timer.start_periodic(Timeout::from_secs(5), Timeout::from_secs(2));
        match timer.arm_state() {
            ArmState::Periodic { interval, .. } => assert_eq!(interval, Timeout::from_secs(2)),
            other => panic!("expected periodic, got {other:?}"),
        }
    }

    #[test]
    fn periodic_without_positive_period_is_oneshot() {
        let timer = Timer::new().unwrap();
        for period in [Timeout::NO_WAIT, Timeout::FOREVER] {
            timer.start_periodic(Timeout::from_secs(5), period);
            assert!(matches!(timer.arm_state(), ArmState::Oneshot { .. }));
        }
    }

    #[test]
    fn rearm_replaces_previous_state() {
        let timer = Timer::new().unwrap();
        timer.start_periodic(Timeout::from_secs(5), Timeout::from_secs(1));
        timer.start_oneshot(Timeout::from_secs(60));
        assert!(matches!(timer.arm_state(), ArmState::Oneshot { .. }));
    }

    #[test]
    fn stop_keeps_counted_expirations() {
        let timer = Timer::new().unwrap();
        timer.start_oneshot(Timeout::from_millis(5));
        sleep(Timeout::from_millis(20));
        timer.stop();
        assert!(timer.is_ready());
        assert_eq!(timer.ack(), 1);
        assert!(!timer.is_ready());
    }

    #[test]
    fn rearm_keeps_counted_expirations() {
        let timer = Timer::new().unwrap();
        timer.start_oneshot(Timeout::from_millis(5));
        sleep(Timeout::from_millis(20));
        timer.start_oneshot(Timeout::from_secs(60));
        assert!(timer.is_ready());
        assert_eq!(timer.wait_ready(Timeout::from_secs(1)).unwrap(), Wait::Ready);
        assert_eq!(timer.ack(), 1);
        assert_eq!(timer.ack(), 0);
        assert!(!timer.is_ready());
    }

    #[test]
    fn wait_codes() {
        assert_eq!(Wait::Ready.code(), 1);
        assert_eq!(Wait::TimedOut.code(), 0);
        assert_eq!(wait_code(&Ok(Wait::Ready)), 1);
        assert_eq!(wait_code(&Ok(Wait::TimedOut)), 0);
        let err = TimerError::Poll(io::Error::from_raw_os_error(libc::EINVAL));
        assert_eq!(wait_code(&Err(err)), -1);
    }

    #[test]
    fn wait_on_disarmed_times_out() {
        let timer = Timer::new().unwrap();
        assert_eq!(timer.wait_ready(Timeout::from_millis(5)).unwrap(), Wait::TimedOut);
    }

    #[traced_test]
    #[test]
    fn logs_arm_and_release() {
        let timer = Timer::new().unwrap();
        timer.start_oneshot(Timeout::from_millis(20));
        timer.cleanup();
        assert!(logs_contain("timer set"));
        assert!(logs_contain("value=20ms"));
        assert!(logs_contain("timer released"));
    }
}
