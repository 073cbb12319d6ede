//! ## lull-core::time
//! **Timeout representation shared by poll and timer calls**
//!
//! A [`Timeout`] is a single signed nanosecond count with three meanings:
//! - negative: wait forever
//! - zero: do not wait
//! - positive: wait at most that many nanoseconds
//!
//! Every `i64` is a valid timeout, so there is no fallible constructor.
//!
//! ### Key Submodules:
//! - `spec`: `TimeSpec` seconds/nanoseconds pair used at the kernel boundary
//! - `sleep`: blocking sleep for a `Timeout`
//! - `parse`: human-readable `"20ms"` / `"forever"` forms and serde support

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::error;

mod parse;
mod sleep;
mod spec;

pub use sleep::sleep;
pub use spec::TimeSpec;

pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Immutable timeout in nanoseconds.
///
/// Construction is plain multiplication in `i64`. Overflow wraps rather
/// than being checked, so every constructor is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timeout {
    ns: i64,
}

impl Timeout {
    /// Do not block.
    pub const NO_WAIT: Self = Self { ns: 0 };

    /// Block until something happens.
    pub const FOREVER: Self = Self { ns: -1 };

    #[inline]
    pub const fn from_nanos(ns: i64) -> Self {
        Self { ns }
    }

    #[inline]
    pub const fn from_micros(us: i64) -> Self {
        Self {
            ns: us.wrapping_mul(NANOS_PER_MICRO),
        }
    }

    #[inline]
    pub const fn from_millis(ms: i64) -> Self {
        Self {
            ns: ms.wrapping_mul(NANOS_PER_MILLI),
        }
    }

    #[inline]
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            ns: secs.wrapping_mul(NANOS_PER_SEC),
        }
    }

    /// Raw nanosecond count, negative for forever.
    #[inline]
    pub const fn as_nanos(self) -> i64 {
        self.ns
    }

    #[inline]
    pub const fn is_forever(self) -> bool {
        self.ns < 0
    }

    #[inline]
    pub const fn is_no_wait(self) -> bool {
        self.ns == 0
    }

    /// `None` for forever.
    pub fn as_duration(self) -> Option<Duration> {
        if self.is_forever() {
            None
        } else {
            Some(Duration::from_nanos(self.ns as u64))
        }
    }

    /// Milliseconds for `poll(2)`.
    ///
    /// Forever maps to `-1`. Positive values round up so a sub-millisecond
    /// timeout never degrades into a zero-timeout spin, and saturate at
    /// `i32::MAX`.
    pub const fn to_poll_millis(self) -> i32 {
        if self.ns < 0 {
            return -1;
        }
        if self.ns == 0 {
            return 0;
        }
        let mut ms = self.ns / NANOS_PER_MILLI;
        if self.ns % NANOS_PER_MILLI != 0 {
            ms += 1;
        }
        if ms > i32::MAX as i64 {
            i32::MAX
        } else {
            ms as i32
        }
    }

    /// Relative spec for arming a kernel timer.
    ///
    /// The kernel has no forever encoding, so forever becomes `i32::MAX`
    /// seconds (about 68 years). Zero means disarm.
    pub const fn to_time_spec(self) -> TimeSpec {
        if self.ns < 0 {
            TimeSpec::new(i32::MAX as i64, 0)
        } else if self.ns == 0 {
            TimeSpec::ZERO
        } else {
            TimeSpec::new(self.ns / NANOS_PER_SEC, self.ns % NANOS_PER_SEC)
        }
    }

    /// Absolute point in time `self` after `now`.
    ///
    /// `now` may carry nanoseconds outside `[0, 1s)`; the result is always
    /// normalised.
    ///
    /// # Panics
    /// If `self` is forever. An absolute deadline cannot be unbounded.
    pub fn to_deadline(self, now: TimeSpec) -> TimeSpec {
        if self.is_forever() {
            error!("attempted to build an absolute deadline from a forever timeout");
            panic!("cannot convert a forever timeout to an absolute deadline");
        }
        // both terms are in [0, 1s), so the sum is below 2s
        let nanos = now.nanos.rem_euclid(NANOS_PER_SEC) + self.ns % NANOS_PER_SEC;
        TimeSpec::new(
            now.secs
                .saturating_add(now.nanos.div_euclid(NANOS_PER_SEC))
                .saturating_add(self.ns / NANOS_PER_SEC)
                .saturating_add(nanos / NANOS_PER_SEC),
            nanos % NANOS_PER_SEC,
        )
    }

    /// Deadline relative to `CLOCK_REALTIME`.
    ///
    /// # Panics
    /// If `self` is forever.
    pub fn deadline_from_now(self) -> TimeSpec {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(TimeSpec::from)
            .unwrap_or(TimeSpec::ZERO);
        self.to_deadline(now)
    }
}

impl From<Duration> for Timeout {
    /// Saturates at `i64::MAX` nanoseconds.
    fn from(duration: Duration) -> Self {
        Self::from_nanos(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX))
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::FOREVER, Self::from)
    }
}

impl From<TimeSpec> for Timeout {
    /// Relative spec back to a timeout, saturating at `i64::MAX` nanoseconds.
    /// A negative spec clamps to no-wait rather than turning into forever.
    fn from(spec: TimeSpec) -> Self {
        let ns = spec.as_nanos().clamp(0, i64::MAX as i128);
        Self::from_nanos(ns as i64)
    }
}
