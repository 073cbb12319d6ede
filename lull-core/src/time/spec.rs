use std::time::Duration;

use super::NANOS_PER_SEC;

/// Seconds plus a nanosecond remainder, as the kernel takes time values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeSpec {
    pub secs: i64,
    pub nanos: i64,
}

impl TimeSpec {
    pub const ZERO: Self = Self { secs: 0, nanos: 0 };

    #[inline]
    pub const fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.secs == 0 && self.nanos == 0
    }

    /// Total nanoseconds, widened so `i32::MAX` seconds cannot overflow.
    #[inline]
    pub const fn as_nanos(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC as i128 + self.nanos as i128
    }
}

impl From<Duration> for TimeSpec {
    fn from(duration: Duration) -> Self {
        Self::new(
            i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
            duration.subsec_nanos() as i64,
        )
    }
}

impl From<TimeSpec> for libc::timespec {
    fn from(spec: TimeSpec) -> Self {
        libc::timespec {
            tv_sec: spec.secs as libc::time_t,
            tv_nsec: spec.nanos as libc::c_long,
        }
    }
}

impl From<libc::timespec> for TimeSpec {
    fn from(ts: libc::timespec) -> Self {
        Self::new(ts.tv_sec as i64, ts.tv_nsec as i64)
    }
}
