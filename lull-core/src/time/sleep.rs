use std::time::{Duration, Instant};

use tracing::{error, trace};

use super::Timeout;

/// Longest single sleep: `i32::MAX` seconds.
const FOREVER_CHUNK: Duration = Duration::from_secs(i32::MAX as u64);

/// Blocks the calling thread for `duration`.
///
/// Signal interruptions resume with the remaining time, so the call never
/// returns early. A forever sleep never returns.
///
/// # Panics
/// If a forever sleep comes back.
pub fn sleep(duration: Timeout) {
    match duration.as_duration() {
        None => sleep_forever(),
        Some(d) if d.is_zero() => {}
        Some(d) => {
            trace!(ns = duration.as_nanos(), "sleeping");
            // std restarts nanosleep with the remainder on EINTR
            std::thread::sleep(d);
        }
    }
}

fn sleep_forever() -> ! {
    let started = Instant::now();
    std::thread::sleep(FOREVER_CHUNK);
    error!(elapsed = ?started.elapsed(), "forever sleep returned");
    panic!("slept for {} seconds, forever sleep returned", i32::MAX);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_wait_returns_immediately() {
        let start = Instant::now();
        sleep(Timeout::NO_WAIT);
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn sleeps_at_least_the_duration() {
        let start = Instant::now();
        sleep(Timeout::from_millis(15));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
