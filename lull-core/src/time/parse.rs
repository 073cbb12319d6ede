//! Human-friendly timeout strings.
//!
//! Accepted forms: `forever`, `nowait`, `0`, `-1`, or an unsigned integer
//! with one of the units `ns`, `us`, `ms`, `s`. A bare integer is read as
//! milliseconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Timeout, NANOS_PER_MICRO, NANOS_PER_MILLI, NANOS_PER_SEC};
use crate::error::CoreError;

impl FromStr for Timeout {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || CoreError::InvalidTimeout(s.to_string());

        match s.to_ascii_lowercase().as_str() {
            "forever" | "-1" => return Ok(Timeout::FOREVER),
            "nowait" | "0" => return Ok(Timeout::NO_WAIT),
            _ => {}
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (num_part, unit_part) = s.split_at(split);
        let number: i64 = num_part.parse().map_err(|_| invalid())?;
        let multiplier = match unit_part.trim().to_ascii_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => NANOS_PER_MICRO,
            "ms" | "" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            _ => return Err(invalid()),
        };
        number
            .checked_mul(multiplier)
            .map(Timeout::from_nanos)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.as_nanos();
        if self.is_forever() {
            f.write_str("forever")
        } else if ns == 0 {
            f.write_str("nowait")
        } else if ns % NANOS_PER_SEC == 0 {
            write!(f, "{}s", ns / NANOS_PER_SEC)
        } else if ns % NANOS_PER_MILLI == 0 {
            write!(f, "{}ms", ns / NANOS_PER_MILLI)
        } else if ns % NANOS_PER_MICRO == 0 {
            write!(f, "{}us", ns / NANOS_PER_MICRO)
        } else {
            write!(f, "{}ns", ns)
        }
    }
}

impl Serialize for Timeout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeoutValue {
    Millis(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for Timeout {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match TimeoutValue::deserialize(deserializer)? {
            TimeoutValue::Millis(ms) if ms < 0 => Ok(Timeout::FOREVER),
            TimeoutValue::Millis(ms) => ms
                .checked_mul(NANOS_PER_MILLI)
                .map(Timeout::from_nanos)
                .ok_or_else(|| serde::de::Error::custom("timeout overflows i64 nanoseconds")),
            TimeoutValue::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
