//! Timer defaults.

use lull_core::Timeout;
use lull_timer::ClockId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct TimerConfig {
    /// Clock new timers count against.
    pub clock: ClockId,

    /// Period used when a caller asks for a periodic timer without one.
    #[validate(custom(function = validation::validate_period))]
    pub default_period: Timeout,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            clock: ClockId::Monotonic,
            default_period: Timeout::from_secs(1),
        }
    }
}
