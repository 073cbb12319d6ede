//! Socket defaults.

use lull_core::Timeout;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct NetConfig {
    /// `listen(2)` backlog.
    #[validate(range(min = 1, max = 65535))]
    pub backlog: u32,

    /// Open sockets in non-blocking mode.
    pub non_blocking: bool,

    /// How long a non-blocking connect may stay in progress. `forever`
    /// waits indefinitely.
    pub connect_timeout: Timeout,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            backlog: 128,
            non_blocking: true,
            connect_timeout: Timeout::from_secs(5),
        }
    }
}
