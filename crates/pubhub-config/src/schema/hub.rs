use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Broadcast hub tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Default time a serialized publish waits for the previous broadcast
    /// to finish, in milliseconds (valid range: 1-600000).
    pub serial_publish_max_wait_ms: u32,
}

impl HubConfig {
    pub fn serial_publish_max_wait(&self) -> Duration {
        Duration::from_millis(u64::from(self.serial_publish_max_wait_ms))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            serial_publish_max_wait_ms: 10_000,
        }
    }
}
