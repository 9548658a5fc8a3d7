use std::time::Duration;

use serde::{Deserialize, Serialize};

/// WebSocket hosting server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
    /// Seconds a new peer has to send its subscribe frame (valid range: 1-300).
    pub hello_timeout_secs: u32,
    /// Per-connection outbound queue length (valid range: 1-65536).
    pub outbound_capacity: u32,
    /// How long one delivery may wait on a full outbound queue before it
    /// counts as failed, in milliseconds (valid range: 1-600000).
    pub send_timeout_ms: u32,
}

impl ServerConfig {
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.hello_timeout_secs))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.send_timeout_ms))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            hello_timeout_secs: 10,
            outbound_capacity: 256,
            send_timeout_ms: 5_000,
        }
    }
}
