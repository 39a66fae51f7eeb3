//! Transport configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port computors listen on
pub const CORE_PORT: u16 = 21841;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connected peers are swapped for a pooled address after this long
    pub rotation_period_ms: u64,
    /// Wait before reconnecting a slot that failed
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Capacity of the exchanged peer pool
    pub max_public_peers: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rotation_period_ms: 2 * 60 * 1000,
            reconnect_delay_ms: 1000,
            connect_timeout_ms: 5000,
            max_public_peers: 1024,
        }
    }
}

impl TransportConfig {
    pub fn rotation_period(&self) -> Duration {
        Duration::from_millis(self.rotation_period_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
