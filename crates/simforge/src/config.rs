//! Host configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use simforge_room::RegistryConfig;
use simforge_tick::TickConfig;
use simforge_transport::BridgeConfig;

/// Everything a [`SimHost`](crate::SimHost) needs, assembled in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub registry: RegistryConfig,
    pub tick: TickConfig,
    pub bridge: BridgeConfig,
    /// How often hibernating rooms are checked for eviction. Zero is
    /// raised to one second.
    pub eviction_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            tick: TickConfig::default(),
            bridge: BridgeConfig::default(),
            eviction_interval: Duration::from_secs(60),
        }
    }
}
