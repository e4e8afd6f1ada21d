//! Room and registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Per-room lifecycle settings. Every room in a registry shares one copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Inactivity after which an active room hibernates.
    pub timeout: Duration,

    /// How long a room may stay hibernating before it becomes eligible
    /// for eviction.
    pub max_hibernate: Duration,

    /// A robot that receives no command for this long is removed.
    pub robot_keep_alive: Duration,

    /// Maximum robots per room.
    pub max_robots: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(900),
            max_hibernate: Duration::from_secs(24 * 60 * 60),
            robot_keep_alive: Duration::from_secs(30),
            max_robots: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Hard limit on live rooms, hibernating ones included.
    pub max_rooms: usize,

    /// Length of generated room identifiers.
    pub room_id_len: usize,

    pub room: RoomConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_rooms: 64,
            room_id_len: 6,
            room: RoomConfig::default(),
        }
    }
}
