//! When hibernating rooms get destroyed.
//!
//! The registry never destroys a room on its own; the host runs
//! [`RoomRegistry::evict`](crate::RoomRegistry::evict) with a policy on
//! its own schedule.

use std::time::Duration;

use crate::{Room, RoomConfig};

pub trait EvictionPolicy: Send + Sync {
    fn should_evict(&self, room: &Room) -> bool;
}

/// Evicts rooms that have been hibernating longer than a fixed limit.
#[derive(Debug, Clone, Copy)]
pub struct MaxHibernateEviction {
    max_hibernate: Duration,
}

impl MaxHibernateEviction {
    pub fn new(max_hibernate: Duration) -> Self {
        Self { max_hibernate }
    }

    pub fn max_hibernate(&self) -> Duration {
        self.max_hibernate
    }
}

impl From<&RoomConfig> for MaxHibernateEviction {
    fn from(config: &RoomConfig) -> Self {
        Self::new(config.max_hibernate)
    }
}

impl EvictionPolicy for MaxHibernateEviction {
    fn should_evict(&self, room: &Room) -> bool {
        room.hibernating_for()
            .is_some_and(|elapsed| elapsed > self.max_hibernate)
    }
}
