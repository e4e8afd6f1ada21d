//! Rooms for Simforge.
//!
//! A room is one isolated simulation with the clients watching it. This
//! crate owns the room lifecycle (active vs. hibernating), robots and
//! their keep-alive, state broadcasts, and the process-wide registry.
//!
//! # Key types
//!
//! - [`Room`]: one simulation session and its hibernation state machine
//! - [`RoomRegistry`]: creates rooms, tracks memberships, drives the tick
//! - [`Environment`] / [`EnvironmentCatalog`]: initial room layouts
//! - [`EvictionPolicy`]: decides which hibernating rooms get destroyed
//! - [`RoomEvent`]: notifications published on each room's channel
//! - [`RoomConfig`] / [`RegistryConfig`]: settings

mod config;
mod environment;
mod error;
mod event;
mod eviction;
mod registry;
mod room;

pub use config::{RegistryConfig, RoomConfig};
pub use environment::{DefaultEnvironment, EmptyEnvironment, Environment, EnvironmentCatalog};
pub use error::RoomError;
pub use event::{RemovalReason, RoomEvent};
pub use eviction::{EvictionPolicy, MaxHibernateEviction};
pub use registry::{RegistryStatus, RoomRegistry, SharedRoom};
pub use room::{Robot, Room, RoomOptions};
