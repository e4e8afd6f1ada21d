//! # Simforge
//!
//! A host for many independent, real-time physics simulations ("rooms"),
//! each with simulated robots and props, watched and driven by remote
//! clients through a separate edge process.
//!
//! The host wires the layers together:
//!
//! ```text
//! edge process ⇄ Bridge (simforge-transport)
//!                  │ sockets, callbacks (simforge-session, simforge-protocol)
//!                  ▼
//!              RoomRegistry (simforge-room) ◀── tick loop (simforge-tick)
//!                  │
//!                  ▼
//!              SimulationInstance (simforge-sim)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simforge::prelude::*;
//!
//! # async fn run() -> Result<(), SimforgeError> {
//! let mut edge = tokio::process::Command::new("node");
//! edge.arg("edge.js");
//! let host = SimHost::builder().spawn_edge(edge)?;
//! host.closed().await;
//! host.shutdown().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::HostConfig;
pub use error::SimforgeError;
pub use handler::DEFAULT_ENVIRONMENT;
pub use server::{SimHost, SimHostBuilder};

/// Convenience re-exports for applications embedding the host.
pub mod prelude {
    pub use crate::{HostConfig, SimHost, SimHostBuilder, SimforgeError, DEFAULT_ENVIRONMENT};
    pub use simforge_protocol::{RobotId, RoomId, RoomInfo, SessionId, StateUpdate};
    pub use simforge_room::{
        Environment, EnvironmentCatalog, EvictionPolicy, MaxHibernateEviction, RegistryConfig,
        Room, RoomConfig, RoomError, RoomEvent, RoomOptions, RoomRegistry,
    };
    pub use simforge_sim::{
        BoxSpec, ControlPolicy, DroneParams, DriveMode, EntityBehavior, SimBody, SimError,
        SimulationInstance, Vec3,
    };
    pub use simforge_tick::TickConfig;
    pub use simforge_transport::BridgeConfig;
}
