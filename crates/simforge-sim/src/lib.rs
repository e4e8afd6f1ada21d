//! Simulation layer for Simforge.
//!
//! - [`PhysicsBackend`]: the narrow contract over a physics engine, with
//!   [`RapierBackend`] as the one implementation.
//! - [`SimulationInstance`]: one world: named bodies plus the entity
//!   arena, stepped once per tick.
//! - [`SimBody`] / [`SimStatic`]: borrowed views of a single body.
//! - [`Entity`] / [`EntityKind`]: what lives in the world: statics,
//!   dynamic props, [`Trigger`] volumes and [`Drone`]s.
//!
//! Within one [`SimulationInstance::update`] the world steps first, then
//! triggers receive that step's overlaps, then every entity updates.
//!
//! ```ignore
//! let mut sim = SimulationInstance::default();
//! sim.spawn_static("floor", BoxSpec::new(Vec3::zeros(), Vec3::new(20.0, 0.2, 20.0)), None)?;
//! let origin = Vec3::new(0.0, 1.0, 0.0);
//! let drone = sim.spawn_drone("d1", origin, None, DroneParams::default(), None, None)?;
//! sim.drone_mut(drone)?.set_motor_targets([500.0; 4]);
//! sim.update(0.05)?;
//! ```

mod backend;
mod body;
mod drone;
mod entity;
mod error;
mod instance;
mod rapier;
mod trigger;

pub use backend::{BodyHandle, BoxDesc, Motion, PhysicsBackend};
pub use body::{BodyState, SimBody, SimStatic};
pub use drone::{ControlPolicy, Drone, DroneParams, DroneState, DriveMode, MOTOR_COUNT};
pub use entity::{Entity, EntityBehavior, EntityId, EntityKind};
pub use error::SimError;
pub use instance::{BoxSpec, SimulationInstance};
pub use rapier::{RapierBackend, DEFAULT_GRAVITY};
pub use trigger::{Trigger, TriggerEdge, TriggerEvent};

/// World-space vector (meters, m/s, rad/s).
pub type Vec3 = rapier3d::na::Vector3<f32>;
/// Unit quaternion orientation.
pub type Quat = rapier3d::na::UnitQuaternion<f32>;
