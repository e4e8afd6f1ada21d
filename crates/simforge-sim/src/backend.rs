//! The narrow contract between the simulation and a physics engine.
//!
//! Everything above this trait (instances, entities, drones) talks in
//! [`BodyHandle`]s and nalgebra vectors. Nothing outside the backend
//! module ever sees an engine type, so entity code stays the same when the
//! engine changes.

use std::fmt;

use crate::{Quat, SimError, Vec3};

/// Opaque reference to one body inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// How a body moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// Integrated by the engine: gravity, forces, contacts.
    Dynamic,
    /// Infinite effective mass; moves only when its pose or velocity is
    /// set directly.
    Kinematic,
    /// Never moves.
    Fixed,
}

/// Everything a backend needs to create a box.
#[derive(Debug, Clone, Copy)]
pub struct BoxDesc {
    pub position: Vec3,
    pub orientation: Quat,
    /// Full extents (width, height, depth), not half extents.
    pub size: Vec3,
    /// Ignored unless `motion` is [`Motion::Dynamic`].
    pub mass: f32,
    pub motion: Motion,
}

impl BoxDesc {
    /// Rejects degenerate boxes before they reach the engine.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.size.iter().all(|d| d.is_finite() && *d > 0.0) {
            return Err(SimError::InvalidShape(format!(
                "box extents must be positive, got {:?}",
                self.size.as_slice()
            )));
        }
        if !self.position.iter().all(|c| c.is_finite()) {
            return Err(SimError::InvalidShape("position is not finite".into()));
        }
        if self.motion == Motion::Dynamic && !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(SimError::InvalidShape(format!(
                "dynamic body mass must be positive, got {}",
                self.mass
            )));
        }
        Ok(())
    }
}

/// A physics engine hosting one world.
///
/// Pose setters must wake a sleeping body. Kinematic and fixed bodies
/// report an infinite mass.
pub trait PhysicsBackend: Send {
    /// Adds a solid box.
    fn add_box(&mut self, desc: &BoxDesc) -> Result<BodyHandle, SimError>;

    /// Adds a non-solid box that reports which bodies overlap it and
    /// never collides with anything.
    ///
    /// Backends without overlap reporting keep this default.
    fn add_sensor_box(&mut self, _desc: &BoxDesc) -> Result<BodyHandle, SimError> {
        Err(SimError::UnsupportedByBackend("non-colliding overlap volumes"))
    }

    fn remove(&mut self, body: BodyHandle) -> Result<(), SimError>;

    /// Advances the world by exactly `dt` seconds.
    fn step(&mut self, dt: f32);

    /// `true` if a ray from `origin` along `direction` hits a solid body
    /// within `max_range`.
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_range: f32) -> bool;

    fn pose(&self, body: BodyHandle) -> Result<(Vec3, Quat), SimError>;
    fn set_pose(
        &mut self,
        body: BodyHandle,
        position: Vec3,
        orientation: Quat,
    ) -> Result<(), SimError>;

    /// Linear and angular velocity, world frame.
    fn velocity(&self, body: BodyHandle) -> Result<(Vec3, Vec3), SimError>;
    fn set_velocity(
        &mut self,
        body: BodyHandle,
        linear: Vec3,
        angular: Vec3,
    ) -> Result<(), SimError>;

    fn mass(&self, body: BodyHandle) -> Result<f32, SimError>;

    /// Full bounding extents as created.
    fn size(&self, body: BodyHandle) -> Result<Vec3, SimError>;

    /// Applies a world-frame force through the center of mass for the
    /// next step only.
    fn apply_force(&mut self, body: BodyHandle, force: Vec3) -> Result<(), SimError>;

    /// Bodies overlapping a sensor box after the last step.
    fn sensor_overlaps(&self, sensor: BodyHandle) -> Result<Vec<BodyHandle>, SimError>;
}
