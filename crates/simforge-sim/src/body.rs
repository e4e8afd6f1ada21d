//! Borrowed views of single bodies.

use crate::{BodyHandle, PhysicsBackend, Quat, SimError, Vec3};

/// Snapshot of everything a body exposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
    pub size: Vec3,
}

impl BodyState {
    pub(crate) fn read(backend: &dyn PhysicsBackend, body: BodyHandle) -> Result<Self, SimError> {
        let (position, orientation) = backend.pose(body)?;
        let (linear_velocity, angular_velocity) = backend.velocity(body)?;
        Ok(Self {
            position,
            orientation,
            linear_velocity,
            angular_velocity,
            mass: backend.mass(body)?,
            size: backend.size(body)?,
        })
    }
}

/// Mutable view of a movable body.
pub struct SimBody<'a> {
    backend: &'a mut dyn PhysicsBackend,
    handle: BodyHandle,
}

impl<'a> SimBody<'a> {
    pub fn new(backend: &'a mut dyn PhysicsBackend, handle: BodyHandle) -> Self {
        Self { backend, handle }
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn state(&self) -> Result<BodyState, SimError> {
        BodyState::read(&*self.backend, self.handle)
    }

    pub fn position(&self) -> Result<Vec3, SimError> {
        Ok(self.backend.pose(self.handle)?.0)
    }

    pub fn orientation(&self) -> Result<Quat, SimError> {
        Ok(self.backend.pose(self.handle)?.1)
    }

    /// Teleports the body and wakes it.
    pub fn set_pose(&mut self, position: Vec3, orientation: Quat) -> Result<(), SimError> {
        self.backend.set_pose(self.handle, position, orientation)
    }

    pub fn set_position(&mut self, position: Vec3) -> Result<(), SimError> {
        let orientation = self.orientation()?;
        self.set_pose(position, orientation)
    }

    pub fn set_orientation(&mut self, orientation: Quat) -> Result<(), SimError> {
        let position = self.position()?;
        self.set_pose(position, orientation)
    }

    pub fn linear_velocity(&self) -> Result<Vec3, SimError> {
        Ok(self.backend.velocity(self.handle)?.0)
    }

    pub fn angular_velocity(&self) -> Result<Vec3, SimError> {
        Ok(self.backend.velocity(self.handle)?.1)
    }

    pub fn set_velocity(&mut self, linear: Vec3, angular: Vec3) -> Result<(), SimError> {
        self.backend.set_velocity(self.handle, linear, angular)
    }

    /// `f32::INFINITY` for kinematic bodies.
    pub fn mass(&self) -> Result<f32, SimError> {
        self.backend.mass(self.handle)
    }

    pub fn size(&self) -> Result<Vec3, SimError> {
        self.backend.size(self.handle)
    }

    /// World-frame force for the next step. No effect on kinematic bodies.
    pub fn apply_force(&mut self, force: Vec3) -> Result<(), SimError> {
        self.backend.apply_force(self.handle, force)
    }
}

/// Read-only view of an immovable body.
pub struct SimStatic<'a> {
    backend: &'a dyn PhysicsBackend,
    handle: BodyHandle,
}

impl<'a> SimStatic<'a> {
    pub fn new(backend: &'a dyn PhysicsBackend, handle: BodyHandle) -> Self {
        Self { backend, handle }
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn position(&self) -> Result<Vec3, SimError> {
        Ok(self.backend.pose(self.handle)?.0)
    }

    pub fn orientation(&self) -> Result<Quat, SimError> {
        Ok(self.backend.pose(self.handle)?.1)
    }

    pub fn size(&self) -> Result<Vec3, SimError> {
        self.backend.size(self.handle)
    }
}
