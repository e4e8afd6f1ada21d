//! Quadrotor flight dynamics.
//!
//! # Frame
//!
//! Plus configuration, local up is `+Y`. Motors sit at the end of each arm:
//!
//! ```text
//!            1 (+Z)
//!            |
//!   2 (-X) --+-- 0 (+X)
//!            |
//!            3 (-Z)
//! ```
//!
//! Motors 0 and 2 spin one way, 1 and 3 the other, so their drag torques
//! about `Y` cancel at equal speeds.
//!
//! # Per tick
//!
//! With motor speeds `s_i` (rad/s) clamped to `[0, max_motor_speed]`:
//!
//! - thrust `T_i = k_f s_i²`, along local `+Y`
//! - torque `τ = (l (T3 − T1), k_m (T0 − T1 + T2 − T3), l (T0 − T2))`
//! - drag `d = −c ⊙ v_b ⊙ |v_b|` with `c = ½ ρ C_d A` per body axis
//! - `a = R (T ŷ + d) / m`
//! - `α = R ((τ − ω_b × (I ω_b)) ⊘ I)`
//!
//! Velocities are then advanced by `dt` (semi-implicit Euler; the physics
//! world integrates positions and applies gravity on its next step).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Quat, SimBody, SimError, Vec3};

pub const MOTOR_COUNT: usize = 4;

/// Physical constants of one airframe.
#[derive(Debug, Clone)]
pub struct DroneParams {
    pub mass: f32,
    /// Center to motor, meters.
    pub arm_length: f32,
    /// Height of the frame box, meters.
    pub frame_height: f32,
    /// Rad/s.
    pub max_motor_speed: f32,
    /// Thrust per squared motor speed, N/(rad/s)².
    pub thrust_coefficient: f32,
    /// Drag torque over thrust, meters.
    pub torque_ratio: f32,
    pub drag_coefficient: f32,
    pub air_density: f32,
    /// Principal moments about the body X, Y and Z axes.
    pub inertia: Vec3,
}

impl Default for DroneParams {
    fn default() -> Self {
        let mass = 1.0;
        let arm_length = 0.2;
        let frame_height = 0.1;
        Self {
            mass,
            arm_length,
            frame_height,
            max_motor_speed: 1000.0,
            thrust_coefficient: 1e-5,
            torque_ratio: 0.016,
            drag_coefficient: 1.0,
            air_density: 1.225,
            inertia: box_inertia(mass, frame_size(arm_length, frame_height)),
        }
    }
}

impl DroneParams {
    /// Bounding box of the frame: arm tip to arm tip on X and Z.
    pub fn size(&self) -> Vec3 {
        frame_size(self.arm_length, self.frame_height)
    }

    /// Per-axis quadratic drag coefficients `½ ρ C_d A`, with `A` the
    /// frame's area projected along each body axis.
    pub fn drag(&self) -> Vec3 {
        let span = 2.0 * self.arm_length;
        let areas = Vec3::new(
            self.frame_height * span,
            span * span,
            self.frame_height * span,
        );
        areas * (0.5 * self.air_density * self.drag_coefficient)
    }

    /// Motor speed at which total thrust balances gravity.
    pub fn hover_speed(&self, gravity: f32) -> f32 {
        (self.mass * gravity.abs() / (MOTOR_COUNT as f32 * self.thrust_coefficient)).sqrt()
    }
}

fn frame_size(arm_length: f32, frame_height: f32) -> Vec3 {
    Vec3::new(2.0 * arm_length, frame_height, 2.0 * arm_length)
}

/// Principal moments of a solid box.
fn box_inertia(mass: f32, size: Vec3) -> Vec3 {
    let sq = size.component_mul(&size);
    Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0)
}

/// How a controller commands the drone, from most to least direct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DriveMode {
    /// Raw per-motor speed targets (rad/s).
    MotorSpeeds { targets: [f32; MOTOR_COUNT] },
    /// Roll and pitch angles (rad), yaw rate (rad/s), throttle in `[0, 1]`.
    AttitudeThrottle {
        roll: f32,
        pitch: f32,
        yaw_rate: f32,
        throttle: f32,
    },
    /// Horizontal velocity, yaw rate and a target altitude.
    PlanarVelocityAltitude {
        vx: f32,
        vz: f32,
        yaw_rate: f32,
        altitude: f32,
    },
    /// World-frame velocity and yaw rate.
    Velocity { vx: f32, vy: f32, vz: f32, yaw_rate: f32 },
    /// Fly to a world position.
    Waypoint { x: f32, y: f32, z: f32 },
}

impl Default for DriveMode {
    fn default() -> Self {
        Self::MotorSpeeds {
            targets: [0.0; MOTOR_COUNT],
        }
    }
}

/// What a [`ControlPolicy`] may read each tick.
#[derive(Debug, Clone, Copy)]
pub struct DroneState {
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub motor_speeds: [f32; MOTOR_COUNT],
}

/// Maps the higher drive modes to motor targets.
///
/// Returning `None` leaves the current targets untouched.
pub trait ControlPolicy: Send {
    fn motor_targets(
        &mut self,
        mode: &DriveMode,
        state: &DroneState,
        params: &DroneParams,
        dt: f32,
    ) -> Option<[f32; MOTOR_COUNT]>;
}

pub struct Drone {
    params: DroneParams,
    motor_speeds: [f32; MOTOR_COUNT],
    motor_targets: [f32; MOTOR_COUNT],
    mode: DriveMode,
    policy: Option<Box<dyn ControlPolicy>>,
    initial_position: Vec3,
    initial_orientation: Quat,
}

impl Drone {
    pub fn new(params: DroneParams, initial_position: Vec3, initial_orientation: Quat) -> Self {
        Self {
            params,
            motor_speeds: [0.0; MOTOR_COUNT],
            motor_targets: [0.0; MOTOR_COUNT],
            mode: DriveMode::default(),
            policy: None,
            initial_position,
            initial_orientation,
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn ControlPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn params(&self) -> &DroneParams {
        &self.params
    }

    pub fn motor_speeds(&self) -> [f32; MOTOR_COUNT] {
        self.motor_speeds
    }

    pub fn motor_targets(&self) -> [f32; MOTOR_COUNT] {
        self.motor_targets
    }

    pub fn mode(&self) -> &DriveMode {
        &self.mode
    }

    pub fn initial_pose(&self) -> (Vec3, Quat) {
        (self.initial_position, self.initial_orientation)
    }

    /// Sets raw motor targets and switches to [`DriveMode::MotorSpeeds`].
    pub fn set_motor_targets(&mut self, targets: [f32; MOTOR_COUNT]) {
        self.motor_targets = targets;
        self.mode = DriveMode::MotorSpeeds { targets };
    }

    /// Switches the drive mode. Raw speeds apply immediately; other modes
    /// are translated by the control policy each tick, or ignored (targets
    /// held) when there is none.
    pub fn set_mode(&mut self, mode: DriveMode) {
        if let DriveMode::MotorSpeeds { targets } = mode {
            self.motor_targets = targets;
        } else if self.policy.is_none() {
            tracing::debug!(?mode, "no control policy, holding motor targets");
        }
        self.mode = mode;
    }

    /// Advances the drone's velocities by one tick.
    pub fn update(&mut self, body: &mut SimBody<'_>, dt: f32) -> Result<(), SimError> {
        let state = body.state()?;

        if !matches!(self.mode, DriveMode::MotorSpeeds { .. }) {
            if let Some(policy) = self.policy.as_mut() {
                let snapshot = DroneState {
                    position: state.position,
                    orientation: state.orientation,
                    linear_velocity: state.linear_velocity,
                    angular_velocity: state.angular_velocity,
                    motor_speeds: self.motor_speeds,
                };
                if let Some(targets) =
                    policy.motor_targets(&self.mode, &snapshot, &self.params, dt)
                {
                    self.motor_targets = targets;
                }
            }
        }

        let max = self.params.max_motor_speed;
        for (speed, target) in self.motor_speeds.iter_mut().zip(self.motor_targets) {
            *speed = if target.is_finite() { target.clamp(0.0, max) } else { 0.0 };
        }
        let thrust = self.motor_speeds.map(|s| self.params.thrust_coefficient * s * s);

        let rot = state.orientation;
        let l = self.params.arm_length;

        // Linear: thrust along local up, minus body-frame quadratic drag.
        let v_body = rot.inverse_transform_vector(&state.linear_velocity);
        let drag = -self
            .params
            .drag()
            .component_mul(&v_body)
            .component_mul(&v_body.abs());
        let force_body = Vec3::new(0.0, thrust.iter().sum(), 0.0) + drag;
        let linear_accel = if state.mass.is_finite() && state.mass > 0.0 {
            rot.transform_vector(&force_body) / state.mass
        } else {
            Vec3::zeros()
        };

        // Angular: arm torques, yaw from rotor drag, gyroscopic term.
        let torque = Vec3::new(
            l * (thrust[3] - thrust[1]),
            self.params.torque_ratio * (thrust[0] - thrust[1] + thrust[2] - thrust[3]),
            l * (thrust[0] - thrust[2]),
        );
        let inertia = self.params.inertia;
        let w_body = rot.inverse_transform_vector(&state.angular_velocity);
        let gyro = w_body.cross(&inertia.component_mul(&w_body));
        let alpha_body = (torque - gyro).component_div(&inertia);
        let angular_accel = rot.transform_vector(&alpha_body);

        body.set_velocity(
            state.linear_velocity + linear_accel * dt,
            state.angular_velocity + angular_accel * dt,
        )
    }

    /// Back to the creation pose, at rest, motors off.
    pub fn reset(&mut self, body: &mut SimBody<'_>) -> Result<(), SimError> {
        body.set_pose(self.initial_position, self.initial_orientation)?;
        body.set_velocity(Vec3::zeros(), Vec3::zeros())?;
        self.motor_speeds = [0.0; MOTOR_COUNT];
        self.motor_targets = [0.0; MOTOR_COUNT];
        self.mode = DriveMode::default();
        Ok(())
    }
}

impl fmt::Debug for Drone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drone")
            .field("motor_speeds", &self.motor_speeds)
            .field("motor_targets", &self.motor_targets)
            .field("mode", &self.mode)
            .field("has_policy", &self.policy.is_some())
            .finish_non_exhaustive()
    }
}
