//! [`PhysicsBackend`] over the Rapier engine.

use std::collections::HashMap;

use rapier3d::na::{Isometry3, Point3, Translation3};
use rapier3d::prelude::{
    ActiveCollisionTypes, CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet,
    DefaultBroadPhase, Group, ImpulseJointSet, IntegrationParameters, InteractionGroups,
    IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, QueryFilter, QueryPipeline,
    Ray, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};

use crate::{BodyHandle, BoxDesc, Motion, PhysicsBackend, Quat, SimError, Vec3};

/// Solid boxes interact with everything.
const SOLID_GROUPS: InteractionGroups = InteractionGroups::new(Group::GROUP_1, Group::ALL);
/// Sensors only see solids, never each other.
const SENSOR_GROUPS: InteractionGroups = InteractionGroups::new(Group::GROUP_2, Group::GROUP_1);

pub const DEFAULT_GRAVITY: f32 = -9.81;

struct Slot {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    size: Vec3,
    mass: f32,
    motion: Motion,
}

/// One Rapier world.
///
/// Ray casts see the world as of the last [`step`](PhysicsBackend::step).
pub struct RapierBackend {
    gravity: Vec3,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    queries: QueryPipeline,
    slots: HashMap<BodyHandle, Slot>,
    by_collider: HashMap<ColliderHandle, BodyHandle>,
    /// Bodies with user forces to clear after the next step.
    forced: Vec<RigidBodyHandle>,
    next_handle: u64,
}

impl RapierBackend {
    pub fn new() -> Self {
        Self::with_gravity(Vec3::new(0.0, DEFAULT_GRAVITY, 0.0))
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            queries: QueryPipeline::new(),
            slots: HashMap::new(),
            by_collider: HashMap::new(),
            forced: Vec::new(),
            next_handle: 1,
        }
    }

    fn slot(&self, body: BodyHandle) -> Result<&Slot, SimError> {
        self.slots.get(&body).ok_or(SimError::UnknownBody(body))
    }

    fn insert(&mut self, desc: &BoxDesc, sensor: bool) -> Result<BodyHandle, SimError> {
        desc.validate()?;
        let pose = Isometry3::from_parts(Translation3::from(desc.position), desc.orientation);
        let builder = match desc.motion {
            Motion::Dynamic => RigidBodyBuilder::dynamic(),
            Motion::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            Motion::Fixed => RigidBodyBuilder::fixed(),
        };
        let body = self.bodies.insert(builder.position(pose).build());

        let half = desc.size / 2.0;
        let mut collider = ColliderBuilder::cuboid(half.x, half.y, half.z);
        collider = if sensor {
            collider
                .sensor(true)
                .collision_groups(SENSOR_GROUPS)
                .active_collision_types(ActiveCollisionTypes::all())
        } else {
            collider.collision_groups(SOLID_GROUPS)
        };
        if desc.motion == Motion::Dynamic {
            collider = collider.mass(desc.mass);
        }
        let collider = self
            .colliders
            .insert_with_parent(collider.build(), body, &mut self.bodies);

        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.slots.insert(
            handle,
            Slot {
                body,
                collider,
                size: desc.size,
                mass: desc.mass,
                motion: desc.motion,
            },
        );
        self.by_collider.insert(collider, handle);
        Ok(handle)
    }
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsBackend for RapierBackend {
    fn add_box(&mut self, desc: &BoxDesc) -> Result<BodyHandle, SimError> {
        self.insert(desc, false)
    }

    fn add_sensor_box(&mut self, desc: &BoxDesc) -> Result<BodyHandle, SimError> {
        self.insert(
            &BoxDesc {
                motion: Motion::Fixed,
                ..*desc
            },
            true,
        )
    }

    fn remove(&mut self, body: BodyHandle) -> Result<(), SimError> {
        let slot = self.slots.remove(&body).ok_or(SimError::UnknownBody(body))?;
        self.by_collider.remove(&slot.collider);
        self.forced.retain(|h| *h != slot.body);
        self.bodies.remove(
            slot.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        Ok(())
    }

    fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.queries),
            &(),
            &(),
        );
        for handle in self.forced.drain(..) {
            if let Some(body) = self.bodies.get_mut(handle) {
                body.reset_forces(false);
            }
        }
    }

    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_range: f32) -> bool {
        let Some(dir) = direction.try_normalize(f32::EPSILON) else {
            return false;
        };
        let ray = Ray::new(Point3::from(origin), dir);
        self.queries
            .cast_ray(
                &self.bodies,
                &self.colliders,
                &ray,
                max_range,
                true,
                QueryFilter::default().exclude_sensors(),
            )
            .is_some()
    }

    fn pose(&self, body: BodyHandle) -> Result<(Vec3, Quat), SimError> {
        let slot = self.slot(body)?;
        let rb = self.bodies.get(slot.body).ok_or(SimError::UnknownBody(body))?;
        Ok((*rb.translation(), *rb.rotation()))
    }

    fn set_pose(
        &mut self,
        body: BodyHandle,
        position: Vec3,
        orientation: Quat,
    ) -> Result<(), SimError> {
        let handle = self.slot(body)?.body;
        let rb = self.bodies.get_mut(handle).ok_or(SimError::UnknownBody(body))?;
        rb.set_position(
            Isometry3::from_parts(Translation3::from(position), orientation),
            true,
        );
        Ok(())
    }

    fn velocity(&self, body: BodyHandle) -> Result<(Vec3, Vec3), SimError> {
        let slot = self.slot(body)?;
        let rb = self.bodies.get(slot.body).ok_or(SimError::UnknownBody(body))?;
        Ok((*rb.linvel(), *rb.angvel()))
    }

    fn set_velocity(
        &mut self,
        body: BodyHandle,
        linear: Vec3,
        angular: Vec3,
    ) -> Result<(), SimError> {
        let handle = self.slot(body)?.body;
        let rb = self.bodies.get_mut(handle).ok_or(SimError::UnknownBody(body))?;
        rb.set_linvel(linear, true);
        rb.set_angvel(angular, true);
        Ok(())
    }

    fn mass(&self, body: BodyHandle) -> Result<f32, SimError> {
        let slot = self.slot(body)?;
        Ok(match slot.motion {
            Motion::Dynamic => slot.mass,
            Motion::Kinematic | Motion::Fixed => f32::INFINITY,
        })
    }

    fn size(&self, body: BodyHandle) -> Result<Vec3, SimError> {
        Ok(self.slot(body)?.size)
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3) -> Result<(), SimError> {
        let slot = self.slot(body)?;
        if slot.motion != Motion::Dynamic {
            return Ok(());
        }
        let handle = slot.body;
        let rb = self.bodies.get_mut(handle).ok_or(SimError::UnknownBody(body))?;
        rb.add_force(force, true);
        self.forced.push(handle);
        Ok(())
    }

    fn sensor_overlaps(&self, sensor: BodyHandle) -> Result<Vec<BodyHandle>, SimError> {
        let own = self.slot(sensor)?.collider;
        Ok(self
            .narrow_phase
            .intersection_pairs_with(own)
            .filter(|(_, _, intersecting)| *intersecting)
            .filter_map(|(a, b, _)| {
                let other = if a == own { b } else { a };
                self.by_collider.get(&other).copied()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_box(y: f32) -> BoxDesc {
        BoxDesc {
            position: Vec3::new(0.0, y, 0.0),
            orientation: Quat::identity(),
            size: Vec3::new(1.0, 1.0, 1.0),
            mass: 2.0,
            motion: Motion::Dynamic,
        }
    }

    #[test]
    fn test_step_dynamic_box_falls_under_gravity() {
        let mut backend = RapierBackend::new();
        let body = backend.add_box(&dynamic_box(10.0)).unwrap();

        for _ in 0..10 {
            backend.step(0.05);
        }

        let (pos, _) = backend.pose(body).unwrap();
        let (vel, _) = backend.velocity(body).unwrap();
        assert!(pos.y < 10.0);
        assert!(vel.y < 0.0);
    }

    #[test]
    fn test_mass_kinematic_and_fixed_are_infinite() {
        let mut backend = RapierBackend::new();
        let dynamic = backend.add_box(&dynamic_box(0.0)).unwrap();
        let kinematic = backend
            .add_box(&BoxDesc {
                motion: Motion::Kinematic,
                ..dynamic_box(3.0)
            })
            .unwrap();
        let fixed = backend
            .add_box(&BoxDesc {
                motion: Motion::Fixed,
                ..dynamic_box(-3.0)
            })
            .unwrap();

        assert_eq!(backend.mass(dynamic).unwrap(), 2.0);
        assert_eq!(backend.mass(kinematic).unwrap(), f32::INFINITY);
        assert_eq!(backend.mass(fixed).unwrap(), f32::INFINITY);
    }

    #[test]
    fn test_kinematic_box_ignores_gravity() {
        let mut backend = RapierBackend::new();
        let body = backend
            .add_box(&BoxDesc {
                motion: Motion::Kinematic,
                ..dynamic_box(5.0)
            })
            .unwrap();

        backend.step(0.05);
        backend.step(0.05);

        let (pos, _) = backend.pose(body).unwrap();
        assert_eq!(pos.y, 5.0);
    }

    #[test]
    fn test_cast_ray_hits_solid_and_skips_sensor() {
        let mut backend = RapierBackend::new();
        backend
            .add_sensor_box(&BoxDesc {
                motion: Motion::Fixed,
                ..dynamic_box(0.0)
            })
            .unwrap();
        backend.step(0.01);

        let down = Vec3::new(0.0, -1.0, 0.0);
        assert!(!backend.cast_ray(Vec3::new(0.0, 5.0, 0.0), down, 10.0));

        backend
            .add_box(&BoxDesc {
                motion: Motion::Fixed,
                ..dynamic_box(-2.0)
            })
            .unwrap();
        backend.step(0.01);

        assert!(backend.cast_ray(Vec3::new(0.0, 5.0, 0.0), down, 10.0));
        assert!(!backend.cast_ray(Vec3::new(0.0, 5.0, 0.0), down, 3.0));
        assert!(!backend.cast_ray(Vec3::new(0.0, 5.0, 0.0), Vec3::zeros(), 10.0));
    }

    #[test]
    fn test_sensor_overlaps_reports_dynamic_body_inside() {
        let mut backend = RapierBackend::with_gravity(Vec3::zeros());
        let sensor = backend
            .add_sensor_box(&BoxDesc {
                size: Vec3::new(4.0, 4.0, 4.0),
                ..dynamic_box(0.0)
            })
            .unwrap();
        let inside = backend.add_box(&dynamic_box(0.5)).unwrap();
        let outside = backend.add_box(&dynamic_box(20.0)).unwrap();

        backend.step(0.01);

        let overlaps = backend.sensor_overlaps(sensor).unwrap();
        assert!(overlaps.contains(&inside));
        assert!(!overlaps.contains(&outside));
        assert!(!overlaps.contains(&sensor));
    }

    #[test]
    fn test_remove_then_query_is_unknown_body() {
        let mut backend = RapierBackend::new();
        let body = backend.add_box(&dynamic_box(0.0)).unwrap();
        backend.remove(body).unwrap();

        assert!(matches!(backend.pose(body), Err(SimError::UnknownBody(h)) if h == body));
        assert!(backend.remove(body).is_err());
    }

    #[test]
    fn test_add_box_zero_extent_is_invalid_shape() {
        let mut backend = RapierBackend::new();
        let err = backend
            .add_box(&BoxDesc {
                size: Vec3::new(1.0, 0.0, 1.0),
                ..dynamic_box(0.0)
            })
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidShape(_)));
    }
}
