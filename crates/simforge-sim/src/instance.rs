//! One physics world and everything living in it.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::{
    BodyHandle, BodyState, BoxDesc, ControlPolicy, Drone, DroneParams, Entity, EntityBehavior,
    EntityId, EntityKind, Motion, PhysicsBackend, Quat, RapierBackend, SimBody, SimError,
    SimStatic, Trigger, TriggerEvent, Vec3,
};

/// Placement and shape of a box-shaped entity.
#[derive(Debug, Clone, Copy)]
pub struct BoxSpec {
    pub position: Vec3,
    pub orientation: Option<Quat>,
    /// Width, height, depth.
    pub size: Vec3,
    pub mass: f32,
    pub kinematic: bool,
}

impl BoxSpec {
    pub fn new(position: Vec3, size: Vec3) -> Self {
        Self {
            position,
            orientation: None,
            size,
            mass: 1.0,
            kinematic: false,
        }
    }

    pub fn orientation(mut self, orientation: Quat) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn kinematic(mut self) -> Self {
        self.kinematic = true;
        self
    }
}

/// Owns a physics backend, the name registry of its bodies, and the entity
/// arena.
///
/// Body names are unique across dynamic and static bodies; an entity
/// shares the name of the body it owns.
pub struct SimulationInstance {
    backend: Box<dyn PhysicsBackend>,
    bodies: BTreeMap<String, BodyHandle>,
    statics: BTreeMap<String, BodyHandle>,
    entities: BTreeMap<EntityId, Entity>,
    names: HashMap<String, EntityId>,
    owners: HashMap<BodyHandle, EntityId>,
    events: Vec<TriggerEvent>,
    next_entity: u32,
    time: f64,
}

impl SimulationInstance {
    pub fn new(backend: Box<dyn PhysicsBackend>) -> Self {
        Self {
            backend,
            bodies: BTreeMap::new(),
            statics: BTreeMap::new(),
            entities: BTreeMap::new(),
            names: HashMap::new(),
            owners: HashMap::new(),
            events: Vec::new(),
            next_entity: 0,
            time: 0.0,
        }
    }

    // -----------------------------------------------------------------------
    // Bodies
    // -----------------------------------------------------------------------

    /// Creates a movable box. Kinematic boxes have infinite mass and move
    /// only when their pose or velocity is set.
    #[allow(clippy::too_many_arguments)]
    pub fn create_box(
        &mut self,
        name: &str,
        position: Vec3,
        orientation: Option<Quat>,
        width: f32,
        height: f32,
        depth: f32,
        mass: f32,
        kinematic: bool,
    ) -> Result<BodyHandle, SimError> {
        self.ensure_free(name)?;
        let handle = self.backend.add_box(&BoxDesc {
            position,
            orientation: orientation.unwrap_or_else(Quat::identity),
            size: Vec3::new(width, height, depth),
            mass,
            motion: if kinematic {
                Motion::Kinematic
            } else {
                Motion::Dynamic
            },
        })?;
        self.bodies.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Creates an immovable box.
    pub fn create_static_box(
        &mut self,
        name: &str,
        position: Vec3,
        orientation: Option<Quat>,
        width: f32,
        height: f32,
        depth: f32,
    ) -> Result<BodyHandle, SimError> {
        self.ensure_free(name)?;
        let handle = self.backend.add_box(&BoxDesc {
            position,
            orientation: orientation.unwrap_or_else(Quat::identity),
            size: Vec3::new(width, height, depth),
            mass: 0.0,
            motion: Motion::Fixed,
        })?;
        self.statics.insert(name.to_string(), handle);
        Ok(handle)
    }

    fn create_sensor_box(&mut self, name: &str, spec: &BoxSpec) -> Result<BodyHandle, SimError> {
        self.ensure_free(name)?;
        let handle = self.backend.add_sensor_box(&BoxDesc {
            position: spec.position,
            orientation: spec.orientation.unwrap_or_else(Quat::identity),
            size: spec.size,
            mass: 0.0,
            motion: Motion::Fixed,
        })?;
        self.statics.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Removes a body by name, together with the entity owning it.
    pub fn remove_body(&mut self, name: &str) -> Result<(), SimError> {
        if let Some(&id) = self.names.get(name) {
            self.remove_entity(id)?;
            return Ok(());
        }
        let handle = self
            .bodies
            .remove(name)
            .or_else(|| self.statics.remove(name))
            .ok_or_else(|| SimError::UnknownEntity(name.to_string()))?;
        self.backend.remove(handle)
    }

    pub fn body(&mut self, name: &str) -> Option<SimBody<'_>> {
        let handle = *self.bodies.get(name)?;
        Some(SimBody::new(self.backend.as_mut(), handle))
    }

    pub fn static_body(&self, name: &str) -> Option<SimStatic<'_>> {
        let handle = *self.statics.get(name)?;
        Some(SimStatic::new(self.backend.as_ref(), handle))
    }

    pub fn body_state(&self, body: BodyHandle) -> Result<BodyState, SimError> {
        BodyState::read(self.backend.as_ref(), body)
    }

    /// Dynamic and kinematic bodies, by name.
    pub fn dynamic_bodies(&self) -> impl Iterator<Item = (&str, BodyHandle)> {
        self.bodies.iter().map(|(name, h)| (name.as_str(), *h))
    }

    /// Static bodies and trigger volumes, by name.
    pub fn static_bodies(&self) -> impl Iterator<Item = (&str, BodyHandle)> {
        self.statics.iter().map(|(name, h)| (name.as_str(), *h))
    }

    /// Visual descriptor of the entity owning `body`, if any.
    pub fn visual_info(&self, body: BodyHandle) -> Option<&Value> {
        let id = self.owners.get(&body)?;
        self.entities.get(id)?.visual_info()
    }

    fn ensure_free(&self, name: &str) -> Result<(), SimError> {
        if self.bodies.contains_key(name) || self.statics.contains_key(name) {
            return Err(SimError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub fn spawn_static(
        &mut self,
        name: &str,
        spec: BoxSpec,
        visual_info: Option<Value>,
    ) -> Result<EntityId, SimError> {
        let size = spec.size;
        let body = self.create_static_box(
            name,
            spec.position,
            spec.orientation,
            size.x,
            size.y,
            size.z,
        )?;
        Ok(self.insert_entity(name, body, visual_info, EntityKind::Static))
    }

    pub fn spawn_dynamic(
        &mut self,
        name: &str,
        spec: BoxSpec,
        behavior: Option<Box<dyn EntityBehavior>>,
        visual_info: Option<Value>,
    ) -> Result<EntityId, SimError> {
        let size = spec.size;
        let body = self.create_box(
            name,
            spec.position,
            spec.orientation,
            size.x,
            size.y,
            size.z,
            spec.mass,
            spec.kinematic,
        )?;
        Ok(self.insert_entity(name, body, visual_info, EntityKind::Dynamic(behavior)))
    }

    /// Creates a non-solid overlap volume.
    ///
    /// # Errors
    /// [`SimError::UnsupportedByBackend`] if the backend cannot report
    /// overlaps; nothing is created in that case.
    pub fn spawn_trigger(
        &mut self,
        name: &str,
        spec: BoxSpec,
        one_time: bool,
        visual_info: Option<Value>,
    ) -> Result<EntityId, SimError> {
        let body = self.create_sensor_box(name, &spec)?;
        let id = EntityId(self.next_entity);
        Ok(self.insert_entity(
            name,
            body,
            visual_info,
            EntityKind::Trigger(Trigger::new(id, one_time)),
        ))
    }

    pub fn spawn_drone(
        &mut self,
        name: &str,
        position: Vec3,
        orientation: Option<Quat>,
        params: DroneParams,
        policy: Option<Box<dyn ControlPolicy>>,
        visual_info: Option<Value>,
    ) -> Result<EntityId, SimError> {
        let orientation = orientation.unwrap_or_else(Quat::identity);
        let size = params.size();
        let body = self.create_box(
            name,
            position,
            Some(orientation),
            size.x,
            size.y,
            size.z,
            params.mass,
            false,
        )?;
        let mut drone = Drone::new(params, position, orientation);
        if let Some(policy) = policy {
            drone = drone.with_policy(policy);
        }
        Ok(self.insert_entity(name, body, visual_info, EntityKind::Drone(Box::new(drone))))
    }

    fn insert_entity(
        &mut self,
        name: &str,
        body: BodyHandle,
        visual_info: Option<Value>,
        kind: EntityKind,
    ) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        tracing::trace!(%id, name, kind = kind.label(), "entity created");
        self.names.insert(name.to_string(), id);
        self.owners.insert(body, id);
        self.entities.insert(
            id,
            Entity {
                id,
                name: name.to_string(),
                body,
                visual_info,
                kind,
            },
        );
        id
    }

    /// Removes an entity and releases its body. Triggers forget it without
    /// firing `Exit`.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity, SimError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        self.names.remove(&entity.name);
        self.owners.remove(&entity.body);
        self.bodies.remove(&entity.name);
        self.statics.remove(&entity.name);
        for other in self.entities.values_mut() {
            if let EntityKind::Trigger(trigger) = &mut other.kind {
                trigger.forget(id);
            }
        }
        self.backend.remove(entity.body)?;
        tracing::trace!(%id, name = %entity.name, "entity removed");
        Ok(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    /// Every entity, in update order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn drone_mut(&mut self, id: EntityId) -> Result<&mut Drone, SimError> {
        self.entities
            .get_mut(&id)
            .and_then(Entity::as_drone_mut)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))
    }

    /// Resets drones to their creation pose and triggers to empty. Other
    /// entities are left alone.
    pub fn reset_entity(&mut self, id: EntityId) -> Result<(), SimError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        match &mut entity.kind {
            EntityKind::Drone(drone) => {
                drone.reset(&mut SimBody::new(self.backend.as_mut(), entity.body))
            }
            EntityKind::Trigger(trigger) => {
                trigger.reset(&mut self.events);
                Ok(())
            }
            EntityKind::Static | EntityKind::Dynamic(_) => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Stepping and queries
    // -----------------------------------------------------------------------

    /// Steps the world by `dt`, feeds this step's overlaps to every
    /// trigger, then updates each entity once in id order.
    ///
    /// Does nothing when `dt` is not positive.
    pub fn update(&mut self, dt: f32) -> Result<(), SimError> {
        if dt.is_nan() || dt <= 0.0 {
            return Ok(());
        }
        self.backend.step(dt);
        self.time += f64::from(dt);

        for entity in self.entities.values_mut() {
            if let EntityKind::Trigger(trigger) = &mut entity.kind {
                for other in self.backend.sensor_overlaps(entity.body)? {
                    if let Some(&other_id) = self.owners.get(&other) {
                        trigger.entity_inside(other_id);
                    }
                }
            }
        }

        let backend = self.backend.as_mut();
        for entity in self.entities.values_mut() {
            let body = entity.body;
            match &mut entity.kind {
                EntityKind::Static => {}
                EntityKind::Dynamic(None) => {}
                EntityKind::Dynamic(Some(behavior)) => {
                    behavior.update(&mut SimBody::new(&mut *backend, body), dt)?;
                }
                EntityKind::Trigger(trigger) => trigger.update(&mut self.events),
                EntityKind::Drone(drone) => {
                    drone.update(&mut SimBody::new(&mut *backend, body), dt)?;
                }
            }
        }
        Ok(())
    }

    /// Hit test against every solid body. Sees the world as of the last
    /// step.
    pub fn ray_cast(&self, origin: Vec3, direction: Vec3, max_range: f32) -> bool {
        self.backend.cast_ray(origin, direction, max_range)
    }

    /// Trigger events produced since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<TriggerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Total simulated seconds.
    pub fn time(&self) -> f64 {
        self.time
    }
}

impl Default for SimulationInstance {
    fn default() -> Self {
        Self::new(Box::new(RapierBackend::new()))
    }
}

impl std::fmt::Debug for SimulationInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationInstance")
            .field("bodies", &self.bodies.len())
            .field("statics", &self.statics.len())
            .field("entities", &self.entities.len())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}
