//! Integration tests for `SimulationInstance`.
//!
//! Most tests run on the Rapier backend. Ordering and backend-capability
//! tests use `RecordingBackend`, an in-memory backend that logs calls and
//! cannot create sensors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use simforge_sim::{
    BodyHandle, BoxDesc, BoxSpec, DroneParams, EntityBehavior, EntityKind, PhysicsBackend, Quat,
    RapierBackend, SimBody, SimError, SimulationInstance, TriggerEdge, Vec3, DEFAULT_GRAVITY,
    MOTOR_COUNT,
};

// =========================================================================
// Helpers
// =========================================================================

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct RecordingBackend {
    log: Log,
    bodies: HashMap<BodyHandle, (BoxDesc, Vec3, Vec3)>,
    next: u64,
}

impl RecordingBackend {
    fn body(&self, h: BodyHandle) -> Result<&(BoxDesc, Vec3, Vec3), SimError> {
        self.bodies.get(&h).ok_or(SimError::UnknownBody(h))
    }
}

impl PhysicsBackend for RecordingBackend {
    fn add_box(&mut self, desc: &BoxDesc) -> Result<BodyHandle, SimError> {
        desc.validate()?;
        self.next += 1;
        let h = BodyHandle(self.next);
        self.bodies.insert(h, (*desc, Vec3::zeros(), Vec3::zeros()));
        Ok(h)
    }

    fn remove(&mut self, body: BodyHandle) -> Result<(), SimError> {
        self.bodies.remove(&body).map(|_| ()).ok_or(SimError::UnknownBody(body))
    }

    fn step(&mut self, dt: f32) {
        self.log.lock().unwrap().push(format!("step {dt}"));
    }

    fn cast_ray(&self, _origin: Vec3, _direction: Vec3, _max_range: f32) -> bool {
        false
    }

    fn pose(&self, body: BodyHandle) -> Result<(Vec3, Quat), SimError> {
        let (desc, _, _) = self.body(body)?;
        Ok((desc.position, desc.orientation))
    }

    fn set_pose(
        &mut self,
        body: BodyHandle,
        position: Vec3,
        orientation: Quat,
    ) -> Result<(), SimError> {
        let entry = self.bodies.get_mut(&body).ok_or(SimError::UnknownBody(body))?;
        entry.0.position = position;
        entry.0.orientation = orientation;
        Ok(())
    }

    fn velocity(&self, body: BodyHandle) -> Result<(Vec3, Vec3), SimError> {
        let (_, lin, ang) = self.body(body)?;
        Ok((*lin, *ang))
    }

    fn set_velocity(
        &mut self,
        body: BodyHandle,
        linear: Vec3,
        angular: Vec3,
    ) -> Result<(), SimError> {
        let entry = self.bodies.get_mut(&body).ok_or(SimError::UnknownBody(body))?;
        entry.1 = linear;
        entry.2 = angular;
        Ok(())
    }

    fn mass(&self, body: BodyHandle) -> Result<f32, SimError> {
        Ok(self.body(body)?.0.mass)
    }

    fn size(&self, body: BodyHandle) -> Result<Vec3, SimError> {
        Ok(self.body(body)?.0.size)
    }

    fn apply_force(&mut self, body: BodyHandle, _force: Vec3) -> Result<(), SimError> {
        self.body(body).map(|_| ())
    }

    fn sensor_overlaps(&self, sensor: BodyHandle) -> Result<Vec<BodyHandle>, SimError> {
        Err(SimError::UnknownBody(sensor))
    }
}

/// Logs its name every tick.
struct Tagger {
    name: &'static str,
    log: Log,
}

impl EntityBehavior for Tagger {
    fn update(&mut self, body: &mut SimBody<'_>, _dt: f32) -> Result<(), SimError> {
        body.position()?;
        self.log.lock().unwrap().push(format!("update {}", self.name));
        Ok(())
    }
}

fn zero_gravity() -> SimulationInstance {
    SimulationInstance::new(Box::new(RapierBackend::with_gravity(Vec3::zeros())))
}

fn unit_box(position: Vec3) -> BoxSpec {
    BoxSpec::new(position, Vec3::new(0.5, 0.5, 0.5))
}

// =========================================================================
// Bodies
// =========================================================================

#[test]
fn test_create_box_duplicate_name_is_rejected() {
    let mut sim = SimulationInstance::default();
    sim.create_box("a", Vec3::zeros(), None, 1.0, 1.0, 1.0, 1.0, false)
        .unwrap();

    let err = sim
        .create_static_box("a", Vec3::zeros(), None, 1.0, 1.0, 1.0)
        .unwrap_err();
    assert!(matches!(err, SimError::DuplicateName(name) if name == "a"));
}

#[test]
fn test_create_box_kinematic_has_infinite_mass() {
    let mut sim = SimulationInstance::default();
    sim.create_box("k", Vec3::zeros(), None, 1.0, 2.0, 3.0, 5.0, true)
        .unwrap();

    let body = sim.body("k").unwrap();
    assert_eq!(body.mass().unwrap(), f32::INFINITY);
    assert_eq!(body.size().unwrap(), Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_create_static_box_is_exposed_as_static_view() {
    let mut sim = SimulationInstance::default();
    sim.create_static_box("wall", Vec3::new(1.0, 2.0, 3.0), None, 1.0, 1.0, 1.0)
        .unwrap();

    assert!(sim.body("wall").is_none());
    let wall = sim.static_body("wall").unwrap();
    assert_eq!(wall.position().unwrap(), Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_set_position_wakes_sleeping_body() {
    let mut sim = SimulationInstance::default();
    sim.create_static_box("floor", Vec3::new(0.0, -0.1, 0.0), None, 20.0, 0.2, 20.0)
        .unwrap();
    sim.create_box("crate", Vec3::new(0.0, 0.5, 0.0), None, 1.0, 1.0, 1.0, 1.0, false)
        .unwrap();
    // Long enough for the crate to come to rest and fall asleep.
    for _ in 0..400 {
        sim.update(0.05).unwrap();
    }

    sim.body("crate")
        .unwrap()
        .set_position(Vec3::new(0.0, 5.0, 0.0))
        .unwrap();
    for _ in 0..5 {
        sim.update(0.05).unwrap();
    }

    let y = sim.body("crate").unwrap().position().unwrap().y;
    assert!(y < 5.0 && y > 1.0, "y = {y}");
}

#[test]
fn test_apply_force_on_kinematic_box_has_no_effect() {
    let mut sim = SimulationInstance::default();
    sim.create_box("k", Vec3::new(5.0, 5.0, 0.0), None, 1.0, 1.0, 1.0, 1.0, true)
        .unwrap();

    for _ in 0..10 {
        sim.body("k")
            .unwrap()
            .apply_force(Vec3::new(100.0, 0.0, 0.0))
            .unwrap();
        sim.update(0.05).unwrap();
    }

    let body = sim.body("k").unwrap();
    assert_eq!(body.position().unwrap(), Vec3::new(5.0, 5.0, 0.0));
    assert_eq!(body.linear_velocity().unwrap(), Vec3::zeros());
}

#[test]
fn test_update_non_positive_dt_is_noop() {
    let log = Log::default();
    let backend = RecordingBackend {
        log: Arc::clone(&log),
        ..Default::default()
    };
    let mut sim = SimulationInstance::new(Box::new(backend));

    sim.update(0.0).unwrap();
    sim.update(-1.0).unwrap();
    sim.update(f32::NAN).unwrap();

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(sim.time(), 0.0);
}

#[test]
fn test_update_steps_world_before_entities_in_stable_order() {
    let log = Log::default();
    let backend = RecordingBackend {
        log: Arc::clone(&log),
        ..Default::default()
    };
    let mut sim = SimulationInstance::new(Box::new(backend));
    for name in ["first", "second", "third"] {
        let tagger = Tagger {
            name,
            log: Arc::clone(&log),
        };
        sim.spawn_dynamic(name, unit_box(Vec3::zeros()), Some(Box::new(tagger)), None)
            .unwrap();
    }

    sim.update(0.5).unwrap();
    sim.update(0.5).unwrap();

    let expected: Vec<String> = ["step 0.5", "update first", "update second", "update third"]
        .iter()
        .cycle()
        .take(8)
        .map(|s| s.to_string())
        .collect();
    assert_eq!(*log.lock().unwrap(), expected);
    assert_eq!(sim.time(), 1.0);
}

#[test]
fn test_ray_cast_hits_static_floor() {
    let mut sim = SimulationInstance::default();
    sim.spawn_static(
        "floor",
        BoxSpec::new(Vec3::zeros(), Vec3::new(10.0, 0.2, 10.0)),
        None,
    )
    .unwrap();
    sim.update(0.01).unwrap();

    let down = Vec3::new(0.0, -1.0, 0.0);
    assert!(sim.ray_cast(Vec3::new(0.0, 3.0, 0.0), down, 5.0));
    assert!(!sim.ray_cast(Vec3::new(0.0, 3.0, 0.0), down, 1.0));
    assert!(!sim.ray_cast(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 5.0));
}

// =========================================================================
// Entities
// =========================================================================

#[test]
fn test_spawn_trigger_on_backend_without_sensors_is_unsupported() {
    let mut sim = SimulationInstance::new(Box::new(RecordingBackend::default()));

    let err = sim
        .spawn_trigger("zone", unit_box(Vec3::zeros()), false, None)
        .unwrap_err();

    assert!(matches!(err, SimError::UnsupportedByBackend(_)));
    assert_eq!(sim.entity_count(), 0);
    assert!(sim.static_body("zone").is_none());
}

#[test]
fn test_trigger_reports_enter_then_exit_and_empty() {
    let mut sim = zero_gravity();
    let zone = sim
        .spawn_trigger("zone", BoxSpec::new(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0)), false, None)
        .unwrap();
    let crate_id = sim
        .spawn_dynamic("crate", unit_box(Vec3::zeros()), None, None)
        .unwrap();

    sim.update(0.05).unwrap();
    let entered = sim.drain_events();
    assert!(entered
        .iter()
        .any(|e| e.trigger == zone && e.edge == TriggerEdge::Enter && e.entity == Some(crate_id)));
    assert!(entered.iter().all(|e| e.entity != Some(zone)));

    sim.body("crate")
        .unwrap()
        .set_position(Vec3::new(50.0, 0.0, 0.0))
        .unwrap();
    sim.update(0.05).unwrap();
    let left: Vec<TriggerEdge> = sim.drain_events().iter().map(|e| e.edge).collect();
    assert_eq!(left, vec![TriggerEdge::Exit, TriggerEdge::Empty]);
}

#[test]
fn test_remove_entity_releases_body_and_name() {
    let mut sim = zero_gravity();
    let id = sim
        .spawn_dynamic(
            "crate",
            unit_box(Vec3::zeros()),
            None,
            Some(serde_json::json!({"color": "red"})),
        )
        .unwrap();
    let body = sim.entity(id).unwrap().body();
    assert_eq!(sim.visual_info(body).unwrap()["color"], "red");

    let removed = sim.remove_entity(id).unwrap();

    assert_eq!(removed.name(), "crate");
    assert!(sim.entity_id("crate").is_none());
    assert!(matches!(sim.body_state(body), Err(SimError::UnknownBody(_))));
    // The name can be reused.
    sim.spawn_dynamic("crate", unit_box(Vec3::zeros()), None, None)
        .unwrap();
}

// =========================================================================
// Drones
// =========================================================================

#[test]
fn test_drone_at_hover_speed_holds_altitude() {
    let mut sim = SimulationInstance::default();
    let params = DroneParams::default();
    let hover = params.hover_speed(DEFAULT_GRAVITY);
    let id = sim
        .spawn_drone("d1", Vec3::new(0.0, 5.0, 0.0), None, params, None, None)
        .unwrap();
    sim.drone_mut(id).unwrap().set_motor_targets([hover; MOTOR_COUNT]);

    for _ in 0..20 {
        sim.update(0.05).unwrap();
    }

    let body = sim.entity(id).unwrap().body();
    let state = sim.body_state(body).unwrap();
    assert!(state.linear_velocity.y.abs() < 0.05, "vy = {}", state.linear_velocity.y);
    // Gravity acts one step ahead of the thrust, so the drone sinks by
    // g·dt² per tick; free fall over the same second would drop ~4.9 m.
    assert!(state.position.y > 4.0, "y = {}", state.position.y);
}

#[test]
fn test_drone_without_thrust_falls() {
    let mut sim = SimulationInstance::default();
    let id = sim
        .spawn_drone("d1", Vec3::new(0.0, 5.0, 0.0), None, DroneParams::default(), None, None)
        .unwrap();

    for _ in 0..10 {
        sim.update(0.05).unwrap();
    }

    let body = sim.entity(id).unwrap().body();
    assert!(sim.body_state(body).unwrap().position.y < 5.0);
}

#[test]
fn test_reset_entity_returns_drone_to_start() {
    let mut sim = SimulationInstance::default();
    let start = Vec3::new(1.0, 5.0, -1.0);
    let id = sim
        .spawn_drone("d1", start, None, DroneParams::default(), None, None)
        .unwrap();
    sim.drone_mut(id).unwrap().set_motor_targets([800.0, 200.0, 800.0, 200.0]);
    for _ in 0..10 {
        sim.update(0.05).unwrap();
    }

    sim.reset_entity(id).unwrap();

    let entity = sim.entity(id).unwrap();
    let drone = entity.as_drone().unwrap();
    assert_eq!(drone.motor_speeds(), [0.0; MOTOR_COUNT]);
    assert_eq!(drone.motor_targets(), [0.0; MOTOR_COUNT]);
    let state = sim.body_state(entity.body()).unwrap();
    assert_eq!(state.position, start);
    assert_eq!(state.linear_velocity, Vec3::zeros());
    assert_eq!(state.angular_velocity, Vec3::zeros());
    assert!(matches!(entity.kind(), EntityKind::Drone(_)));
}

#[test]
fn test_drone_mut_on_non_drone_is_unknown_entity() {
    let mut sim = SimulationInstance::default();
    let id = sim
        .spawn_static("floor", unit_box(Vec3::zeros()), None)
        .unwrap();
    assert!(matches!(sim.drone_mut(id), Err(SimError::UnknownEntity(_))));
}
