//! One room: a simulation plus the clients watching it.
//!
//! A room is either **active** or **hibernating**:
//!
//! ```text
//!            no sockets, or idle longer than `timeout`
//!   Active ──────────────────────────────────────────▶ Hibernating
//!     ▲                                                     │
//!     └─────────── any interaction (join, command) ─────────┘
//! ```
//!
//! Hibernating rooms skip their physics step and hold no sockets. The
//! registry drives [`Room::update`] once per tick; everything else is
//! called from session handlers under the room's lock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde_json::{json, Value};
use simforge_protocol::{
    events, BodySnapshot, ClientEvent, QuaternionData, RobotId, RoomId, RoomInfo, SessionId,
    StateUpdate, Vector3Data,
};
use simforge_session::{SessionError, Socket};
use simforge_sim::{
    BodyHandle, BodyState, DroneParams, EntityId, EntityKind, SimulationInstance, Vec3,
    MOTOR_COUNT,
};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::{RemovalReason, RoomConfig, RoomError, RoomEvent};

/// Capacity of each room's event channel. Slow subscribers lag rather
/// than stall the tick.
const EVENT_CHANNEL_SIZE: usize = 256;

/// Hex digits in a generated robot id.
const ROBOT_ID_LEN: usize = 12;

// ---------------------------------------------------------------------------
// RoomOptions
// ---------------------------------------------------------------------------

/// What a client asks for when creating a room.
#[derive(Debug, Clone, Default)]
pub struct RoomOptions {
    pub name: Option<String>,
    pub password: Option<String>,
    pub creator: Option<String>,
    pub environment: String,
}

impl RoomOptions {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Empty passwords are treated as no password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// A remotely controlled drone. Its entity is named after its id.
#[derive(Debug, Clone)]
pub struct Robot {
    id: RobotId,
    entity: EntityId,
    last_command: Instant,
    button: bool,
}

impl Robot {
    pub fn id(&self) -> &RobotId {
        &self.id
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn last_command(&self) -> Instant {
        self.last_command
    }

    /// Last state reported through [`Room::robot_button`].
    pub fn button(&self) -> bool {
        self.button
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

pub struct Room {
    id: RoomId,
    name: String,
    password: Option<String>,
    creator: String,
    environment: String,
    config: RoomConfig,
    sim: SimulationInstance,
    /// Attached sockets in join order.
    sockets: Vec<Arc<Socket>>,
    robots: BTreeMap<RobotId, Robot>,
    hibernating: bool,
    hibernated_at: Option<Instant>,
    expiry_published: bool,
    last_interaction: Instant,
    last_interaction_wall: SystemTime,
    /// Set when the body list changed outside a tick; the next tick
    /// broadcasts `fullUpdate` instead of `update`.
    needs_full_update: bool,
    events: broadcast::Sender<RoomEvent>,
}

impl Room {
    /// Creates an active room with an empty simulation. The environment
    /// populates it afterwards through [`sim_mut`](Self::sim_mut).
    pub fn new(id: RoomId, options: RoomOptions, config: RoomConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            name: options.name.unwrap_or_else(|| id.to_string()),
            id,
            password: options.password,
            creator: options.creator.unwrap_or_default(),
            environment: options.environment,
            config,
            sim: SimulationInstance::default(),
            sockets: Vec::new(),
            robots: BTreeMap::new(),
            hibernating: false,
            hibernated_at: None,
            expiry_published: false,
            last_interaction: Instant::now(),
            last_interaction_wall: SystemTime::now(),
            needs_full_update: false,
            events,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// `true` if the room is open or `given` matches its password.
    pub fn check_password(&self, given: Option<&str>) -> bool {
        match &self.password {
            None => true,
            Some(password) => given == Some(password.as_str()),
        }
    }

    pub fn is_hibernating(&self) -> bool {
        self.hibernating
    }

    /// How long the room has been hibernating, `None` while active.
    pub fn hibernating_for(&self) -> Option<Duration> {
        self.hibernated_at.map(|since| since.elapsed())
    }

    pub fn last_interaction(&self) -> Instant {
        self.last_interaction
    }

    pub fn sim(&self) -> &SimulationInstance {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut SimulationInstance {
        &mut self.sim
    }

    pub fn sockets(&self) -> &[Arc<Socket>] {
        &self.sockets
    }

    pub fn has_socket(&self, session: &SessionId) -> bool {
        self.sockets.iter().any(|s| s.id() == session)
    }

    pub fn robots(&self) -> impl Iterator<Item = &Robot> {
        self.robots.values()
    }

    pub fn robot(&self, id: &RobotId) -> Option<&Robot> {
        self.robots.get(id)
    }

    /// Subscribes to this room's [`RoomEvent`]s from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// The metadata surface listed in `availableRooms`.
    pub fn info(&self) -> RoomInfo {
        let last_interaction_time = self
            .last_interaction_wall
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        RoomInfo {
            room_id: self.id.clone(),
            name: self.name.clone(),
            has_password: self.has_password(),
            environment: self.environment.clone(),
            last_interaction_time,
            hibernating: self.hibernating,
            creator: self.creator.clone(),
            robots: self.robots.keys().cloned().collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Records an interaction and wakes the room if it was hibernating.
    /// Ticking resumes on the next registry tick.
    pub fn touch(&mut self) {
        self.last_interaction = Instant::now();
        self.last_interaction_wall = SystemTime::now();
        if self.hibernating {
            self.hibernating = false;
            self.hibernated_at = None;
            self.expiry_published = false;
            tracing::info!(room_id = %self.id, "room woke up");
            self.publish(RoomEvent::HibernateEnded);
        }
    }

    /// Attaches `socket`, wakes the room and sends it `roomInfo` and a
    /// `fullUpdate`.
    ///
    /// # Errors
    /// [`RoomError::AlreadyInRoom`] if the socket is already attached.
    pub fn join(&mut self, socket: Arc<Socket>) -> Result<(), RoomError> {
        if self.has_socket(socket.id()) {
            return Err(RoomError::AlreadyInRoom(
                socket.id().clone(),
                self.id.clone(),
            ));
        }
        self.touch();

        emit_or_warn(&socket, events::ROOM_INFO, &self.info());
        emit_or_warn(&socket, events::FULL_UPDATE, &self.snapshot(true));

        tracing::info!(
            room_id = %self.id,
            session = %socket.id(),
            sockets = self.sockets.len() + 1,
            "socket joined room"
        );
        self.sockets.push(socket);
        Ok(())
    }

    /// Detaches a socket. Returns `false` if it was not attached.
    pub fn leave(&mut self, session: &SessionId) -> bool {
        let before = self.sockets.len();
        self.sockets.retain(|s| s.id() != session);
        let left = self.sockets.len() != before;
        if left {
            tracing::info!(
                room_id = %self.id,
                %session,
                sockets = self.sockets.len(),
                "socket left room"
            );
        }
        left
    }

    /// Advances the room by one tick.
    ///
    /// An active room with no sockets, or idle longer than `timeout`,
    /// hibernates instead of stepping; the sockets it detached are
    /// returned so the registry can drop their memberships. A hibernating
    /// room only checks whether it has outlived `max_hibernate`.
    ///
    /// # Errors
    /// [`RoomError::Sim`] if the physics step or a robot removal fails.
    pub fn update(&mut self, dt: f32) -> Result<Vec<Arc<Socket>>, RoomError> {
        if self.hibernating {
            self.check_expiry();
            return Ok(Vec::new());
        }
        if self.sockets.is_empty() || self.last_interaction.elapsed() > self.config.timeout {
            return Ok(self.hibernate());
        }

        let removed = self.expire_robots()?;
        self.sim.update(dt)?;
        self.publish_trigger_events();

        let full = std::mem::take(&mut self.needs_full_update) || removed > 0;
        if full {
            self.broadcast(events::FULL_UPDATE, &self.snapshot(true));
        } else {
            self.broadcast(events::UPDATE, &self.snapshot(false));
        }
        Ok(Vec::new())
    }

    /// Suspends the room: detaches every socket (each receives
    /// `roomLeft`) and stops the physics step.
    pub fn hibernate(&mut self) -> Vec<Arc<Socket>> {
        if self.hibernating {
            return Vec::new();
        }
        self.hibernating = true;
        self.hibernated_at = Some(Instant::now());
        self.expiry_published = false;

        let detached = std::mem::take(&mut self.sockets);
        for socket in &detached {
            emit_or_warn(socket, events::ROOM_LEFT, &self.id);
        }
        tracing::info!(room_id = %self.id, detached = detached.len(), "room hibernating");
        self.publish(RoomEvent::HibernateStarted);
        detached
    }

    /// Detaches every socket for good (each receives `forceRefresh`) and
    /// publishes [`RoomEvent::Closed`].
    pub fn close(&mut self) -> Vec<Arc<Socket>> {
        let detached = std::mem::take(&mut self.sockets);
        for socket in &detached {
            emit_or_warn(socket, events::FORCE_REFRESH, &Value::Null);
        }
        tracing::info!(room_id = %self.id, "room closed");
        self.publish(RoomEvent::Closed);
        detached
    }

    fn check_expiry(&mut self) {
        if self.expiry_published {
            return;
        }
        if let Some(hibernating_for) = self.hibernating_for() {
            if hibernating_for > self.config.max_hibernate {
                self.expiry_published = true;
                tracing::debug!(room_id = %self.id, ?hibernating_for, "hibernation expired");
                self.publish(RoomEvent::HibernateExpired { hibernating_for });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Robots
    // -----------------------------------------------------------------------

    /// Spawns a drone robot at `position` under a fresh random id.
    ///
    /// # Errors
    /// - [`RoomError::RobotCapacityExceeded`] at `max_robots`
    /// - [`RoomError::Sim`] if the drone's body cannot be created
    pub fn add_robot(&mut self, position: Vec3) -> Result<RobotId, RoomError> {
        if self.robots.len() >= self.config.max_robots {
            return Err(RoomError::RobotCapacityExceeded(self.id.clone()));
        }
        self.touch();

        let id = loop {
            let candidate = generate_robot_id();
            if !self.robots.contains_key(&candidate) && self.sim.entity_id(&candidate.0).is_none() {
                break candidate;
            }
        };
        let entity = self.sim.spawn_drone(
            &id.0,
            position,
            None,
            DroneParams::default(),
            None,
            Some(json!({ "type": "drone", "robot": id.0 })),
        )?;
        self.robots.insert(
            id.clone(),
            Robot {
                id: id.clone(),
                entity,
                last_command: Instant::now(),
                button: false,
            },
        );
        self.needs_full_update = true;
        tracing::info!(room_id = %self.id, robot = %id, "robot added");
        Ok(id)
    }

    /// Sets raw motor targets and refreshes the robot's keep-alive.
    pub fn command_robot(
        &mut self,
        id: &RobotId,
        targets: [f32; MOTOR_COUNT],
    ) -> Result<(), RoomError> {
        self.touch();
        let robot = self
            .robots
            .get_mut(id)
            .ok_or_else(|| RoomError::RobotNotFound(id.clone()))?;
        robot.last_command = Instant::now();
        let entity = robot.entity;
        self.sim.drone_mut(entity)?.set_motor_targets(targets);
        Ok(())
    }

    pub fn remove_robot(&mut self, id: &RobotId) -> Result<(), RoomError> {
        self.drop_robot(id, RemovalReason::Requested)?;
        self.needs_full_update = true;
        Ok(())
    }

    /// Puts one robot back at its starting pose with motors stopped.
    ///
    /// `id` may also name a drone placed by the environment, which is not
    /// a keep-alive robot.
    pub fn reset_robot(&mut self, id: &RobotId) -> Result<(), RoomError> {
        self.touch();
        let entity = match self.robots.get(id) {
            Some(robot) => robot.entity(),
            None => self
                .sim
                .entity_id(&id.0)
                .filter(|&e| self.sim.entity(e).is_some_and(|e| e.as_drone().is_some()))
                .ok_or_else(|| RoomError::RobotNotFound(id.clone()))?,
        };
        self.sim.reset_entity(entity)?;
        Ok(())
    }

    /// Resets every drone and trigger in the room.
    pub fn reset_all(&mut self) -> Result<(), RoomError> {
        self.touch();
        let resettable: Vec<EntityId> = self
            .sim
            .entities()
            .filter(|e| matches!(e.kind(), EntityKind::Drone(_) | EntityKind::Trigger(_)))
            .map(|e| e.id())
            .collect();
        for entity in resettable {
            self.sim.reset_entity(entity)?;
        }
        tracing::debug!(room_id = %self.id, "room reset");
        Ok(())
    }

    pub fn robot_button(&mut self, id: &RobotId, pressed: bool) -> Result<(), RoomError> {
        self.touch();
        let robot = self
            .robots
            .get_mut(id)
            .ok_or_else(|| RoomError::RobotNotFound(id.clone()))?;
        robot.button = pressed;
        self.publish(RoomEvent::RobotButton {
            robot: id.clone(),
            pressed,
        });
        Ok(())
    }

    /// Forwards an opaque client event to subscribers.
    pub fn client_event(&mut self, session: &SessionId, event: ClientEvent) {
        self.touch();
        tracing::debug!(room_id = %self.id, %session, kind = %event.kind, "client event");
        self.publish(RoomEvent::ClientEvent {
            session: session.clone(),
            event,
        });
    }

    /// Removes robots whose keep-alive lapsed. Returns how many went.
    fn expire_robots(&mut self) -> Result<usize, RoomError> {
        let keep_alive = self.config.robot_keep_alive;
        let dead: Vec<RobotId> = self
            .robots
            .values()
            .filter(|r| r.last_command.elapsed() > keep_alive)
            .map(|r| r.id.clone())
            .collect();
        for id in &dead {
            tracing::warn!(room_id = %self.id, robot = %id, "robot keep-alive expired");
            self.drop_robot(id, RemovalReason::KeepAliveExpired)?;
        }
        Ok(dead.len())
    }

    fn drop_robot(&mut self, id: &RobotId, reason: RemovalReason) -> Result<(), RoomError> {
        let robot = self
            .robots
            .remove(id)
            .ok_or_else(|| RoomError::RobotNotFound(id.clone()))?;
        self.sim.remove_entity(robot.entity)?;
        self.publish(RoomEvent::RobotRemoved {
            robot: id.clone(),
            reason,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Broadcast
    // -----------------------------------------------------------------------

    /// State of every body. `full` adds statics, sizes and visual info.
    pub fn snapshot(&self, full: bool) -> StateUpdate {
        let mut bodies = BTreeMap::new();
        for (name, handle) in self.sim.dynamic_bodies() {
            if let Some(body) = self.body_snapshot(handle, full, true) {
                bodies.insert(name.to_string(), body);
            }
        }
        if full {
            for (name, handle) in self.sim.static_bodies() {
                if let Some(body) = self.body_snapshot(handle, true, false) {
                    bodies.insert(name.to_string(), body);
                }
            }
        }
        StateUpdate {
            time: self.sim.time(),
            bodies,
        }
    }

    fn body_snapshot(&self, handle: BodyHandle, full: bool, moving: bool) -> Option<BodySnapshot> {
        let state = match self.sim.body_state(handle) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(room_id = %self.id, %err, "body vanished during snapshot");
                return None;
            }
        };
        Some(BodySnapshot {
            pos: vector(state.position),
            rot: quaternion(&state),
            vel: moving.then(|| vector(state.linear_velocity)),
            size: full.then(|| vector(state.size)),
            visual_info: if full {
                self.sim.visual_info(handle).cloned()
            } else {
                None
            },
        })
    }

    fn broadcast(&self, event: &str, data: &StateUpdate) {
        for socket in &self.sockets {
            emit_or_warn(socket, event, data);
        }
    }

    fn publish_trigger_events(&mut self) {
        for event in self.sim.drain_events() {
            let name_of = |id: EntityId| {
                self.sim
                    .entity(id)
                    .map(|e| e.name().to_string())
                    .unwrap_or_else(|| id.to_string())
            };
            let trigger = name_of(event.trigger);
            let entity = event.entity.map(name_of);
            tracing::trace!(room_id = %self.id, %trigger, edge = ?event.edge, ?entity, "trigger");
            self.publish(RoomEvent::Trigger {
                trigger,
                edge: event.edge,
                entity,
            });
        }
    }

    fn publish(&self, event: RoomEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("environment", &self.environment)
            .field("hibernating", &self.hibernating)
            .field("sockets", &self.sockets.len())
            .field("robots", &self.robots.len())
            .finish_non_exhaustive()
    }
}

fn emit_or_warn<T: serde::Serialize + ?Sized>(socket: &Socket, event: &str, data: &T) {
    match socket.emit(event, data) {
        Ok(()) => {}
        // The next tick carries fresher state anyway.
        Err(SessionError::Backlogged(_)) => {
            tracing::debug!(session = %socket.id(), event, "edge backlogged, frame dropped");
        }
        Err(err) => tracing::warn!(session = %socket.id(), event, %err, "emit failed"),
    }
}

fn generate_robot_id() -> RobotId {
    let bits: u64 = rand::rng().random();
    RobotId(format!("{:0width$x}", bits >> (64 - 4 * ROBOT_ID_LEN), width = ROBOT_ID_LEN))
}

fn vector(v: Vec3) -> Vector3Data {
    Vector3Data {
        x: v.x,
        y: v.y,
        z: v.z,
    }
}

fn quaternion(state: &BodyState) -> QuaternionData {
    let q = state.orientation.coords;
    QuaternionData {
        x: q.x,
        y: q.y,
        z: q.z,
        w: q.w,
    }
}
