//! Environments: the initial layout of a room.
//!
//! An environment only talks to the room's [`SimulationInstance`] through
//! the public entity API. Setup runs to completion before the registry
//! hands the room out, so no socket ever sees a half-built world.
//!
//! [`SimulationInstance`]: simforge_sim::SimulationInstance

use std::sync::Arc;

use serde_json::json;
use simforge_protocol::EnvironmentEntry;
use simforge_sim::{BoxSpec, DroneParams, Vec3};

use crate::{Room, RoomError};

/// A named room layout.
pub trait Environment: Send + Sync {
    /// Stable identifier clients pass to `joinRoom`.
    fn id(&self) -> &str;

    /// Display name.
    fn name(&self) -> &str;

    /// Populates a freshly created room.
    fn setup(&self, room: &mut Room) -> Result<(), RoomError>;
}

/// The environments a registry can create rooms from, in listing order.
#[derive(Clone)]
pub struct EnvironmentCatalog {
    environments: Vec<Arc<dyn Environment>>,
}

impl EnvironmentCatalog {
    /// A catalog with no environments at all.
    pub fn empty() -> Self {
        Self {
            environments: Vec::new(),
        }
    }

    /// Adds `environment`, replacing any with the same id in place.
    pub fn register(&mut self, environment: Arc<dyn Environment>) {
        match self
            .environments
            .iter_mut()
            .find(|e| e.id() == environment.id())
        {
            Some(slot) => *slot = environment,
            None => self.environments.push(environment),
        }
    }

    pub fn with(mut self, environment: Arc<dyn Environment>) -> Self {
        self.register(environment);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Environment>> {
        self.environments.iter().find(|e| e.id() == id).cloned()
    }

    /// The `availableEnvironments` payload.
    pub fn entries(&self) -> Vec<EnvironmentEntry> {
        self.environments
            .iter()
            .map(|e| EnvironmentEntry {
                id: e.id().to_string(),
                name: e.name().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

/// The built-in environments.
impl Default for EnvironmentCatalog {
    fn default() -> Self {
        Self::empty()
            .with(Arc::new(DefaultEnvironment))
            .with(Arc::new(EmptyEnvironment))
    }
}

impl std::fmt::Debug for EnvironmentCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.environments.iter().map(|e| e.id()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// A floor and one free-standing drone.
#[derive(Debug, Clone, Copy)]
pub struct DefaultEnvironment;

impl Environment for DefaultEnvironment {
    fn id(&self) -> &str {
        "default"
    }

    fn name(&self) -> &str {
        "Default"
    }

    fn setup(&self, room: &mut Room) -> Result<(), RoomError> {
        spawn_floor(room)?;
        let params = DroneParams::default();
        let resting = params.size().y / 2.0 + 0.01;
        room.sim_mut().spawn_drone(
            "drone",
            Vec3::new(0.0, resting, 0.0),
            None,
            params,
            None,
            Some(json!({ "type": "drone" })),
        )?;
        Ok(())
    }
}

/// Just the floor.
#[derive(Debug, Clone, Copy)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn id(&self) -> &str {
        "empty"
    }

    fn name(&self) -> &str {
        "Empty"
    }

    fn setup(&self, room: &mut Room) -> Result<(), RoomError> {
        spawn_floor(room)
    }
}

/// 20 m square slab whose top face is at y = 0.
fn spawn_floor(room: &mut Room) -> Result<(), RoomError> {
    room.sim_mut().spawn_static(
        "floor",
        BoxSpec::new(Vec3::new(0.0, -0.1, 0.0), Vec3::new(20.0, 0.2, 20.0)),
        Some(json!({ "type": "floor", "color": "#7f8c8d" })),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoomConfig, RoomOptions};
    use simforge_protocol::RoomId;

    struct Named(&'static str, &'static str);

    impl Environment for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn name(&self) -> &str {
            self.1
        }

        fn setup(&self, _room: &mut Room) -> Result<(), RoomError> {
            Ok(())
        }
    }

    #[test]
    fn test_catalog_default_lists_builtins_in_order() {
        let ids: Vec<String> = EnvironmentCatalog::default()
            .entries()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, ["default", "empty"]);
    }

    #[test]
    fn test_catalog_register_same_id_replaces_in_place() {
        let mut catalog = EnvironmentCatalog::default();
        catalog.register(Arc::new(Named("default", "Renamed")));
        catalog.register(Arc::new(Named("maze", "Maze")));

        let entries = catalog.entries();
        assert_eq!(catalog.len(), 3);
        assert_eq!(entries[0].name, "Renamed");
        assert_eq!(entries[2].id, "maze");
        assert!(catalog.get("nope").is_none());
    }

    #[tokio::test]
    async fn test_default_setup_spawns_floor_and_drone() {
        let mut room = Room::new(
            RoomId::from("ENV001"),
            RoomOptions::new("default"),
            RoomConfig::default(),
        );
        DefaultEnvironment.setup(&mut room).unwrap();

        assert!(room.sim().static_body("floor").is_some());
        let drone = room.sim().entity_id("drone").unwrap();
        assert!(room.sim().entity(drone).unwrap().as_drone().is_some());
    }

    #[tokio::test]
    async fn test_empty_setup_spawns_only_floor() {
        let mut room = Room::new(
            RoomId::from("ENV002"),
            RoomOptions::new("empty"),
            RoomConfig::default(),
        );
        EmptyEnvironment.setup(&mut room).unwrap();
        assert_eq!(room.sim().entity_count(), 1);
    }
}
