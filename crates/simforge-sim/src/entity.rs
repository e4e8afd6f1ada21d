//! Entities: named objects that own one body each.
//!
//! Rather than a class hierarchy, an entity is a body handle plus a
//! [`EntityKind`] tag saying which per-tick capability it carries. The
//! instance owns every entity in an id-addressed arena; nothing else holds
//! an entity by value.

use std::fmt;

use serde_json::Value;

use crate::{BodyHandle, Drone, SimBody, SimError, Trigger};

/// Index into a [`SimulationInstance`](crate::SimulationInstance)'s entity
/// arena. Ids are never reused within one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Custom per-tick behaviour for a plain dynamic entity.
pub trait EntityBehavior: Send {
    /// Called once per tick, after the physics step.
    fn update(&mut self, body: &mut SimBody<'_>, dt: f32) -> Result<(), SimError>;
}

pub enum EntityKind {
    /// Never ticked.
    Static,
    /// Ticked; without a behaviour the tick is a no-op.
    Dynamic(Option<Box<dyn EntityBehavior>>),
    Trigger(Trigger),
    Drone(Box<Drone>),
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic(_) => "dynamic",
            Self::Trigger(_) => "trigger",
            Self::Drone(_) => "drone",
        }
    }
}

impl fmt::Debug for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("Static"),
            Self::Dynamic(behavior) => f
                .debug_tuple("Dynamic")
                .field(&behavior.as_ref().map(|_| ".."))
                .finish(),
            Self::Trigger(trigger) => f.debug_tuple("Trigger").field(trigger).finish(),
            Self::Drone(drone) => f.debug_tuple("Drone").field(drone).finish(),
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) name: String,
    pub(crate) body: BodyHandle,
    pub(crate) visual_info: Option<Value>,
    pub(crate) kind: EntityKind,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    /// Opaque rendering hints forwarded to clients in full updates.
    pub fn visual_info(&self) -> Option<&Value> {
        self.visual_info.as_ref()
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn as_trigger(&self) -> Option<&Trigger> {
        match &self.kind {
            EntityKind::Trigger(trigger) => Some(trigger),
            _ => None,
        }
    }

    pub fn as_drone(&self) -> Option<&Drone> {
        match &self.kind {
            EntityKind::Drone(drone) => Some(&**drone),
            _ => None,
        }
    }

    pub fn as_drone_mut(&mut self) -> Option<&mut Drone> {
        match &mut self.kind {
            EntityKind::Drone(drone) => Some(&mut **drone),
            _ => None,
        }
    }
}
