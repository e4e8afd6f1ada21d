//! Core protocol types carried inside bridge frames.
//!
//! Everything here is serialized to JSON by `serde_json`. Field names use
//! camelCase on the wire because the edge process and the browser clients
//! behind it are JavaScript.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, SESSION_ID_LEN};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of one remote client session, assigned by the edge process.
///
/// Always exactly [`SESSION_ID_LEN`] ASCII characters; the message frame
/// relies on the fixed width to find where the event name starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Validates and wraps a raw identifier.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidSessionId`] unless `raw` is exactly
    /// 20 printable, non-space ASCII characters.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let valid = raw.len() == SESSION_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_graphic());
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ProtocolError::InvalidSessionId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-shareable room identifier (e.g. `"K3Q9ZD"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a robot within a room. Doubles as the robot entity's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotId(pub String);

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RobotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<[f32; 3]> for Vector3Data {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Orientation as a unit quaternion, scalar last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for QuaternionData {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// State broadcasts
// ---------------------------------------------------------------------------

/// One body as seen by clients.
///
/// `update` frames only fill `pos`, `rot` and `vel`; `fullUpdate` frames
/// also carry the bounding `size` and the opaque `visualInfo` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySnapshot {
    pub pos: Vector3Data,
    pub rot: QuaternionData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vel: Option<Vector3Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Vector3Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_info: Option<Value>,
}

/// Payload of both `update` and `fullUpdate`.
///
/// `time` is the room's simulated time in seconds. Bodies are keyed by
/// entity name; `BTreeMap` keeps the JSON output stable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    pub time: f64,
    pub bodies: BTreeMap<String, BodySnapshot>,
}

// ---------------------------------------------------------------------------
// Room metadata
// ---------------------------------------------------------------------------

/// The room metadata surface sent as `roomInfo` and listed in
/// `availableRooms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    pub has_password: bool,
    pub environment: String,
    /// Unix time in milliseconds.
    pub last_interaction_time: u64,
    pub hibernating: bool,
    pub creator: String,
    pub robots: Vec<RobotId>,
}

/// One entry of `availableEnvironments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    pub id: String,
    pub name: String,
}

/// Payload of the inbound `clientEvent`: an opaque, environment-defined
/// event such as a key press or a UI toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}
