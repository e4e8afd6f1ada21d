//! Notifications a room publishes to its subscribers.

use std::time::Duration;

use simforge_protocol::{ClientEvent, RobotId, SessionId};
use simforge_sim::TriggerEdge;

/// Why a robot left its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// No command arrived within the keep-alive window.
    KeepAliveExpired,
    /// Removed on request.
    Requested,
}

/// One room notification, delivered in publication order over a
/// `tokio::sync::broadcast` channel (see [`Room::subscribe`](crate::Room::subscribe)).
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    HibernateStarted,
    HibernateEnded,
    /// Published once per hibernation when it outlasts `max_hibernate`.
    HibernateExpired { hibernating_for: Duration },
    Closed,
    RobotRemoved {
        robot: RobotId,
        reason: RemovalReason,
    },
    RobotButton {
        robot: RobotId,
        pressed: bool,
    },
    ClientEvent {
        session: SessionId,
        event: ClientEvent,
    },
    /// A trigger edge, with entities resolved to their names.
    Trigger {
        trigger: String,
        edge: TriggerEdge,
        entity: Option<String>,
    },
}
