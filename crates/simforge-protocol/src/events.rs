//! Event names exchanged with remote sessions.
//!
//! Inbound names are registered as socket callbacks by the host; outbound
//! names are passed to `Socket::emit`.

// -- Inbound (client → host) --

pub const JOIN_ROOM: &str = "joinRoom";
pub const LEAVE_ROOM: &str = "leaveRoom";
pub const POST_RECONNECT: &str = "postReconnect";
pub const CLIENT_EVENT: &str = "clientEvent";
pub const RESET_ROBOT: &str = "resetRobot";
pub const RESET_ALL: &str = "resetAll";
pub const ROBOT_BUTTON: &str = "robotButton";
pub const GET_ROOMS: &str = "getRooms";

// -- Outbound (host → client) --

pub const ROOM_INFO: &str = "roomInfo";
pub const FULL_UPDATE: &str = "fullUpdate";
pub const UPDATE: &str = "update";
pub const AVAILABLE_ROOMS: &str = "availableRooms";
pub const AVAILABLE_ENVIRONMENTS: &str = "availableEnvironments";
pub const ROOM_LEFT: &str = "roomLeft";
pub const FORCE_REFRESH: &str = "forceRefresh";
