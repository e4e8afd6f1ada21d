//! Wire protocol for Simforge.
//!
//! This crate defines the "language" spoken across the process boundary
//! between the simulation host and the edge process that terminates real
//! client connections:
//!
//! - **Frames** ([`InboundFrame`], [`encode_emit`]): the newline-delimited
//!   text records carried by the bridge.
//! - **Types** ([`SessionId`], [`RoomId`], [`RoomInfo`], [`StateUpdate`], ...):
//!   the payloads that ride inside those frames as JSON.
//! - **Errors** ([`ProtocolError`]): what can go wrong while parsing or
//!   encoding.
//!
//! # Architecture
//!
//! The protocol layer doesn't know about pipes, processes or rooms. It
//! only turns lines into frames and values into lines.
//!
//! ```text
//! Transport (bytes) → Protocol (InboundFrame) → Session (socket callbacks)
//! ```

mod error;
mod frame;
mod types;

pub mod events;

pub use error::ProtocolError;
pub use frame::{
    encode_emit, into_args, InboundFrame, SESSION_ID_LEN, TAG_CONNECTED,
    TAG_DISCONNECTED, TAG_MESSAGE,
};
pub use types::{
    BodySnapshot, ClientEvent, EnvironmentEntry, QuaternionData, RobotId,
    RoomId, RoomInfo, SessionId, StateUpdate, Vector3Data,
};
