//! Transport bridge for Simforge.
//!
//! Real client connections are terminated by a separate edge process. The
//! simulation host talks to that process over one long-lived byte stream
//! (normally the edge's stdin/stdout) carrying newline-delimited frames.
//!
//! The [`Bridge`] owns two background tasks:
//!
//! - a **reader** that waits for inbound lines with a bounded timeout per
//!   attempt (so shutdown is observed promptly even on a silent channel),
//!   parses them, and turns them into socket lifecycle events and callback
//!   invocations;
//! - a **writer** that drains frames emitted by sockets and writes them to
//!   the outbound side of the channel.
//!
//! Unknown sessions and event names are dropped silently; malformed lines
//! are logged and dropped. Neither closes the channel.

mod bridge;
mod error;

pub use bridge::{Bridge, BridgeBuilder, BridgeConfig, ConnectCallback};
pub use error::TransportError;
