//! Client session handling for Simforge.
//!
//! A session is one remote client as seen through the bridge. This crate
//! provides:
//!
//! 1. **Sockets**: [`Socket`] holds the session identifier, the ordered
//!    event-callback registry and the disconnect callbacks, and can
//!    [`emit`](Socket::emit) events back to the client.
//! 2. **Session tracking**: [`SocketRegistry`] maps live session
//!    identifiers to their sockets.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← holds Arc<Socket> for every attached client
//!     ↕
//! Session Layer (this crate)  ← callbacks in, encoded frames out
//!     ↕
//! Protocol Layer (below)  ← SessionId, frame encoding
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SocketRegistry;
pub use session::{DisconnectCallback, EventCallback, OutboundSender, Socket};
