//! The socket registry: every live session known to the bridge.
//!
//! The bridge reader inserts a socket when the edge announces a new
//! connection, looks sockets up to route inbound messages, and removes them
//! when the edge reports a disconnect. Other tasks (the host, tests) may
//! read it concurrently, so the map sits behind a mutex. No lock is held
//! while callbacks run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use simforge_protocol::SessionId;

use crate::{OutboundSender, Socket};

/// Live sessions, keyed by session identifier.
pub struct SocketRegistry {
    sockets: Mutex<HashMap<SessionId, Arc<Socket>>>,
    outbound: OutboundSender,
}

impl SocketRegistry {
    /// Creates an empty registry. Sockets it creates write into `outbound`.
    pub fn new(outbound: OutboundSender) -> Self {
        Self {
            sockets: Mutex::new(HashMap::new()),
            outbound,
        }
    }

    /// Creates and stores a socket for a newly announced session.
    ///
    /// If the edge re-announces an identifier that is still registered,
    /// the stale socket is replaced and returned in the second slot so
    /// the caller can disconnect it.
    pub fn connect(&self, id: SessionId) -> (Arc<Socket>, Option<Arc<Socket>>) {
        let socket = Socket::new(id.clone(), self.outbound.clone());
        let previous = self.guard().insert(id.clone(), Arc::clone(&socket));
        if previous.is_some() {
            tracing::warn!(session = %id, "session id announced twice, replacing socket");
        } else {
            tracing::debug!(session = %id, "session registered");
        }
        (socket, previous)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Socket>> {
        self.guard().get(id).cloned()
    }

    /// Forgets a session. Returns the socket so the caller can run its
    /// disconnect callbacks.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Socket>> {
        self.guard().remove(id)
    }

    /// Removes and returns every socket (bridge shutdown).
    pub fn drain(&self) -> Vec<Arc<Socket>> {
        self.guard().drain().map(|(_, socket)| socket).collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Socket>>> {
        self.sockets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sid(n: u8) -> SessionId {
        SessionId::parse(&format!("session{n:013}")).unwrap()
    }

    #[test]
    fn test_connect_then_get_returns_same_socket() {
        let (tx, _rx) = mpsc::channel(16);
        let registry = SocketRegistry::new(tx);

        let (socket, previous) = registry.connect(sid(1));
        assert!(previous.is_none());
        let found = registry.get(&sid(1)).unwrap();
        assert!(Arc::ptr_eq(&socket, &found));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_connect_duplicate_returns_previous() {
        let (tx, _rx) = mpsc::channel(16);
        let registry = SocketRegistry::new(tx);

        let (first, _) = registry.connect(sid(1));
        let (second, previous) = registry.connect(sid(1));

        assert!(Arc::ptr_eq(&first, &previous.unwrap()));
        assert!(Arc::ptr_eq(&second, &registry.get(&sid(1)).unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_unknown_returns_none() {
        let (tx, _rx) = mpsc::channel(16);
        let registry = SocketRegistry::new(tx);
        assert!(registry.remove(&sid(9)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drain_empties_registry() {
        let (tx, _rx) = mpsc::channel(16);
        let registry = SocketRegistry::new(tx);
        registry.connect(sid(1));
        registry.connect(sid(2));

        assert_eq!(registry.drain().len(), 2);
        assert!(registry.is_empty());
    }
}
