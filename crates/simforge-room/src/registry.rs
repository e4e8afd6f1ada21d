//! Room registry: creates, tracks, ticks and evicts rooms.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use simforge_protocol::{RoomId, RoomInfo, SessionId};
use simforge_session::Socket;
use tokio::sync::{Mutex, RwLock};

use crate::{EnvironmentCatalog, EvictionPolicy, RegistryConfig, Room, RoomError, RoomOptions};

/// A room as shared between the tick loop and session handlers.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Alphabet for generated room ids. Leaves out characters that are easy
/// to confuse when read aloud (`0`/`O`, `1`/`I`).
const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Shorter ids would run out before `max_rooms` could.
const MIN_ROOM_ID_LEN: usize = 4;

/// Room counts for the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub active_rooms: usize,
    pub hibernating_rooms: usize,
    pub max_rooms: usize,
}

/// Every room in the process, plus which session sits in which room.
///
/// Lock order is rooms map, then a room, then memberships. The
/// membership lock is never held while waiting on a room.
pub struct RoomRegistry {
    config: RegistryConfig,
    catalog: EnvironmentCatalog,
    rooms: RwLock<HashMap<RoomId, SharedRoom>>,
    /// A session is in at most one room.
    memberships: Mutex<HashMap<SessionId, RoomId>>,
}

impl RoomRegistry {
    pub fn new(config: RegistryConfig, catalog: EnvironmentCatalog) -> Self {
        Self {
            config,
            catalog,
            rooms: RwLock::new(HashMap::new()),
            memberships: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &EnvironmentCatalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Creation and lookup
    // -----------------------------------------------------------------------

    /// Creates a room and runs its environment setup. The room is only
    /// visible to other callers once setup has finished.
    ///
    /// # Errors
    /// - [`RoomError::UnknownEnvironment`]: no such environment
    /// - [`RoomError::CapacityExceeded`]: `max_rooms` rooms already exist
    /// - [`RoomError::Sim`]: environment setup failed
    pub async fn create_room(&self, options: RoomOptions) -> Result<SharedRoom, RoomError> {
        self.insert_room(options, None).await
    }

    /// Builds a room under the rooms write lock and, when `creator` is
    /// given, attaches it before the room becomes visible to the tick.
    async fn insert_room(
        &self,
        options: RoomOptions,
        creator: Option<Arc<Socket>>,
    ) -> Result<SharedRoom, RoomError> {
        let environment = self
            .catalog
            .get(&options.environment)
            .ok_or_else(|| RoomError::UnknownEnvironment(options.environment.clone()))?;

        let mut rooms = self.rooms.write().await;
        if rooms.len() >= self.config.max_rooms {
            return Err(RoomError::CapacityExceeded {
                max: self.config.max_rooms,
            });
        }

        let id = generate_room_id(&rooms, self.config.room_id_len);
        let mut room = Room::new(id.clone(), options, self.config.room.clone());
        environment.setup(&mut room)?;
        if let Some(socket) = creator {
            room.join(Arc::clone(&socket))?;
            self.memberships
                .lock()
                .await
                .insert(socket.id().clone(), id.clone());
        }

        let shared = Arc::new(Mutex::new(room));
        rooms.insert(id.clone(), Arc::clone(&shared));
        tracing::info!(
            room_id = %id,
            environment = environment.id(),
            rooms = rooms.len(),
            "room created"
        );
        Ok(shared)
    }

    pub async fn find_room(&self, id: &RoomId) -> Result<SharedRoom, RoomError> {
        self.rooms
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RoomError::RoomNotFound(id.clone()))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Attaches `socket` to an existing room, waking it if needed.
    ///
    /// The rooms map stays read-locked until the membership is recorded,
    /// so the room cannot be closed or evicted halfway through.
    ///
    /// # Errors
    /// - [`RoomError::AlreadyInRoom`]: the session is in a room already
    /// - [`RoomError::RoomNotFound`]: unknown id
    /// - [`RoomError::InvalidPassword`]: the room is locked and `password`
    ///   does not match
    pub async fn join_room(
        &self,
        id: &RoomId,
        socket: Arc<Socket>,
        password: Option<&str>,
    ) -> Result<(), RoomError> {
        self.ensure_unattached(socket.id()).await?;
        let rooms = self.rooms.read().await;
        let shared = rooms
            .get(id)
            .ok_or_else(|| RoomError::RoomNotFound(id.clone()))?;
        let mut room = shared.lock().await;
        if !room.check_password(password) {
            return Err(RoomError::InvalidPassword(id.clone()));
        }
        room.join(Arc::clone(&socket))?;
        self.memberships
            .lock()
            .await
            .insert(socket.id().clone(), id.clone());
        Ok(())
    }

    /// Creates a room and attaches its creator. Returns the new room's id.
    pub async fn create_and_join(
        &self,
        options: RoomOptions,
        socket: Arc<Socket>,
    ) -> Result<RoomId, RoomError> {
        self.ensure_unattached(socket.id()).await?;
        let shared = self.insert_room(options, Some(socket)).await?;
        let id = shared.lock().await.id().clone();
        Ok(id)
    }

    /// Detaches a session from whatever room it is in. Returns that room.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if the session is in no room.
    pub async fn leave(&self, session: &SessionId) -> Result<RoomId, RoomError> {
        let id = self
            .memberships
            .lock()
            .await
            .remove(session)
            .ok_or_else(|| RoomError::NotInRoom(session.clone()))?;
        // The room may have been closed in between; nothing left to detach.
        if let Ok(shared) = self.find_room(&id).await {
            shared.lock().await.leave(session);
        }
        Ok(id)
    }

    pub async fn room_of(&self, session: &SessionId) -> Option<RoomId> {
        self.memberships.lock().await.get(session).cloned()
    }

    /// The room a session is attached to.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] or, if the room vanished,
    /// [`RoomError::RoomNotFound`].
    pub async fn member_room(&self, session: &SessionId) -> Result<SharedRoom, RoomError> {
        let id = self
            .room_of(session)
            .await
            .ok_or_else(|| RoomError::NotInRoom(session.clone()))?;
        self.find_room(&id).await
    }

    async fn ensure_unattached(&self, session: &SessionId) -> Result<(), RoomError> {
        match self.memberships.lock().await.get(session) {
            Some(current) => Err(RoomError::AlreadyInRoom(session.clone(), current.clone())),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Tick, close, evict
    // -----------------------------------------------------------------------

    /// Updates every room once. Holds the rooms map for the whole pass so
    /// rooms are neither created nor destroyed mid-iteration. A failing
    /// room is logged and skipped; the others still tick.
    pub async fn tick(&self, dt: f32) {
        let mut detached = Vec::new();
        {
            let rooms = self.rooms.read().await;
            for shared in rooms.values() {
                let mut room = shared.lock().await;
                match room.update(dt) {
                    Ok(sockets) => detached.extend(sockets.iter().map(|s| s.id().clone())),
                    Err(err) => {
                        tracing::warn!(room_id = %room.id(), %err, "room update failed");
                    }
                }
            }
        }
        if !detached.is_empty() {
            let mut memberships = self.memberships.lock().await;
            for session in &detached {
                memberships.remove(session);
            }
        }
    }

    /// Destroys a room. Its sockets receive `forceRefresh`.
    pub async fn close_room(&self, id: &RoomId) -> Result<(), RoomError> {
        let shared = self
            .rooms
            .write()
            .await
            .remove(id)
            .ok_or_else(|| RoomError::RoomNotFound(id.clone()))?;
        shared.lock().await.close();
        self.memberships.lock().await.retain(|_, room| room != id);
        tracing::info!(room_id = %id, "room destroyed");
        Ok(())
    }

    /// Closes every room `policy` selects. Returns the evicted ids.
    pub async fn evict(&self, policy: &dyn EvictionPolicy) -> Vec<RoomId> {
        let mut evicted = Vec::new();
        {
            let mut rooms = self.rooms.write().await;
            let mut doomed = Vec::new();
            for (id, shared) in rooms.iter() {
                if policy.should_evict(&*shared.lock().await) {
                    doomed.push(id.clone());
                }
            }
            for id in doomed {
                if let Some(shared) = rooms.remove(&id) {
                    shared.lock().await.close();
                    evicted.push(id);
                }
            }
        }
        if !evicted.is_empty() {
            self.memberships
                .lock()
                .await
                .retain(|_, room| !evicted.contains(room));
            tracing::info!(count = evicted.len(), "evicted hibernating rooms");
        }
        evicted
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub async fn status(&self) -> RegistryStatus {
        let rooms = self.rooms.read().await;
        let mut status = RegistryStatus {
            max_rooms: self.config.max_rooms,
            ..RegistryStatus::default()
        };
        for shared in rooms.values() {
            if shared.lock().await.is_hibernating() {
                status.hibernating_rooms += 1;
            } else {
                status.active_rooms += 1;
            }
        }
        status
    }

    /// Metadata of every room, ordered by id.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let rooms = self.rooms.read().await;
        let mut infos = Vec::with_capacity(rooms.len());
        for shared in rooms.values() {
            infos.push(shared.lock().await.info());
        }
        infos.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        infos
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default(), EnvironmentCatalog::default())
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

/// Draws ids until one is not taken.
fn generate_room_id(taken: &HashMap<RoomId, SharedRoom>, len: usize) -> RoomId {
    let len = len.max(MIN_ROOM_ID_LEN);
    let mut rng = rand::rng();
    loop {
        let id: String = (0..len)
            .map(|_| ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        let id = RoomId(id);
        if !taken.contains_key(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_room_id_uses_alphabet_and_length() {
        let taken = HashMap::new();
        for len in [4, 6, 10] {
            let id = generate_room_id(&taken, len);
            assert_eq!(id.0.len(), len);
            assert!(id.0.bytes().all(|b| ROOM_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_generate_room_id_short_length_is_raised_to_minimum() {
        let id = generate_room_id(&HashMap::new(), 0);
        assert_eq!(id.0.len(), MIN_ROOM_ID_LEN);
    }
}
