//! Per-session event handlers.
//!
//! Every session that the bridge announces gets the handlers below
//! registered on its socket. The flow for a typical client:
//!   1. connected → receives `availableEnvironments` and `availableRooms`
//!   2. `joinRoom` → creates or joins a room, answered with `joinRoom`
//!   3. `clientEvent` / `resetRobot` / ... → routed to that room
//!   4. disconnect → detached from the room
//!
//! Failures never propagate out of a handler. They reach the client as a
//! `false` answer or a `forceRefresh`, and are logged at debug level.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use simforge_protocol::{events, ClientEvent, RobotId, RoomId};
use simforge_room::{Room, RoomError, RoomOptions, RoomRegistry};
use simforge_session::Socket;

/// Environment used when `joinRoom` creates a room without naming one.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Registers every session event handler on `socket` and greets it.
pub(crate) async fn attach(socket: Arc<Socket>, registry: Arc<RoomRegistry>) {
    tracing::debug!(session = %socket.id(), "attaching session handlers");

    route(&socket, &registry, events::JOIN_ROOM, join_room);
    route(&socket, &registry, events::LEAVE_ROOM, leave_room);
    route(&socket, &registry, events::POST_RECONNECT, post_reconnect);
    route(&socket, &registry, events::CLIENT_EVENT, client_event);
    route(&socket, &registry, events::RESET_ROBOT, reset_robot);
    route(&socket, &registry, events::RESET_ALL, reset_all);
    route(&socket, &registry, events::ROBOT_BUTTON, robot_button);
    route(&socket, &registry, events::GET_ROOMS, get_rooms);

    let on_disconnect = Arc::clone(&registry);
    socket.on_disconnect(move |socket| {
        let registry = Arc::clone(&on_disconnect);
        async move {
            if let Ok(room_id) = registry.leave(socket.id()).await {
                tracing::debug!(session = %socket.id(), %room_id, "disconnected session left room");
            }
        }
    });

    reply(&socket, events::AVAILABLE_ENVIRONMENTS, &registry.catalog().entries());
    reply(&socket, events::AVAILABLE_ROOMS, &registry.list_rooms().await);
}

/// Registers `handler` for `event`, handing it the registry.
fn route<F, Fut>(socket: &Socket, registry: &Arc<RoomRegistry>, event: &str, handler: F)
where
    F: Fn(Arc<RoomRegistry>, Arc<Socket>, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let registry = Arc::clone(registry);
    socket.on(event, move |socket, args| handler(Arc::clone(&registry), socket, args));
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// `joinRoom(roomId | null, environment?, password?, creator?, name?)`
///
/// A missing or empty room id creates a room. Answers `joinRoom` with the
/// room id, or `false` on failure; an unknown room also gets
/// `forceRefresh` so the client drops its stale reference.
async fn join_room(registry: Arc<RoomRegistry>, socket: Arc<Socket>, args: Vec<Value>) {
    let password = arg_str(&args, 2);
    let result = match arg_str(&args, 0) {
        None => {
            let mut options = RoomOptions::new(arg_str(&args, 1).unwrap_or(DEFAULT_ENVIRONMENT));
            if let Some(password) = password {
                options = options.password(password);
            }
            if let Some(creator) = arg_str(&args, 3) {
                options = options.creator(creator);
            }
            if let Some(name) = arg_str(&args, 4) {
                options = options.name(name);
            }
            registry.create_and_join(options, Arc::clone(&socket)).await
        }
        Some(id) => {
            let id = RoomId::from(id);
            registry
                .join_room(&id, Arc::clone(&socket), password)
                .await
                .map(|()| id)
        }
    };

    match result {
        Ok(room_id) => reply(&socket, events::JOIN_ROOM, &room_id),
        Err(err) => {
            tracing::debug!(session = %socket.id(), %err, "joinRoom rejected");
            reply(&socket, events::JOIN_ROOM, &false);
            if matches!(err, RoomError::RoomNotFound(_)) {
                reply(&socket, events::FORCE_REFRESH, &Value::Null);
            }
        }
    }
}

async fn leave_room(registry: Arc<RoomRegistry>, socket: Arc<Socket>, _args: Vec<Value>) {
    let left = registry.leave(socket.id()).await.ok();
    reply(&socket, events::ROOM_LEFT, &left);
}

/// `postReconnect(roomId, password?)`: a client that lost its session
/// rejoins the room it was in. Anything but success forces a reload.
async fn post_reconnect(registry: Arc<RoomRegistry>, socket: Arc<Socket>, args: Vec<Value>) {
    let Some(id) = arg_str(&args, 0).map(RoomId::from) else {
        reply(&socket, events::FORCE_REFRESH, &Value::Null);
        return;
    };
    if registry.room_of(socket.id()).await.as_ref() == Some(&id) {
        reply(&socket, events::JOIN_ROOM, &id);
        return;
    }
    match registry.join_room(&id, Arc::clone(&socket), arg_str(&args, 1)).await {
        Ok(()) => reply(&socket, events::JOIN_ROOM, &id),
        Err(err) => {
            tracing::debug!(session = %socket.id(), room_id = %id, %err, "reconnect rejected");
            reply(&socket, events::FORCE_REFRESH, &Value::Null);
        }
    }
}

async fn get_rooms(registry: Arc<RoomRegistry>, socket: Arc<Socket>, _args: Vec<Value>) {
    reply(&socket, events::AVAILABLE_ROOMS, &registry.list_rooms().await);
}

// ---------------------------------------------------------------------------
// Room commands
// ---------------------------------------------------------------------------

async fn client_event(registry: Arc<RoomRegistry>, socket: Arc<Socket>, mut args: Vec<Value>) {
    if args.is_empty() {
        tracing::debug!(session = %socket.id(), "clientEvent without payload, dropping");
        return;
    }
    let event: ClientEvent = match serde_json::from_value(args.swap_remove(0)) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(session = %socket.id(), %err, "malformed clientEvent, dropping");
            return;
        }
    };
    let session = socket.id().clone();
    with_room(&registry, &socket, events::CLIENT_EVENT, move |room| {
        room.client_event(&session, event);
        Ok(())
    })
    .await;
}

async fn reset_robot(registry: Arc<RoomRegistry>, socket: Arc<Socket>, args: Vec<Value>) {
    let Some(robot) = arg_str(&args, 0).map(RobotId::from) else {
        tracing::debug!(session = %socket.id(), "resetRobot without robot id, dropping");
        return;
    };
    with_room(&registry, &socket, events::RESET_ROBOT, move |room| {
        room.reset_robot(&robot)
    })
    .await;
}

async fn reset_all(registry: Arc<RoomRegistry>, socket: Arc<Socket>, _args: Vec<Value>) {
    with_room(&registry, &socket, events::RESET_ALL, Room::reset_all).await;
}

/// `robotButton(robotId, pressed)`
async fn robot_button(registry: Arc<RoomRegistry>, socket: Arc<Socket>, args: Vec<Value>) {
    let Some(robot) = arg_str(&args, 0).map(RobotId::from) else {
        tracing::debug!(session = %socket.id(), "robotButton without robot id, dropping");
        return;
    };
    let pressed = args.get(1).and_then(Value::as_bool).unwrap_or(false);
    with_room(&registry, &socket, events::ROBOT_BUTTON, move |room| {
        room.robot_button(&robot, pressed)
    })
    .await;
}

/// Runs `op` on the socket's room. A socket in no room (or in a room that
/// is gone) is told to refresh; a failing `op` is answered with `event`
/// carrying `false`.
async fn with_room<F>(registry: &RoomRegistry, socket: &Socket, event: &str, op: F)
where
    F: FnOnce(&mut Room) -> Result<(), RoomError>,
{
    let shared = match registry.member_room(socket.id()).await {
        Ok(shared) => shared,
        Err(err) => {
            tracing::debug!(session = %socket.id(), %err, "command outside a room");
            reply(socket, events::FORCE_REFRESH, &Value::Null);
            return;
        }
    };
    let mut room = shared.lock().await;
    if let Err(err) = op(&mut room) {
        tracing::debug!(
            session = %socket.id(),
            room_id = %room.id(),
            event,
            %err,
            "room command failed"
        );
        reply(socket, event, &false);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Non-empty string argument at `index`.
fn arg_str(args: &[Value], index: usize) -> Option<&str> {
    args.get(index)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn reply<T: Serialize + ?Sized>(socket: &Socket, event: &str, data: &T) {
    if let Err(err) = socket.emit(event, data) {
        tracing::warn!(session = %socket.id(), event, %err, "reply failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arg_str_skips_missing_empty_and_non_strings() {
        let args = vec![json!("ABC123"), json!(""), json!(null), json!(7)];
        assert_eq!(arg_str(&args, 0), Some("ABC123"));
        assert_eq!(arg_str(&args, 1), None);
        assert_eq!(arg_str(&args, 2), None);
        assert_eq!(arg_str(&args, 3), None);
        assert_eq!(arg_str(&args, 4), None);
    }
}
