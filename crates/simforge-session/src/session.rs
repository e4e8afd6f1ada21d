//! The `Socket`: the server's handle on one remote client session.
//!
//! A socket tracks:
//! - WHO the client is (`SessionId`, assigned by the edge process)
//! - WHAT to run when an event arrives (callbacks keyed by event name)
//! - WHAT to run when the client goes away (disconnect callbacks)
//! - WHERE outbound frames go (the bridge writer's channel)
//!
//! Callbacks receive the socket as an argument instead of capturing it.
//! A callback stored inside the socket that also owned an `Arc<Socket>`
//! would keep the socket alive forever.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use simforge_protocol::{encode_emit, SessionId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::SessionError;

/// Channel carrying fully encoded frames to the bridge writer.
pub type OutboundSender = mpsc::Sender<String>;

/// A registered event handler.
pub type EventCallback =
    Arc<dyn Fn(Arc<Socket>, Vec<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered disconnect handler.
pub type DisconnectCallback =
    Arc<dyn Fn(Arc<Socket>) -> BoxFuture<'static, ()> + Send + Sync>;

/// One remote client session.
pub struct Socket {
    id: SessionId,
    outbound: OutboundSender,
    /// Handlers per event name. The `Vec` order is the invocation order.
    callbacks: Mutex<HashMap<String, Vec<EventCallback>>>,
    disconnect_callbacks: Mutex<Vec<DisconnectCallback>>,
    connected: AtomicBool,
}

impl Socket {
    /// Creates a socket whose outbound frames are pushed into `outbound`.
    pub fn new(id: SessionId, outbound: OutboundSender) -> Arc<Self> {
        Arc::new(Self {
            id,
            outbound,
            callbacks: Mutex::new(HashMap::new()),
            disconnect_callbacks: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// `false` once [`disconnect`](Self::disconnect) has run.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Registers `handler` for `event`. Handlers for the same event run in
    /// registration order.
    pub fn on<F, Fut>(&self, event: &str, handler: F)
    where
        F: Fn(Arc<Socket>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: EventCallback =
            Arc::new(move |socket, args| handler(socket, args).boxed());
        lock(&self.callbacks)
            .entry(event.to_string())
            .or_default()
            .push(callback);
    }

    /// Registers `handler` to run once when the session ends.
    pub fn on_disconnect<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Socket>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: DisconnectCallback = Arc::new(move |socket| handler(socket).boxed());
        lock(&self.disconnect_callbacks).push(callback);
    }

    /// Snapshot of the handlers registered for `event`.
    pub fn callbacks_for(&self, event: &str) -> Vec<EventCallback> {
        lock(&self.callbacks)
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    /// Runs every handler registered for `event`, one after another, each
    /// with its own copy of `args`. Returns how many handlers ran; an
    /// event nobody listens to is not an error.
    pub async fn dispatch(self: &Arc<Self>, event: &str, args: Vec<Value>) -> usize {
        // Snapshot first so handlers may register more handlers.
        let callbacks = self.callbacks_for(event);
        if callbacks.is_empty() {
            tracing::debug!(session = %self.id, event, "no handler for event, dropping");
            return 0;
        }
        for callback in &callbacks {
            callback(Arc::clone(self), args.clone()).await;
        }
        callbacks.len()
    }

    /// Marks the session as gone and runs the disconnect handlers.
    /// Subsequent calls do nothing.
    pub async fn disconnect(self: &Arc<Self>) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        let callbacks: Vec<DisconnectCallback> =
            std::mem::take(&mut *lock(&self.disconnect_callbacks));
        for callback in callbacks {
            callback(Arc::clone(self)).await;
        }
        lock(&self.callbacks).clear();
        tracing::debug!(session = %self.id, "socket disconnected");
    }

    /// Sends `event` with `data` to the client. There is no
    /// acknowledgement: success means the frame was handed to the bridge
    /// writer.
    ///
    /// # Errors
    /// - [`SessionError::Protocol`]: `data` could not be encoded
    /// - [`SessionError::Backlogged`]: the writer's queue is full; the
    ///   frame was dropped
    /// - [`SessionError::Closed`]: the bridge writer has shut down
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, data: &T) -> Result<(), SessionError> {
        let frame = encode_emit(&self.id, event, data)?;
        self.outbound.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => SessionError::Backlogged(self.id.clone()),
            TrySendError::Closed(_) => SessionError::Closed(self.id.clone()),
        })
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Locks a registry mutex. A handler that panicked mid-registration
/// leaves the map in a usable state, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
