//! Bridge builder, reader loop and writer loop.

use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use simforge_protocol::InboundFrame;
use simforge_session::{Socket, SocketRegistry};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::TransportError;

/// Handler run for every newly connected session.
pub type ConnectCallback =
    Arc<dyn Fn(Arc<Socket>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound on a single wait for inbound bytes. Shutdown is
    /// noticed at the latest one interval after it is requested.
    pub poll_interval: Duration,
    /// Frames queued for the writer before emits start failing with
    /// `SessionError::Backlogged`. Raised to 1 if zero.
    pub outbound_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            outbound_capacity: 1024,
        }
    }
}

/// Configures and starts a [`Bridge`].
///
/// Connection callbacks must be registered before the bridge starts;
/// frames can arrive the moment the reader task is running.
pub struct BridgeBuilder {
    config: BridgeConfig,
    on_connection: Vec<ConnectCallback>,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
            on_connection: Vec::new(),
        }
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a handler for new sessions. Handlers run in registration
    /// order, before any message for that session is dispatched.
    pub fn on_connection<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<Socket>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connection
            .push(Arc::new(move |socket| handler(socket).boxed()));
        self
    }

    /// Starts the bridge over an arbitrary byte stream pair.
    pub fn start<R, W>(self, reader: R, writer: W) -> Bridge
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (closed_tx, closed_rx) = watch::channel(false);
        let sockets = Arc::new(SocketRegistry::new(outbound_tx));

        let reader = tokio::spawn(read_loop(
            reader,
            Arc::clone(&sockets),
            self.on_connection.into(),
            self.config.poll_interval,
            shutdown_rx.clone(),
            closed_tx,
        ));
        let writer = tokio::spawn(write_loop(writer, outbound_rx, shutdown_rx));

        tracing::info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            outbound_capacity = self.config.outbound_capacity,
            "bridge started"
        );

        Bridge {
            sockets,
            shutdown_tx,
            closed_rx,
            reader,
            writer,
            edge: None,
        }
    }

    /// Spawns the edge process and bridges its stdout (inbound) and stdin
    /// (outbound). The process is killed on [`Bridge::shutdown`] or when
    /// the bridge is dropped.
    ///
    /// # Errors
    /// - [`TransportError::Spawn`]: the program could not be started
    /// - [`TransportError::MissingPipe`]: stdio was not piped
    pub fn spawn_edge(self, mut command: Command) -> Result<Bridge, TransportError> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn().map_err(TransportError::Spawn)?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or(TransportError::MissingPipe("stdin"))?;
        tracing::info!(pid = ?child.id(), "edge process started");

        let mut bridge = self.start(stdout, stdin);
        bridge.edge = Some(child);
        Ok(bridge)
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running bridge to the edge process.
pub struct Bridge {
    sockets: Arc<SocketRegistry>,
    shutdown_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    edge: Option<Child>,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Live sessions.
    pub fn sockets(&self) -> &Arc<SocketRegistry> {
        &self.sockets
    }

    /// Resolves once the reader loop has ended (edge closed its side of
    /// the channel, a read failed, or shutdown was requested).
    pub async fn closed(&self) {
        let mut rx = self.closed_rx.clone();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Stops both loops, closes the channel and terminates the edge
    /// process. Every remaining session is disconnected first.
    ///
    /// # Errors
    /// Returns [`TransportError::Task`] if a loop panicked and
    /// [`TransportError::Io`] if the edge process could not be killed.
    pub async fn shutdown(mut self) -> Result<(), TransportError> {
        let _ = self.shutdown_tx.send(true);

        let reader = self.reader.await;
        let writer = self.writer.await;

        if let Some(mut edge) = self.edge.take() {
            edge.kill().await.map_err(TransportError::Io)?;
            tracing::info!("edge process terminated");
        }
        tracing::info!("bridge stopped");

        reader.map_err(|e| TransportError::Task(e.to_string()))?;
        writer.map_err(|e| TransportError::Task(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

async fn read_loop<R>(
    reader: R,
    sockets: Arc<SocketRegistry>,
    on_connection: Arc<[ConnectCallback]>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
    closed: watch::Sender<bool>,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut reader = BufReader::new(reader);
    // Survives timeouts: a line cut off by the poll deadline keeps its
    // partial bytes here and is completed by the next attempt.
    let mut line = Vec::new();

    loop {
        if *shutdown.borrow() {
            tracing::debug!("bridge reader observed shutdown");
            break;
        }
        match time::timeout(poll_interval, reader.read_until(b'\n', &mut line)).await {
            Err(_elapsed) => continue,
            Ok(Ok(0)) => {
                tracing::info!("edge closed the channel");
                break;
            }
            Ok(Ok(_)) => {
                let raw = std::mem::take(&mut line);
                handle_line(&raw, &sockets, &on_connection).await;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "bridge read failed");
                break;
            }
        }
    }

    for socket in sockets.drain() {
        socket.disconnect().await;
    }
    let _ = closed.send(true);
}

async fn handle_line(raw: &[u8], sockets: &SocketRegistry, on_connection: &[ConnectCallback]) {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, "dropping non-UTF-8 frame");
            return;
        }
    };
    if line.trim().is_empty() {
        return;
    }

    match InboundFrame::parse(line) {
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed frame");
        }
        Ok(InboundFrame::Connected(id)) => {
            let (socket, previous) = sockets.connect(id);
            if let Some(stale) = previous {
                stale.disconnect().await;
            }
            tracing::debug!(session = %socket.id(), "session connected");
            for callback in on_connection {
                callback(Arc::clone(&socket)).await;
            }
        }
        Ok(InboundFrame::Disconnected(id)) => match sockets.remove(&id) {
            Some(socket) => socket.disconnect().await,
            None => tracing::debug!(session = %id, "disconnect for unknown session"),
        },
        Ok(InboundFrame::Message {
            session,
            event,
            args,
        }) => match sockets.get(&session) {
            Some(socket) => {
                socket.dispatch(&event, args).await;
            }
            None => tracing::debug!(%session, %event, "message for unknown session"),
        },
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

async fn write_loop<W>(
    mut writer: W,
    mut frames: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = write_frame(&mut writer, &frame).await {
                        tracing::warn!(error = %e, "bridge write failed");
                        return;
                    }
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    // Best effort: deliver what was emitted before shutdown.
    while let Ok(frame) = frames.try_recv() {
        if write_frame(&mut writer, &frame).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn write_frame<W>(writer: &mut W, frame: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}
