//! `SimHost` builder and the tick loop.
//!
//! This is the entry point for running Simforge. It ties the layers
//! together: bridge → session handlers → room registry → simulations,
//! with one task driving every room at the configured tick rate.

use std::sync::Arc;
use std::time::Duration;

use simforge_room::{
    Environment, EnvironmentCatalog, EvictionPolicy, MaxHibernateEviction, RoomRegistry,
};
use simforge_tick::{TickConfig, TickScheduler};
use simforge_transport::{Bridge, BridgeBuilder};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::handler;
use crate::{HostConfig, SimforgeError};

/// Floor for the eviction sweep period; `tokio::time::interval` rejects zero.
const MIN_EVICTION_INTERVAL: Duration = Duration::from_secs(1);

/// Builder for configuring and starting a [`SimHost`].
///
/// # Example
///
/// ```rust,ignore
/// let host = SimHost::builder()
///     .config(HostConfig::default())
///     .environment(Arc::new(MyWarehouse))
///     .spawn_edge(tokio::process::Command::new("node").arg("edge.js"))?;
/// host.closed().await;
/// host.shutdown().await?;
/// ```
pub struct SimHostBuilder {
    config: HostConfig,
    catalog: EnvironmentCatalog,
    eviction: Option<Arc<dyn EvictionPolicy>>,
}

impl SimHostBuilder {
    /// Creates a builder with default settings and the built-in
    /// environments.
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
            catalog: EnvironmentCatalog::default(),
            eviction: None,
        }
    }

    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds an environment, replacing a built-in with the same id.
    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.catalog.register(environment);
        self
    }

    /// Replaces the whole environment catalog.
    pub fn catalog(mut self, catalog: EnvironmentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Overrides the eviction policy. Defaults to
    /// [`MaxHibernateEviction`] with the configured `max_hibernate`.
    pub fn eviction_policy(mut self, policy: Arc<dyn EvictionPolicy>) -> Self {
        self.eviction = Some(policy);
        self
    }

    /// Starts the host over an arbitrary byte stream pair in place of an
    /// edge process.
    pub fn start<R, W>(self, reader: R, writer: W) -> SimHost
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (registry, bridge, parts) = self.prepare();
        parts.launch(registry, bridge.start(reader, writer))
    }

    /// Spawns the edge process and starts the host on its stdio.
    ///
    /// # Errors
    /// [`SimforgeError::Transport`] if the edge cannot be started.
    pub fn spawn_edge(self, command: Command) -> Result<SimHost, SimforgeError> {
        let (registry, bridge, parts) = self.prepare();
        Ok(parts.launch(registry, bridge.spawn_edge(command)?))
    }

    fn prepare(self) -> (Arc<RoomRegistry>, BridgeBuilder, LoopParts) {
        let config = self.config;
        let eviction = self
            .eviction
            .unwrap_or_else(|| Arc::new(MaxHibernateEviction::from(&config.registry.room)));
        let registry = Arc::new(RoomRegistry::new(config.registry, self.catalog));

        let on_connection = Arc::clone(&registry);
        let bridge = Bridge::builder()
            .config(config.bridge)
            .on_connection(move |socket| handler::attach(socket, Arc::clone(&on_connection)));

        let parts = LoopParts {
            tick: config.tick,
            eviction_interval: config.eviction_interval.max(MIN_EVICTION_INTERVAL),
            eviction,
        };
        (registry, bridge, parts)
    }
}

impl Default for SimHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tick loop settings carried from the builder to the spawned task.
struct LoopParts {
    tick: TickConfig,
    eviction_interval: Duration,
    eviction: Arc<dyn EvictionPolicy>,
}

impl LoopParts {
    fn launch(self, registry: Arc<RoomRegistry>, bridge: Bridge) -> SimHost {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tick_task = tokio::spawn(tick_loop(Arc::clone(&registry), self, shutdown_rx));
        tracing::info!("simforge host running");
        SimHost {
            registry,
            bridge,
            shutdown_tx,
            tick_task,
        }
    }
}

/// A running simulation host.
pub struct SimHost {
    registry: Arc<RoomRegistry>,
    bridge: Bridge,
    shutdown_tx: watch::Sender<bool>,
    tick_task: JoinHandle<()>,
}

impl SimHost {
    pub fn builder() -> SimHostBuilder {
        SimHostBuilder::new()
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Resolves once the edge side of the channel has gone away.
    pub async fn closed(&self) {
        self.bridge.closed().await;
    }

    /// Stops the tick loop, then the bridge and the edge process.
    ///
    /// # Errors
    /// [`SimforgeError::TickLoop`] if the tick task panicked, or the
    /// bridge's shutdown error.
    pub async fn shutdown(self) -> Result<(), SimforgeError> {
        let _ = self.shutdown_tx.send(true);
        self.tick_task.await?;
        self.bridge.shutdown().await?;
        tracing::info!("simforge host stopped");
        Ok(())
    }
}

async fn tick_loop(
    registry: Arc<RoomRegistry>,
    parts: LoopParts,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut scheduler = TickScheduler::new(parts.tick);
    let mut eviction = tokio::time::interval(parts.eviction_interval);
    eviction.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; nothing can be
    // evicted yet.
    eviction.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            info = scheduler.wait_for_tick() => {
                registry.tick(info.dt.as_secs_f32()).await;
                scheduler.record_tick_end();
            }
            _ = eviction.tick() => {
                let evicted = registry.evict(parts.eviction.as_ref()).await;
                if !evicted.is_empty() {
                    tracing::info!(?evicted, "evicted rooms");
                }
            }
        }
    }

    tracing::debug!(ticks = scheduler.tick_count(), "tick loop stopped");
}
