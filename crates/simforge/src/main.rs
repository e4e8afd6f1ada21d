//! `simforge <edge-program> [args...]`
//!
//! Spawns the edge process, bridges its stdio and runs until the edge
//! exits or Ctrl+C. Logs go to stderr; `RUST_LOG` overrides the default
//! `info` filter.

use simforge::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SimforgeError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let program = args
        .next()
        .ok_or_else(|| SimforgeError::Usage("simforge <edge-program> [args...]".into()))?;
    let mut edge = tokio::process::Command::new(&program);
    edge.args(args);

    tracing::info!(%program, "starting simforge");
    let host = SimHost::builder().spawn_edge(edge)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
        _ = host.closed() => tracing::info!("edge process went away"),
    }

    host.shutdown().await
}
