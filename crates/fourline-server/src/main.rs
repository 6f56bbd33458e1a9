//! Fourline multiplayer game server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod events;
mod matchmaking;
mod protocol;
mod reconnect;
mod registry;
mod session;
mod store;

use config::ServerConfig;
use events::LogSink;
use session::ServerState;
use store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr;

    info!("Starting Fourline server...");

    let state = Arc::new(ServerState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(LogSink),
    ));

    reconnect::spawn_sweeper(Arc::clone(&state));

    session::run_server(addr, state).await
}
