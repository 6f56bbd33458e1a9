//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration, overridable from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub addr: SocketAddr,
    /// How long a lone player waits before being paired with the bot.
    pub matchmaking_timeout: Duration,
    /// Grace period for a disconnected player to return before forfeiting.
    pub reconnection_timeout: Duration,
    /// Delay before the bot answers, so turns feel like turns.
    pub bot_move_delay: Duration,
    /// Interval of the defensive sweep over stale disconnect entries.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".parse().expect("static address"),
            matchmaking_timeout: Duration::from_secs(10),
            reconnection_timeout: Duration::from_secs(30),
            bot_move_delay: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Recognized: `SERVER_ADDR`, `MATCHMAKING_TIMEOUT_MS`,
    /// `RECONNECTION_TIMEOUT_MS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SERVER_ADDR") {
            config.addr = addr.parse()?;
        }
        if let Some(ms) = env_ms("MATCHMAKING_TIMEOUT_MS")? {
            config.matchmaking_timeout = ms;
        }
        if let Some(ms) = env_ms("RECONNECTION_TIMEOUT_MS")? {
            config.reconnection_timeout = ms;
        }

        Ok(config)
    }
}

fn env_ms(name: &str) -> anyhow::Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(value) => {
            let ms: u64 = value
                .parse()
                .map_err(|e| anyhow::anyhow!("{} must be milliseconds: {}", name, e))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}
