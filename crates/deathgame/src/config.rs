//! Server configuration, read from the environment.

use std::time::Duration;

use deathgame_room::RoomConfig;
use serde::{Deserialize, Serialize};

pub const ENV_BIND: &str = "DEATHGAME_BIND";
pub const ENV_ROUND_SECS: &str = "DEATHGAME_ROUND_SECS";
pub const ENV_RESULTS_DELAY_SECS: &str = "DEATHGAME_RESULTS_DELAY_SECS";
pub const ENV_GAME_OVER_GRACE_SECS: &str = "DEATHGAME_GAME_OVER_GRACE_SECS";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "DEATHGAME_IDLE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub bind_addr: String,

    /// Settings applied to every room.
    pub room: RoomConfig,

    /// How often stopped rooms are swept out of the registry.
    pub sweep_interval: Duration,

    /// A connection that sends nothing for this long is closed.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room: RoomConfig::default(),
            sweep_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by any `DEATHGAME_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = lookup(ENV_BIND) {
            let bind = bind.trim();
            if bind.is_empty() {
                return Err(ConfigError::Invalid {
                    var: ENV_BIND,
                    value: bind.to_string(),
                    reason: "expected host:port".into(),
                });
            }
            config.bind_addr = bind.to_string();
        }
        if let Some(secs) = seconds(&lookup, ENV_ROUND_SECS)? {
            config.room.round_time_limit = secs;
        }
        if let Some(secs) = seconds(&lookup, ENV_RESULTS_DELAY_SECS)? {
            config.room.results_delay = secs;
        }
        if let Some(secs) = seconds(&lookup, ENV_GAME_OVER_GRACE_SECS)? {
            config.room.game_over_grace = secs;
        }
        if let Some(secs) = seconds(&lookup, ENV_IDLE_TIMEOUT_SECS)? {
            config.idle_timeout = secs;
        }

        config.room = config.room.validated();
        Ok(config)
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|e| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: format!("expected whole seconds ({e})"),
        })
}
