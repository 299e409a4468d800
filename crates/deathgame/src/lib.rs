//! # Death Game
//!
//! A WebSocket server for a multiplayer elimination game. Two to five
//! players share a room; every round each picks a number from 0 to 100,
//! the one closest to 80% of the average wins, and everyone else loses
//! points until only one player is left.
//!
//! The crate ties the layers together:
//!
//! ```text
//! deathgame-transport (WebSocket frames)
//!   → deathgame-protocol (ClientEvent / ServerEvent)
//!     → deathgame-room (registry, room actors, scoring)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deathgame::prelude::*;
//!
//! # async fn run() -> Result<(), DeathGameError> {
//! let config = ServerConfig::from_env()?;
//! let server = DeathGameServer::builder().config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod logging;
mod server;

pub use config::{
    ConfigError, ENV_BIND, ENV_GAME_OVER_GRACE_SECS, ENV_IDLE_TIMEOUT_SECS,
    ENV_RESULTS_DELAY_SECS, ENV_ROUND_SECS, ServerConfig,
};
pub use error::DeathGameError;
pub use server::{DeathGameServer, DeathGameServerBuilder};

/// The types most users need, in one import.
pub mod prelude {
    pub use crate::{
        ConfigError, DeathGameError, DeathGameServer, DeathGameServerBuilder, ServerConfig,
    };
    pub use deathgame_protocol::{
        ClientEvent, Codec, ErrorCode, JsonCodec, PlayerId, PlayerView, RoomCode, ServerEvent,
    };
    pub use deathgame_room::{GameError, RoomConfig, RoomInfo, RoomPhase, RoomRegistry};
}
