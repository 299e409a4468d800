//! Rooms, rounds, and scoring for the Death Game server.
//!
//! A room holds two to five players who each pick a number from 0 to 100
//! every round. Whoever lands closest to 80% of the average wins the
//! round; everyone else loses points, and a player who falls to −10 is
//! out. The last player standing wins the game.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms and finds them by code
//! - [`RoomHandle`]: talks to one running room actor
//! - [`RoomSession`]: the room's state machine, free of I/O
//! - [`RoundState`]: submissions and the deadline of one round
//! - [`scoring::resolve`]: the scoring rules as a pure function
//! - [`RoomConfig`] / [`RoomPhase`]: room settings and lifecycle

mod config;
mod error;
mod registry;
mod room;
mod round;
pub mod scoring;
mod session;
mod timer;

pub use config::{MAX_PLAYERS, MIN_PLAYERS, RoomConfig, RoomPhase};
pub use error::GameError;
pub use registry::{CODE_LEN, RoomRegistry};
pub use room::{PlayerSender, RoomHandle, RoomInfo};
pub use round::{Resolution, RoundState, parse_guess};
pub use scoring::{Outcome, RoundResult};
pub use session::{MAX_NAME_LEN, Outbound, Player, RoomSession, validate_name};
