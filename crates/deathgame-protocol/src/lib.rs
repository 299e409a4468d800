//! Wire protocol for the Death Game server.
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`PlayerView`], ...):
//!   the events that travel between the browser and the server.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how events become frames.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about rooms or connections.
//!
//! ```text
//! Transport (frames) → Protocol (events) → Room (game rules)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, CreateRoomRequest, ErrorCode, ErrorReply, GameOverInfo, JoinRoomRequest,
    Guess, PlayerId, PlayerRef, PlayerView, RoomCode, RoundInfo, RoundResults,
    ServerEvent, StartGameRequest, SubmitNumberRequest,
};
