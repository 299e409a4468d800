//! Error types for the room layer.

use deathgame_protocol::{ErrorCode, PlayerId, RoomCode};

/// Why a room rejected a request.
///
/// Every variant is recoverable: the request is refused and answered with
/// an `error` event, and the game carries on for everyone else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Empty (after trimming) or too long.
    #[error("player name must be between 1 and {max} characters")]
    InvalidName { max: usize },

    /// Not a whole number in `0..=100`.
    #[error("number must be a whole number from 0 to 100")]
    InvalidNumber,

    #[error("room {0} is full")]
    RoomFull(RoomCode),

    #[error("the game in room {0} has already started")]
    GameAlreadyStarted(RoomCode),

    #[error("at least {0} players are needed to start")]
    NotEnoughPlayers(usize),

    /// Unknown code, or a room that has already been disposed.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("player {0} already submitted a number this round")]
    AlreadySubmitted(PlayerId),

    #[error("player {0} has been eliminated")]
    PlayerNotAlive(PlayerId),

    #[error("the game is over")]
    GameOver,

    /// Submission outside of an open round (lobby or results screen).
    #[error("no round is open for submissions")]
    RoundNotActive,

    #[error("only the room creator can start the game")]
    NotRoomCreator,

    /// The connection already plays in a room.
    #[error("already playing in room {0}")]
    AlreadyInRoom(RoomCode),

    /// The room exists but the connection has no seat in it.
    #[error("not playing in room {0}")]
    NotInRoom(RoomCode),
}

impl GameError {
    /// The stable code sent to the client in the `error` event.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidName { .. } => ErrorCode::InvalidName,
            Self::InvalidNumber => ErrorCode::InvalidNumber,
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::GameAlreadyStarted(_) => ErrorCode::GameAlreadyStarted,
            Self::NotEnoughPlayers(_) => ErrorCode::NotEnoughPlayers,
            Self::RoomNotFound(_) => ErrorCode::RoomNotFound,
            Self::PlayerNotFound(_) | Self::NotInRoom(_) => ErrorCode::PlayerNotFound,
            Self::AlreadySubmitted(_) => ErrorCode::AlreadySubmitted,
            Self::PlayerNotAlive(_) => ErrorCode::PlayerNotAlive,
            Self::GameOver => ErrorCode::GameOver,
            Self::RoundNotActive => ErrorCode::RoundNotActive,
            Self::NotRoomCreator => ErrorCode::NotRoomCreator,
            Self::AlreadyInRoom(_) => ErrorCode::AlreadyInRoom,
        }
    }
}
