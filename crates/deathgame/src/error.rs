//! Unified error type for the server.

use deathgame_protocol::ProtocolError;
use deathgame_room::GameError;
use deathgame_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum DeathGameError {
    /// Binding, accepting, or talking to a socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room refused a request.
    #[error(transparent)]
    Room(#[from] GameError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use deathgame_protocol::RoomCode;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: DeathGameError = err.into();
        assert!(matches!(err, DeathGameError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: DeathGameError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, DeathGameError::Protocol(_)));
    }

    #[test]
    fn test_from_game_error_keeps_message() {
        let err: DeathGameError = GameError::RoomNotFound(RoomCode::new("abcdef")).into();
        assert!(matches!(err, DeathGameError::Room(_)));
        assert_eq!(err.to_string(), "room ABCDEF not found");
    }

    #[test]
    fn test_from_config_error() {
        let err: DeathGameError = ConfigError::Invalid {
            var: "DEATHGAME_ROUND_SECS",
            value: "soon".into(),
            reason: "expected whole seconds".into(),
        }
        .into();
        assert!(err.to_string().contains("DEATHGAME_ROUND_SECS"));
    }
}
