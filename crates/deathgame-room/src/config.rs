//! Room configuration and the room phase state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fewest players a game can start with.
pub const MIN_PLAYERS: usize = 2;

/// Hard room capacity.
pub const MAX_PLAYERS: usize = 5;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Players needed before the creator may start the game.
    pub min_players: usize,

    /// Room capacity. Reaching it starts the game automatically.
    pub max_players: usize,

    /// How long a round stays open for submissions.
    pub round_time_limit: Duration,

    /// Pause on the results screen before the next round opens.
    pub results_delay: Duration,

    /// How long a finished room lingers before it is disposed.
    pub game_over_grace: Duration,

    /// Capacity of the room actor's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS,
            max_players: MAX_PLAYERS,
            round_time_limit: Duration::from_secs(30),
            results_delay: Duration::from_secs(10),
            game_over_grace: Duration::from_secs(60),
            channel_size: 64,
        }
    }
}

impl RoomConfig {
    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// - player bounds forced into `MIN_PLAYERS..=MAX_PLAYERS`, with
    ///   `min_players <= max_players`
    /// - a zero round time limit falls back to one second
    /// - channel size is at least 1
    pub fn validated(mut self) -> Self {
        self.max_players = self.max_players.clamp(MIN_PLAYERS, MAX_PLAYERS);
        self.min_players = self.min_players.clamp(MIN_PLAYERS, self.max_players);
        if self.round_time_limit.is_zero() {
            tracing::warn!("round time limit of zero, using 1s");
            self.round_time_limit = Duration::from_secs(1);
        }
        self.channel_size = self.channel_size.max(1);
        self
    }

    /// The round time limit as announced to clients, in whole seconds
    /// (rounded up).
    pub fn time_limit_secs(&self) -> u64 {
        self.round_time_limit.as_secs_f64().ceil() as u64
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its lifecycle.
///
/// ```text
/// Waiting → Playing ⇄ Results → GameOver
/// ```
///
/// - **Waiting**: lobby, players may join.
/// - **Playing**: a round is open for submissions.
/// - **Results**: the round is scored; the next round opens after the
///   results delay.
/// - **GameOver**: at most one player is left alive. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    Waiting,
    Playing,
    Results,
    GameOver,
}

impl RoomPhase {
    /// Returns `true` if new players may join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` once the game has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Playing)
                | (Self::Playing, Self::Results)
                | (Self::Results, Self::Playing)
                | (Self::Results, Self::GameOver)
        )
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Playing => write!(f, "PLAYING"),
            Self::Results => write!(f, "RESULTS"),
            Self::GameOver => write!(f, "GAME_OVER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_phase_legal_transitions() {
        assert!(RoomPhase::Waiting.can_transition_to(RoomPhase::Playing));
        assert!(RoomPhase::Playing.can_transition_to(RoomPhase::Results));
        assert!(RoomPhase::Results.can_transition_to(RoomPhase::Playing));
        assert!(RoomPhase::Results.can_transition_to(RoomPhase::GameOver));
    }

    #[test]
    fn test_room_phase_rejects_skips_and_reversals() {
        assert!(!RoomPhase::Waiting.can_transition_to(RoomPhase::Results));
        assert!(!RoomPhase::Playing.can_transition_to(RoomPhase::GameOver));
        assert!(!RoomPhase::Playing.can_transition_to(RoomPhase::Waiting));
        assert!(!RoomPhase::GameOver.can_transition_to(RoomPhase::Playing));
    }

    #[test]
    fn test_room_phase_is_joinable() {
        assert!(RoomPhase::Waiting.is_joinable());
        assert!(!RoomPhase::Playing.is_joinable());
        assert!(!RoomPhase::Results.is_joinable());
        assert!(!RoomPhase::GameOver.is_joinable());
    }

    #[test]
    fn test_room_phase_display() {
        assert_eq!(RoomPhase::GameOver.to_string(), "GAME_OVER");
        assert_eq!(RoomPhase::Waiting.to_string(), "WAITING");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 5);
        assert_eq!(config.results_delay, Duration::from_secs(10));
        assert_eq!(config.time_limit_secs(), 30);
    }

    #[test]
    fn test_room_config_validated_clamps_player_bounds() {
        let config = RoomConfig {
            min_players: 0,
            max_players: 12,
            channel_size: 0,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 5);
        assert_eq!(config.channel_size, 1);
    }

    #[test]
    fn test_room_config_validated_keeps_min_below_max() {
        let config = RoomConfig {
            min_players: 5,
            max_players: 3,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.max_players, 3);
        assert_eq!(config.min_players, 3);
    }

    #[test]
    fn test_time_limit_secs_rounds_up() {
        let config = RoomConfig {
            round_time_limit: Duration::from_millis(1500),
            ..RoomConfig::default()
        };
        assert_eq!(config.time_limit_secs(), 2);
    }
}
