//! The game state of one room, without any I/O.
//!
//! [`RoomSession`] owns the players, the phase and the current round.
//! Every operation returns the events it produced, all of them meant for
//! every player in the room, and leaves delivery and timing to the room
//! actor, so the whole state machine can be driven from plain unit tests.

use deathgame_protocol::{
    GameOverInfo, Guess, PlayerId, PlayerRef, PlayerView, RoomCode, RoundInfo,
    RoundResults, ServerEvent,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{RoomConfig, RoomPhase};
use crate::error::GameError;
use crate::round::{self, Resolution, RoundState};
use crate::scoring::{Outcome, RoundResult, Standing};

/// Longest accepted player name, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Events a session operation wants broadcast to the room, in order.
pub type Outbound = Vec<ServerEvent>;

/// Trims a display name and checks its length.
pub fn validate_name(raw: &str) -> Result<String, GameError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(GameError::InvalidName { max: MAX_NAME_LEN });
    }
    Ok(name.to_owned())
}

/// A player seated in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub points: i32,
    pub alive: bool,
}

impl Player {
    fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            points: 0,
            alive: true,
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            points: self.points,
            is_alive: self.alive,
        }
    }

    pub fn reference(&self) -> PlayerRef {
        PlayerRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

pub struct RoomSession {
    code: RoomCode,
    config: RoomConfig,
    phase: RoomPhase,
    /// Join order.
    players: Vec<Player>,
    next_player_id: u32,
    round: Option<RoundState>,
}

impl RoomSession {
    pub fn new(code: RoomCode, config: RoomConfig) -> Self {
        Self {
            code,
            config,
            phase: RoomPhase::Waiting,
            players: Vec::new(),
            next_player_id: 1,
            round: None,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The room creator, or whoever joined earliest if the creator left
    /// the lobby.
    pub fn host(&self) -> Option<PlayerId> {
        self.players.first().map(|p| p.id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// The open or most recent round.
    pub fn current_round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    /// 0 until the game starts.
    pub fn round_number(&self) -> u32 {
        self.round.as_ref().map_or(0, RoundState::number)
    }

    /// The roster as clients see it, in join order.
    pub fn roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::view).collect()
    }

    fn roster_event(&self) -> ServerEvent {
        ServerEvent::PlayerJoined {
            players: self.roster(),
        }
    }

    fn reference(&self, id: PlayerId) -> Option<PlayerRef> {
        self.player(id).map(Player::reference)
    }

    fn transition(&mut self, to: RoomPhase) {
        debug_assert!(
            self.phase.can_transition_to(to),
            "illegal transition {} -> {to}",
            self.phase
        );
        debug!(room = %self.code, from = %self.phase, %to, "phase change");
        self.phase = to;
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    /// Seats a new player and broadcasts the roster.
    pub fn add_player(&mut self, raw_name: &str) -> Result<(PlayerId, Outbound), GameError> {
        if self.is_full() {
            return Err(GameError::RoomFull(self.code.clone()));
        }
        if !self.phase.is_joinable() {
            return Err(GameError::GameAlreadyStarted(self.code.clone()));
        }
        let name = validate_name(raw_name)?;

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        info!(room = %self.code, player = %id, %name, "player joined");
        self.players.push(Player::new(id, name));

        Ok((id, vec![self.roster_event()]))
    }

    /// Drops a player who left the lobby. Once the game has started the
    /// seat is kept and the player simply stops submitting.
    pub fn remove_waiting_player(&mut self, id: PlayerId) -> Outbound {
        if !self.phase.is_joinable() {
            return Vec::new();
        }
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        if self.players.len() == before {
            return Vec::new();
        }
        info!(room = %self.code, player = %id, "player left the lobby");
        vec![self.roster_event()]
    }

    /// Opens round 1.
    ///
    /// `requested_by` is the player asking for an early start, or `None`
    /// when the room starts itself at capacity.
    pub fn start(
        &mut self,
        requested_by: Option<PlayerId>,
        now: Instant,
    ) -> Result<Outbound, GameError> {
        if !self.phase.is_joinable() {
            return Err(GameError::GameAlreadyStarted(self.code.clone()));
        }
        if let Some(id) = requested_by {
            if self.player(id).is_none() {
                return Err(GameError::PlayerNotFound(id));
            }
            if self.host() != Some(id) {
                return Err(GameError::NotRoomCreator);
            }
        }
        if self.players.len() < self.config.min_players {
            return Err(GameError::NotEnoughPlayers(self.config.min_players));
        }

        self.transition(RoomPhase::Playing);
        let info = self.open_round(1, now);
        info!(room = %self.code, players = self.players.len(), "game started");
        Ok(vec![ServerEvent::GameStart(info)])
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    fn open_round(&mut self, number: u32, now: Instant) -> RoundInfo {
        self.round = Some(RoundState::new(number, self.config.round_time_limit, now));
        RoundInfo {
            round: number,
            time_limit: self.config.time_limit_secs(),
        }
    }

    fn alive_ids(&self) -> Vec<PlayerId> {
        self.players.iter().filter(|p| p.alive).map(|p| p.id).collect()
    }

    fn standings(&self) -> Vec<Standing> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| Standing {
                player: p.id,
                points: p.points,
            })
            .collect()
    }

    /// Records a guess for the open round.
    ///
    /// Returns `true` when every alive player has now submitted and the
    /// round is ready to close.
    pub fn submit(&mut self, id: PlayerId, raw: impl Into<Guess>) -> Result<bool, GameError> {
        if self.phase.is_terminal() {
            return Err(GameError::GameOver);
        }
        let player = self.player(id).ok_or(GameError::PlayerNotFound(id))?;
        if !player.alive {
            return Err(GameError::PlayerNotAlive(id));
        }
        if self.phase != RoomPhase::Playing {
            return Err(GameError::RoundNotActive);
        }
        let number = round::parse_guess(raw.into())?;

        let alive = self.alive_ids();
        let round = self.round.as_mut().ok_or(GameError::RoundNotActive)?;
        round.record(id, number)?;
        debug!(room = %self.code, player = %id, round = round.number(), number, "number submitted");
        Ok(round.all_submitted(&alive))
    }

    /// Closes the open round: scores it, applies points and eliminations,
    /// and moves to RESULTS, or straight on to GAME_OVER when at most one
    /// player is left.
    ///
    /// Calling it again for a round that is already closed does nothing.
    pub fn close_round(&mut self) -> Outbound {
        if self.phase != RoomPhase::Playing {
            debug!(room = %self.code, phase = %self.phase, "no open round to close");
            return Vec::new();
        }
        let standings = self.standings();
        let Some(round) = self.round.as_mut() else {
            return Vec::new();
        };
        let number = round.number();
        let result = match round.resolve(&standings) {
            Resolution::Fresh(result) => result.clone(),
            Resolution::Replayed(_) => {
                debug!(room = %self.code, round = number, "round already resolved");
                return Vec::new();
            }
        };

        self.apply(&result);
        self.transition(RoomPhase::Results);
        info!(
            room = %self.code,
            round = number,
            target = result.target,
            winner = ?result.winner,
            eliminated = result.eliminated.len(),
            "round resolved"
        );

        let mut out = vec![
            ServerEvent::RoundResults(self.results_event(number, &result)),
            self.roster_event(),
        ];

        if result.outcome.is_game_over() {
            self.transition(RoomPhase::GameOver);
            let winner = match result.outcome {
                Outcome::Winner(id) => self.reference(id),
                Outcome::NoSurvivors | Outcome::Continue => None,
            };
            info!(room = %self.code, winner = ?winner.as_ref().map(|w| w.id), "game over");
            out.push(ServerEvent::GameOver(GameOverInfo {
                winner,
                final_scores: self.roster(),
            }));
        }
        out
    }

    fn apply(&mut self, result: &RoundResult) {
        for player in &mut self.players {
            if let Some(delta) = result.delta_for(player.id) {
                player.points += delta;
            }
            if result.eliminated.contains(&player.id) {
                player.alive = false;
            }
        }
    }

    fn results_event(&self, round: u32, result: &RoundResult) -> RoundResults {
        RoundResults {
            round,
            average: result.average,
            target: result.target,
            duplicates: result.duplicates.iter().copied().collect(),
            winner: result.winner.and_then(|id| self.reference(id)),
            numbers: result.numbers.clone(),
            eliminations: result
                .eliminated
                .iter()
                .filter_map(|id| self.reference(*id))
                .collect(),
            exact_match: result.exact_match,
        }
    }

    /// Leaves the results screen and opens the next round.
    ///
    /// Does nothing unless the room is showing results.
    pub fn begin_next_round(&mut self, now: Instant) -> Outbound {
        if self.phase != RoomPhase::Results {
            return Vec::new();
        }
        let number = self.round_number() + 1;
        self.transition(RoomPhase::Playing);
        let info = self.open_round(number, now);
        info!(room = %self.code, round = number, alive = self.alive_count(), "round started");
        vec![ServerEvent::RoundStart(info)]
    }
}
