//! State of the round currently open in a room.

use std::time::Duration;

use deathgame_protocol::{Guess, PlayerId};
use tokio::time::Instant;

use crate::error::GameError;
use crate::scoring::{self, RoundResult, Standing, Submission};

/// Checks a raw guess from the wire and narrows it to `0..=100`.
///
/// Non-numbers, fractions, negatives, values above 100 and non-finite
/// numbers are all rejected.
pub fn parse_guess(raw: Guess) -> Result<u8, GameError> {
    let range = scoring::NUMBER_RANGE;
    let raw = raw.as_f64().ok_or(GameError::InvalidNumber)?;
    if !raw.is_finite() || raw.fract() != 0.0 {
        return Err(GameError::InvalidNumber);
    }
    if raw < f64::from(*range.start()) || raw > f64::from(*range.end()) {
        return Err(GameError::InvalidNumber);
    }
    Ok(raw as u8)
}

/// What [`RoundState::resolve`] hands back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// First resolution of the round; its deltas still need applying.
    Fresh(&'a RoundResult),
    /// The round was already resolved; this is the stored result.
    Replayed(&'a RoundResult),
}

impl<'a> Resolution<'a> {
    pub fn result(self) -> &'a RoundResult {
        match self {
            Self::Fresh(result) | Self::Replayed(result) => result,
        }
    }

    pub fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// One round: its deadline, the submissions so far, and once closed, its
/// result.
#[derive(Debug, Clone)]
pub struct RoundState {
    number: u32,
    time_limit: Duration,
    started_at: Instant,
    deadline: Instant,
    submissions: Vec<Submission>,
    result: Option<RoundResult>,
}

impl RoundState {
    pub fn new(number: u32, time_limit: Duration, now: Instant) -> Self {
        Self {
            number,
            time_limit,
            started_at: now,
            deadline: now + time_limit,
            submissions: Vec::new(),
            result: None,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the round closes if not everyone has submitted by then.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    pub fn has_submitted(&self, player: PlayerId) -> bool {
        self.submissions.iter().any(|s| s.player == player)
    }

    /// Records a guess. Each player gets one per round, and none are taken
    /// once the round is resolved.
    pub fn record(&mut self, player: PlayerId, number: u8) -> Result<(), GameError> {
        if self.is_resolved() {
            return Err(GameError::RoundNotActive);
        }
        if self.has_submitted(player) {
            return Err(GameError::AlreadySubmitted(player));
        }
        self.submissions.push(Submission { player, number });
        Ok(())
    }

    /// `true` once every player in `alive` has a submission.
    pub fn all_submitted(&self, alive: &[PlayerId]) -> bool {
        alive.iter().all(|player| self.has_submitted(*player))
    }

    /// Scores the round against the players alive at its start.
    ///
    /// Only the first call computes anything. Later calls, say a deadline
    /// firing after the last submission already closed the round, get the
    /// stored result back as [`Resolution::Replayed`].
    pub fn resolve(&mut self, alive: &[Standing]) -> Resolution<'_> {
        let replayed = self.result.is_some();
        let submissions = &self.submissions;
        let result = self
            .result
            .get_or_insert_with(|| scoring::resolve(alive, submissions));
        if replayed {
            Resolution::Replayed(result)
        } else {
            Resolution::Fresh(result)
        }
    }
}
