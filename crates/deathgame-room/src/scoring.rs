//! Round scoring: the rules of the game as one pure function.
//!
//! [`resolve`] takes the players alive at the start of a round and what
//! they submitted, and returns a [`RoundResult`]. It never touches player
//! state; the room applies the deltas it reports.
//!
//! Rules, by number of players alive at round start:
//!
//! | alive | rule |
//! |---|---|
//! | any | closest to 80% of the average wins, everyone else loses 1 |
//! | 4 | numbers picked twice or more are void: their holders cannot win |
//! | 3 | hitting the target exactly makes every loser lose 2 instead of 1 |
//! | 2 | a 0 against a 100 is won by the 100 |
//!
//! A player whose points fall to −10 or below is eliminated.

use std::collections::{BTreeMap, BTreeSet};

use deathgame_protocol::PlayerId;

/// Target = average × `TARGET_RATIO`.
pub const TARGET_RATIO: f64 = 0.8;

/// Points at or below which a player is eliminated.
pub const ELIMINATION_POINTS: i32 = -10;

/// Lowest and highest number a player may submit.
pub const NUMBER_RANGE: std::ops::RangeInclusive<u8> = 0..=100;

/// A player alive at the start of the round, with their points so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub player: PlayerId,
    pub points: i32,
}

/// One submitted number. Slices of submissions are in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub player: PlayerId,
    pub number: u8,
}

/// How the game stands once a round's eliminations are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Two or more players remain; play another round.
    Continue,
    /// Exactly one player remains.
    Winner(PlayerId),
    /// The round eliminated every remaining player.
    NoSurvivors,
}

impl Outcome {
    pub fn is_game_over(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// Everything decided by one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    /// Mean of the counted submissions; 0 when nobody submitted.
    pub average: f64,
    pub target: f64,
    /// Counted submissions by player.
    pub numbers: BTreeMap<PlayerId, u8>,
    /// Numbers voided by the four-player rule. Empty for other counts.
    pub duplicates: BTreeSet<u8>,
    pub winner: Option<PlayerId>,
    /// The three-player exact match applied (losers lose 2).
    pub exact_match: bool,
    /// Point change for every player alive at round start, in standing
    /// order. The winner's entry is 0.
    pub deltas: Vec<(PlayerId, i32)>,
    /// Players whose points reach the elimination threshold, in standing
    /// order.
    pub eliminated: Vec<PlayerId>,
    pub outcome: Outcome,
}

impl RoundResult {
    /// The point change for `player`, or `None` if they were not alive at
    /// round start.
    pub fn delta_for(&self, player: PlayerId) -> Option<i32> {
        self.deltas
            .iter()
            .find(|(id, _)| *id == player)
            .map(|(_, delta)| *delta)
    }

    /// Sum of all point changes in the round.
    pub fn total_delta(&self) -> i32 {
        self.deltas.iter().map(|(_, delta)| delta).sum()
    }
}

/// Scores one round.
///
/// `alive` lists the players alive when the round opened, in join order.
/// Submissions from anyone else are ignored, as is any second submission
/// from the same player. Alive players who did not submit are left out of
/// the average but still lose the round.
///
/// Ties on distance go to the earliest submission.
pub fn resolve(alive: &[Standing], submissions: &[Submission]) -> RoundResult {
    let counted = counted_submissions(alive, submissions);

    let count = counted.len() as i64;
    let sum: i64 = counted.iter().map(|s| i64::from(s.number)).sum();
    let average = if count == 0 { 0.0 } else { sum as f64 / count as f64 };
    let target = average * TARGET_RATIO;

    let duplicates = if alive.len() == 4 {
        duplicate_numbers(&counted)
    } else {
        BTreeSet::new()
    };

    let closest = closest_to_target(
        counted.iter().filter(|s| !duplicates.contains(&s.number)),
        sum,
        count,
    );

    let (winner, exact_match) = match alive.len() {
        2 => (hundred_beats_zero(&counted).or(closest), false),
        3 => {
            let exact = closest.is_some_and(|s| distance(s.number, sum, count) == 0);
            (closest, exact)
        }
        _ => (closest, false),
    };
    let winner = winner.map(|s| s.player);

    let penalty = if exact_match { 2 } else { 1 };
    let deltas: Vec<(PlayerId, i32)> = alive
        .iter()
        .map(|standing| {
            let delta = if Some(standing.player) == winner {
                0
            } else {
                -penalty
            };
            (standing.player, delta)
        })
        .collect();

    let eliminated: Vec<PlayerId> = alive
        .iter()
        .zip(&deltas)
        .filter(|(standing, (_, delta))| standing.points + delta <= ELIMINATION_POINTS)
        .map(|(standing, _)| standing.player)
        .collect();

    let mut survivors = alive
        .iter()
        .map(|standing| standing.player)
        .filter(|player| !eliminated.contains(player));
    let outcome = match (survivors.next(), survivors.next()) {
        (None, _) => Outcome::NoSurvivors,
        (Some(last), None) => Outcome::Winner(last),
        (Some(_), Some(_)) => Outcome::Continue,
    };

    RoundResult {
        average,
        target,
        numbers: counted.iter().map(|s| (s.player, s.number)).collect(),
        duplicates,
        winner,
        exact_match,
        deltas,
        eliminated,
        outcome,
    }
}

/// First submission of each alive player, in submission order.
fn counted_submissions(alive: &[Standing], submissions: &[Submission]) -> Vec<Submission> {
    let mut seen = BTreeSet::new();
    submissions
        .iter()
        .filter(|s| alive.iter().any(|standing| standing.player == s.player))
        .filter(|s| seen.insert(s.player))
        .copied()
        .collect()
}

fn duplicate_numbers(counted: &[Submission]) -> BTreeSet<u8> {
    let mut tally: BTreeMap<u8, usize> = BTreeMap::new();
    for s in counted {
        *tally.entry(s.number).or_default() += 1;
    }
    tally
        .into_iter()
        .filter(|(_, n)| *n >= 2)
        .map(|(number, _)| number)
        .collect()
}

/// |number − target| scaled by 5·count, so comparisons stay exact:
/// target = 0.8 · sum / count = 4 · sum / (5 · count).
fn distance(number: u8, sum: i64, count: i64) -> i64 {
    (5 * i64::from(number) * count - 4 * sum).abs()
}

fn closest_to_target<'a>(
    eligible: impl Iterator<Item = &'a Submission>,
    sum: i64,
    count: i64,
) -> Option<&'a Submission> {
    let mut best: Option<(&Submission, i64)> = None;
    for s in eligible {
        let d = distance(s.number, sum, count);
        // Strict `<` keeps the earlier submission on a tie.
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((s, d));
        }
    }
    best.map(|(s, _)| s)
}

fn hundred_beats_zero(counted: &[Submission]) -> Option<&Submission> {
    match counted {
        [a, b] if a.number.min(b.number) == 0 && a.number.max(b.number) == 100 => {
            if a.number == 100 { Some(a) } else { Some(b) }
        }
        _ => None,
    }
}
