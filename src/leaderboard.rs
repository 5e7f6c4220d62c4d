//! Leaderboard and score tracking
//!
//! This module accumulates the points players earn across rounds, maintains
//! the sorted standings, and produces the score views sent to hosts and
//! players at the end of each round and at the end of the session.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{TruncatedVec, roster::Id};

/// Maximum number of entries included in broadcast standings
const STANDINGS_LIMIT: usize = 50;

/// Aggregated statistics for a finished session
#[derive(Debug, Clone)]
pub struct FinalSummary {
    /// For each round, tuple of (players who earned points, players who didn't)
    stats: Vec<(usize, usize)>,
    /// For each player, the points they earned on each round
    mapping: HashMap<Id, Vec<u64>>,
}

/// Serialization helper for Leaderboard struct
#[derive(Deserialize)]
struct LeaderboardSerde {
    rounds: Vec<Vec<(Id, u64)>>,
}

/// Tracks scores across rounds for a session
///
/// The per-round scores are the source of truth; the sorted standings and
/// the per-player position index are caches rebuilt whenever a round is
/// recorded or the leaderboard is deserialized.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "LeaderboardSerde")]
pub struct Leaderboard {
    /// Points earned by each player for each round, in round order
    rounds: Vec<Vec<(Id, u64)>>,

    /// Previous round's cumulative scores in descending order (cached)
    #[serde(skip)]
    previous_standings: Vec<(Id, u64)>,
    /// Current cumulative scores in descending order (cached)
    #[serde(skip)]
    standings: Vec<(Id, u64)>,
    /// Mapping from player ID to their total score and position (cached)
    #[serde(skip)]
    score_and_position: HashMap<Id, (u64, usize)>,
    /// Final session summary (computed once when needed)
    #[serde(skip)]
    final_summary: once_cell_serde::sync::OnceCell<FinalSummary>,
}

/// Sums per-round scores into a cumulative total per player
fn cumulative<'a, I: Iterator<Item = &'a Vec<(Id, u64)>>>(rounds: I) -> HashMap<Id, u64> {
    rounds
        .flat_map(|round| round.iter().copied())
        .sorted_by_key(|(id, _)| *id)
        .coalesce(|(id1, points1), (id2, points2)| {
            if id1 == id2 {
                Ok((id1, points1 + points2))
            } else {
                Err(((id1, points1), (id2, points2)))
            }
        })
        .collect()
}

/// Sorts a cumulative score mapping into descending standings
fn descending(totals: &HashMap<Id, u64>) -> Vec<(Id, u64)> {
    totals
        .iter()
        .sorted_by_key(|(_, points)| *points)
        .rev()
        .map(|(id, points)| (*id, *points))
        .collect_vec()
}

impl From<LeaderboardSerde> for Leaderboard {
    /// Reconstructs the Leaderboard from serialized data
    ///
    /// This rebuilds all the cached standings from the per-round scores,
    /// which is necessary since the cached fields are not serialized.
    fn from(serde: LeaderboardSerde) -> Self {
        let standings = descending(&cumulative(serde.rounds.iter()));
        let previous_standings = descending(&cumulative(serde.rounds.iter().rev().skip(1).rev()));

        let score_and_position = standings
            .iter()
            .enumerate()
            .map(|(i, (id, p))| (*id, (*p, i)))
            .collect();

        Leaderboard {
            rounds: serde.rounds,
            previous_standings,
            standings,
            score_and_position,
            final_summary: once_cell_serde::sync::OnceCell::new(),
        }
    }
}

/// Score information for a single player
///
/// Contains the player's current total and their position in the standings.
#[derive(Debug, Serialize, Clone, Copy)]
pub struct ScoreMessage {
    /// Total points earned by the player
    pub points: u64,
    /// Current position in the standings (0-indexed)
    pub position: usize,
}

impl Leaderboard {
    /// Records the scores of a finished round and updates the standings
    ///
    /// # Arguments
    ///
    /// * `scores` - Slice of (player_id, points_earned) tuples for the round
    pub fn record_round(&mut self, scores: &[(Id, u64)]) {
        let mut totals: HashMap<Id, u64> = self
            .score_and_position
            .iter()
            .map(|(id, (points, _))| (*id, *points))
            .collect();

        for (id, points) in scores {
            *totals.entry(*id).or_default() += points;
        }

        let standings = descending(&totals);

        let mapping = standings
            .iter()
            .enumerate()
            .map(|(position, (id, points))| (*id, (*points, position)))
            .collect();

        self.rounds.push(scores.to_vec());

        self.previous_standings = std::mem::replace(&mut self.standings, standings);

        self.score_and_position = mapping;
    }

    /// Returns the current and previous standings for display
    ///
    /// Both lists are truncated for broadcast; showing the previous round's
    /// standings alongside the current ones lets clients animate position
    /// changes.
    ///
    /// # Returns
    ///
    /// An array of [current_standings, previous_standings] where each entry
    /// is (player_id, total_score)
    pub fn standings_pair(&self) -> [TruncatedVec<(Id, u64)>; 2] {
        [
            TruncatedVec::new(
                self.standings.iter().copied(),
                STANDINGS_LIMIT,
                self.standings.len(),
            ),
            TruncatedVec::new(
                self.previous_standings.iter().copied(),
                STANDINGS_LIMIT,
                self.previous_standings.len(),
            ),
        ]
    }

    /// Computes the final session statistics
    fn compute_final_summary(&self) -> FinalSummary {
        FinalSummary {
            stats: self
                .rounds
                .iter()
                .map(|round| {
                    let earned_count = round.iter().filter(|(_, earned)| *earned > 0).count();

                    (earned_count, round.len() - earned_count)
                })
                .collect(),
            mapping: self
                .rounds
                .iter()
                .map(|round| round.iter().copied().collect::<HashMap<_, _>>())
                .enumerate()
                .fold(HashMap::new(), |mut aggregate, (round_index, scores)| {
                    for (id, points) in scores {
                        // Pad rounds the player missed before this one
                        let entry: &mut Vec<u64> = aggregate.entry(id).or_default();
                        entry.resize(round_index, 0);
                        entry.push(points);
                    }
                    for v in aggregate.values_mut() {
                        v.resize(round_index + 1, 0);
                    }
                    aggregate
                }),
        }
    }

    /// Gets or computes the final session summary with caching
    fn final_summary(&self) -> &FinalSummary {
        self.final_summary.get_or_init(|| self.compute_final_summary())
    }

    /// Generates summary statistics for the host's finished view
    ///
    /// # Returns
    ///
    /// A tuple of (scored_player_count, per_round_stats) where
    /// per_round_stats holds (players who earned points, players who
    /// didn't) for each round
    pub fn host_summary(&self) -> (usize, Vec<(usize, usize)>) {
        let final_summary = self.final_summary();

        (final_summary.mapping.len(), final_summary.stats.clone())
    }

    /// Generates a player's per-round score breakdown
    ///
    /// Rounds the player missed are filled with zeros.
    ///
    /// # Arguments
    ///
    /// * `id` - The player's unique identifier
    ///
    /// # Returns
    ///
    /// A vector containing the player's score for each round in order
    pub fn player_summary(&self, id: Id) -> Vec<u64> {
        self.final_summary()
            .mapping
            .get(&id)
            .map_or(vec![0; self.rounds.len()], std::clone::Clone::clone)
    }

    /// Gets the current score and position for a specific player
    ///
    /// # Arguments
    ///
    /// * `id` - The player's unique identifier
    ///
    /// # Returns
    ///
    /// `Some(ScoreMessage)` with the player's total and position, or `None`
    /// if the player has no recorded scores
    pub fn score(&self, id: Id) -> Option<ScoreMessage> {
        let (points, position) = self.score_and_position.get(&id)?;
        Some(ScoreMessage {
            points: *points,
            position: *position,
        })
    }
}
