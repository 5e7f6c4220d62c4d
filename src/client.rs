//! Per-device session client
//!
//! This module mirrors the authoritative room state on a single device. The
//! client consumes the room's sequence-numbered deltas and snapshots,
//! discarding anything stale, and exposes the view a device should render:
//! lobby, open question, results, or final summary.
//!
//! The client is deliberately dumb: it never grades, scores, or progresses
//! on its own. Every transition it shows was decided by the room.

use serde::Serialize;

use crate::{
    Snapshot, StateDelta, SyncMessage, TruncatedVec, UpdateMessage,
    grading::Submission,
    leaderboard::ScoreMessage,
    quiz::{CorrectAnswer, QuestionView},
    room::{self, StandingsMessage, SummaryMessage},
    round,
};

/// What a device should currently render
#[derive(Debug, Clone, Serialize, Default)]
pub enum ClientPhase {
    /// Waiting for the session to start
    #[default]
    Idle,
    /// The lobby with the joined players
    Lobby {
        /// Names of joined players
        players: TruncatedVec<String>,
    },
    /// A question is open for answering
    Question {
        /// Index of the open question (0-based)
        index: usize,
        /// Total number of questions
        count: usize,
        /// The prompt text
        prompt: String,
        /// The controls to render
        view: QuestionView,
        /// How many players have answered (host display)
        answered_count: usize,
    },
    /// Results of a revealed question
    Results {
        /// Index of the revealed question
        index: usize,
        /// Total number of questions
        count: usize,
        /// The revealed correct answer, if this device saw the reveal
        correct: Option<CorrectAnswer>,
        /// Optional explanation text
        explanation: Option<String>,
        /// This device's score, once delivered
        score: Option<ScoreMessage>,
        /// The round's standings, once delivered (host display)
        standings: Option<StandingsMessage>,
    },
    /// The session is over
    Finished {
        /// The final summary, if delivered
        summary: Option<SummaryMessage>,
    },
}

/// The local results a player can review after the session
#[derive(Debug, Clone, Serialize)]
pub struct FinalResults {
    /// The submissions this device recorded, by question index
    pub answers: Vec<Option<Submission>>,
    /// The final summary received from the room
    pub summary: SummaryMessage,
}

/// Reactive mirror of the room state for one device
///
/// Deltas with a sequence number at or below the last applied one are
/// dropped, so replays and out-of-order delivery cannot move the view
/// backwards. Snapshots always win: a reconnecting device adopts whatever
/// the room says is current, even if it skips ahead of everything the
/// device saw before.
#[derive(Debug, Default)]
pub struct SessionClient {
    /// Highest sequence number applied so far
    last_seq: Option<u64>,
    /// What the device should render
    phase: ClientPhase,
    /// The question index this device last saw open
    current_index: Option<usize>,
    /// Locally recorded submissions, by question index
    answers: Vec<Option<Submission>>,
    /// The device's assigned name, if it joined as a player
    name: Option<String>,
}

impl SessionClient {
    /// Creates a client with no state
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns what the device should render
    pub fn phase(&self) -> &ClientPhase {
        &self.phase
    }

    /// Returns the device's assigned player name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the highest applied sequence number
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Records the submission the device sent for the open question
    ///
    /// The room remains authoritative; this is only the local echo shown in
    /// the final review.
    ///
    /// # Returns
    ///
    /// `true` if a question is open and the submission was recorded
    pub fn record_submission(&mut self, submission: Submission) -> bool {
        let ClientPhase::Question { index, .. } = self.phase else {
            return false;
        };
        if self.answers.len() <= index {
            self.answers.resize(index + 1, None);
        }
        self.answers[index] = Some(submission);
        true
    }

    /// Applies a sequence-numbered delta from the room
    ///
    /// # Returns
    ///
    /// `true` if the delta was applied, `false` if it was stale and dropped
    pub fn apply_delta(&mut self, delta: &StateDelta) -> bool {
        if self.last_seq.is_some_and(|last| delta.seq <= last) {
            return false;
        }
        self.last_seq = Some(delta.seq);

        match &delta.update {
            UpdateMessage::Room(update) => self.apply_room_update(update),
            UpdateMessage::Round(update) => self.apply_round_update(update),
        }

        true
    }

    /// Applies a full-state snapshot from the room
    ///
    /// Snapshots are adopted unconditionally; the device resumes delta
    /// filtering from the snapshot's sequence number.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.last_seq = Some(snapshot.seq);

        match &snapshot.sync {
            SyncMessage::Room(sync) => self.apply_room_sync(sync),
            SyncMessage::Round(sync) => self.apply_round_sync(sync),
        }
    }

    /// Returns the device's reviewable results once the session finished
    ///
    /// # Returns
    ///
    /// `None` until a final summary has been received
    pub fn final_results(&self) -> Option<FinalResults> {
        match &self.phase {
            ClientPhase::Finished {
                summary: Some(summary),
            } => Some(FinalResults {
                answers: self.answers.clone(),
                summary: summary.clone(),
            }),
            _ => None,
        }
    }

    /// Notes that a (possibly new) question is being shown
    ///
    /// Moving to a different index discards nothing the device already
    /// recorded; it only makes room for the new question's local echo.
    fn observe_index(&mut self, index: usize, count: usize) {
        if self.answers.len() < count {
            self.answers.resize(count, None);
        }
        self.current_index = Some(index);
    }

    fn apply_room_update(&mut self, update: &room::UpdateMessage) {
        match update {
            room::UpdateMessage::Lobby(players) => {
                self.phase = ClientPhase::Lobby {
                    players: players.clone(),
                };
            }
            room::UpdateMessage::NameAssign(name) => {
                self.name = Some(name.clone());
            }
            room::UpdateMessage::Standings { leaderboard } => {
                // The host's standings arrive right after the reveal; the
                // phase is already Results in that case
                match &mut self.phase {
                    ClientPhase::Results { standings, .. } => {
                        *standings = Some(leaderboard.clone());
                    }
                    ClientPhase::Question { index, count, .. } => {
                        let (index, count) = (*index, *count);
                        self.phase = ClientPhase::Results {
                            index,
                            count,
                            correct: None,
                            explanation: None,
                            score: None,
                            standings: Some(leaderboard.clone()),
                        };
                    }
                    _ => {}
                }
            }
            room::UpdateMessage::Score { score } => {
                if let ClientPhase::Results {
                    score: phase_score, ..
                } = &mut self.phase
                {
                    *phase_score = *score;
                }
            }
            room::UpdateMessage::Summary(summary) => {
                self.phase = ClientPhase::Finished {
                    summary: Some(summary.clone()),
                };
            }
        }
    }

    fn apply_round_update(&mut self, update: &round::UpdateMessage) {
        match update {
            round::UpdateMessage::QuestionOpen {
                index,
                count,
                prompt,
                view,
                ..
            } => {
                self.observe_index(*index, *count);
                self.phase = ClientPhase::Question {
                    index: *index,
                    count: *count,
                    prompt: prompt.clone(),
                    view: view.clone(),
                    answered_count: 0,
                };
            }
            round::UpdateMessage::AnsweredCount(n) => {
                if let ClientPhase::Question { answered_count, .. } = &mut self.phase {
                    *answered_count = *n;
                }
            }
            round::UpdateMessage::Reveal {
                index,
                count,
                correct,
                explanation,
            } => {
                self.observe_index(*index, *count);
                self.phase = ClientPhase::Results {
                    index: *index,
                    count: *count,
                    correct: Some(correct.clone()),
                    explanation: explanation.clone(),
                    score: None,
                    standings: None,
                };
            }
        }
    }

    fn apply_room_sync(&mut self, sync: &room::SyncMessage) {
        match sync {
            room::SyncMessage::Lobby(players) => {
                self.phase = ClientPhase::Lobby {
                    players: players.clone(),
                };
            }
            room::SyncMessage::Standings {
                index,
                count,
                leaderboard,
            } => {
                self.observe_index(*index, *count);
                self.phase = ClientPhase::Results {
                    index: *index,
                    count: *count,
                    correct: None,
                    explanation: None,
                    score: None,
                    standings: Some(leaderboard.clone()),
                };
            }
            room::SyncMessage::Score {
                index,
                count,
                score,
            } => {
                self.observe_index(*index, *count);
                self.phase = ClientPhase::Results {
                    index: *index,
                    count: *count,
                    correct: None,
                    explanation: None,
                    score: *score,
                    standings: None,
                };
            }
            room::SyncMessage::Summary(summary) => {
                self.phase = ClientPhase::Finished {
                    summary: Some(summary.clone()),
                };
            }
            room::SyncMessage::Metainfo(meta) => {
                if let room::MetainfoMessage::Player { name, .. } = meta {
                    self.name = Some(name.clone());
                }
            }
            room::SyncMessage::NotAllowed => {
                self.phase = ClientPhase::Finished { summary: None };
            }
        }
    }

    fn apply_round_sync(&mut self, sync: &round::SyncMessage) {
        match sync {
            round::SyncMessage::QuestionOpen {
                index,
                count,
                prompt,
                view,
                answered_count,
                ..
            } => {
                self.observe_index(*index, *count);
                self.phase = ClientPhase::Question {
                    index: *index,
                    count: *count,
                    prompt: prompt.clone(),
                    view: view.clone(),
                    answered_count: *answered_count,
                };
            }
            round::SyncMessage::Reveal {
                index,
                count,
                correct,
                explanation,
                ..
            } => {
                self.observe_index(*index, *count);
                self.phase = ClientPhase::Results {
                    index: *index,
                    count: *count,
                    correct: Some(correct.clone()),
                    explanation: explanation.clone(),
                    score: None,
                    standings: None,
                };
            }
        }
    }
}
