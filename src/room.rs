//! Authoritative room state and command handling
//!
//! This module contains the room struct that owns a session from lobby to
//! summary. The room is the single writer of session state: devices send it
//! commands (join, start, submit, advance) and it responds with
//! sequence-numbered broadcasts. Commands that the sender is not allowed to
//! issue are rejected with a typed error and leave the state untouched.

use std::fmt::Debug;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

use super::{
    AlarmMessage, Snapshot, TruncatedVec,
    grading::Submission,
    leaderboard::{Leaderboard, ScoreMessage},
    names::{self, Names},
    pin::Pin,
    quiz::Quiz,
    roster::{self, Id, Role, RoleKind, Roster},
    round::{self, Round},
    session::Tunnel,
};

/// Maximum number of names included in lobby broadcasts
const LOBBY_NAMES_LIMIT: usize = 50;

/// A round in play, paired with its position in the quiz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRound {
    /// Index of the question being played (0-based)
    pub index: usize,
    /// The round's runtime state
    pub round: Round,
}

/// The lifecycle status of a room
///
/// The status only ever moves forward: waiting, then alternating playing
/// and results for each question, then finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Status {
    /// Waiting for players to join via the PIN
    Waiting,
    /// A question is open for answering
    Playing(Box<CurrentRound>),
    /// The current question has been revealed
    Results(Box<CurrentRound>),
    /// All questions are done, summary has been sent
    Finished,
}

/// The authoritative state of one quiz session
#[derive(Serialize, Deserialize)]
pub struct Room {
    /// The quiz being played
    quiz: Quiz,
    /// The join PIN, present only while waiting for players
    pin: Option<Pin>,
    /// All connected devices and their roles
    pub roster: Roster,
    /// Name assignments and validation for players
    names: Names,
    /// Scoring across rounds
    pub leaderboard: Leaderboard,
    /// Current lifecycle status
    pub status: Status,
    /// Whether the room rejects new joins
    locked: bool,
    /// Monotonic counter stamped on every broadcast
    seq: u64,
}

impl Debug for Room {
    /// Custom debug implementation that avoids printing large amounts of data
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("quiz", &self.quiz.title())
            .field("pin", &self.pin)
            .finish_non_exhaustive()
    }
}

/// Messages received from participant devices
///
/// Commands are categorized by the sender's role; a command sent by a
/// device whose role doesn't match is rejected without side effects.
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Commands from the session host
    Host(IncomingHostMessage),
    /// Commands from connections that have not joined yet
    Unassigned(IncomingUnassignedMessage),
    /// Commands from players
    Player(IncomingPlayerMessage),
}

impl IncomingMessage {
    /// Validates that a message matches the sender's role
    fn follows(&self, sender_kind: RoleKind) -> bool {
        matches!(
            (self, sender_kind),
            (IncomingMessage::Host(_), RoleKind::Host)
                | (IncomingMessage::Player(_), RoleKind::Player)
                | (IncomingMessage::Unassigned(_), RoleKind::Unassigned)
        )
    }
}

/// Commands that players can send
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingPlayerMessage {
    /// Submit an answer for the open question
    Submit(Submission),
}

/// Commands that unassigned connections can send
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingUnassignedMessage {
    /// Join the session as a player; `None` requests a generated name
    Join {
        /// The requested display name
        name: Option<String>,
    },
}

/// Commands that the host can send
#[derive(Debug, Deserialize, Clone, Copy)]
pub enum IncomingHostMessage {
    /// Start the session (waiting only)
    Start,
    /// Reveal the open question, or move on from its results
    Advance,
    /// Lock or unlock the room to new joins
    Lock(bool),
}

/// Errors returned when a command is rejected
///
/// A rejected command never changes room state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Error {
    /// A progression command came from a device that is not the host
    #[error("only the host can control session progression")]
    NotHost,
    /// The sender is not part of this room
    #[error("unknown participant")]
    UnknownParticipant,
    /// The command does not match the sender's role
    #[error("command not allowed for the sender's role")]
    WrongRole,
    /// The command is not valid in the room's current status
    #[error("command not allowed in the current status")]
    WrongStatus,
    /// The room is locked to new joins
    #[error("room is locked")]
    Locked,
    /// The requested name was rejected
    #[error(transparent)]
    Name(#[from] names::Error),
    /// The roster rejected the participant
    #[error(transparent)]
    Roster(#[from] roster::Error),
}

/// Update messages describing room-level state changes
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// The lobby roster changed
    Lobby(TruncatedVec<String>),
    /// Confirms the recipient's name assignment
    NameAssign(String),
    /// (HOST ONLY) Standings after a revealed question
    Standings {
        /// Current and previous standings
        leaderboard: StandingsMessage,
    },
    /// (PLAYER ONLY) The recipient's score after a revealed question
    Score {
        /// The player's score information, if they have one
        score: Option<ScoreMessage>,
    },
    /// Final summary once the session finishes
    Summary(SummaryMessage),
}

/// Sync messages replacing a device's room-level view
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// The room is waiting for players
    Lobby(TruncatedVec<String>),
    /// A question's results are being shown (host view)
    Standings {
        /// Index of the revealed question
        index: usize,
        /// Total number of questions
        count: usize,
        /// Current and previous standings
        leaderboard: StandingsMessage,
    },
    /// A question's results are being shown (player view)
    Score {
        /// Index of the revealed question
        index: usize,
        /// Total number of questions
        count: usize,
        /// The player's score information, if they have one
        score: Option<ScoreMessage>,
    },
    /// The session has finished
    Summary(SummaryMessage),
    /// Device-specific metadata sent alongside the state
    Metainfo(MetainfoMessage),
    /// The device cannot participate in this room anymore
    NotAllowed,
}

/// Final summary sent when the session ends
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SummaryMessage {
    /// Summary for an individual player
    Player {
        /// The player's final score and position
        score: Option<ScoreMessage>,
        /// Points earned on each question
        points: Vec<u64>,
        /// Title of the quiz that was played
        title: String,
    },
    /// Summary for the host with per-question statistics
    Host {
        /// For each question, (players who scored, players who didn't)
        stats: Vec<(usize, usize)>,
        /// Number of players who appear in the scores
        player_count: usize,
        /// Title of the quiz that was played
        title: String,
    },
}

/// Device-specific metadata
#[derive(Debug, Serialize, Clone)]
pub enum MetainfoMessage {
    /// Metadata for the host
    Host {
        /// Whether the room is locked to new joins
        locked: bool,
    },
    /// Metadata for a player
    Player {
        /// The player's assigned name
        name: String,
        /// The player's current total score
        score: u64,
    },
}

/// Standings data for display
///
/// Contains both current standings and the previous round's standings so
/// clients can show position changes.
#[derive(Debug, Serialize, Clone)]
pub struct StandingsMessage {
    /// Current standings as (name, total points)
    pub current: TruncatedVec<(String, u64)>,
    /// Previous round's standings for comparison
    pub prior: TruncatedVec<(String, u64)>,
}

// Convenience methods
impl Room {
    /// Returns the join PIN, if the room still accepts joins via PIN
    pub fn pin(&self) -> Option<Pin> {
        self.pin
    }

    /// Returns the current broadcast sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns `true` while the room is waiting for players
    pub fn is_waiting(&self) -> bool {
        matches!(self.status, Status::Waiting)
    }

    /// Returns `true` once the summary has been sent
    pub fn is_finished(&self) -> bool {
        matches!(self.status, Status::Finished)
    }

    /// Reserves the next sequence number for a broadcast
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Wraps a sync message in a snapshot stamped with the current sequence
    fn snapshot(&self, sync: impl Into<super::SyncMessage>) -> Snapshot {
        Snapshot {
            seq: self.seq,
            sync: sync.into(),
        }
    }

    /// Gets the score information for a participant
    fn score(&self, id: Id) -> Option<ScoreMessage> {
        self.leaderboard.score(id)
    }

    /// Generates the list of player names shown in the lobby
    fn lobby_names<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        tunnel_finder: F,
    ) -> TruncatedVec<String> {
        let player_names = self
            .roster
            .specific_vec(RoleKind::Player, tunnel_finder)
            .into_iter()
            .filter_map(|(_, _, role)| match role {
                Role::Player { name } => Some(name),
                _ => None,
            })
            .unique();

        TruncatedVec::new(
            player_names,
            LOBBY_NAMES_LIMIT,
            self.roster.specific_count(RoleKind::Player),
        )
    }

    /// Creates a standings message with names substituted for IDs
    fn standings_message(&self) -> StandingsMessage {
        let [current, prior] = self.leaderboard.standings_pair();

        let id_map = |i| self.names.get_name(&i).unwrap_or("Unknown".to_owned());

        let id_score_map = |(id, s)| (id_map(id), s);

        StandingsMessage {
            current: current.map(id_score_map),
            prior: prior.map(id_score_map),
        }
    }

    /// Builds the final summary for a specific role
    fn summary_message(&self, id: Id, kind: RoleKind) -> SummaryMessage {
        match kind {
            RoleKind::Host | RoleKind::Unassigned => {
                let (player_count, stats) = self.leaderboard.host_summary();
                SummaryMessage::Host {
                    stats,
                    player_count,
                    title: self.quiz.title().to_owned(),
                }
            }
            RoleKind::Player => SummaryMessage::Player {
                score: self.score(id),
                points: self.leaderboard.player_summary(id),
                title: self.quiz.title().to_owned(),
            },
        }
    }
}

impl Room {
    /// Creates a new room in the waiting status
    ///
    /// # Arguments
    ///
    /// * `quiz` - The quiz to play
    /// * `host_id` - The ID of the hosting device
    /// * `pin` - The join PIN assigned by the lobby
    pub fn new(quiz: Quiz, host_id: Id, pin: Pin) -> Self {
        Self {
            quiz,
            pin: Some(pin),
            roster: Roster::with_host_id(host_id),
            names: Names::default(),
            leaderboard: Leaderboard::default(),
            status: Status::Waiting,
            locked: false,
            seq: 0,
        }
    }

    /// Registers a newly connected device as unassigned
    ///
    /// The device becomes a player once it sends a join command; until then
    /// it receives no broadcasts.
    ///
    /// # Errors
    ///
    /// Returns an error if the room is at capacity.
    pub fn add_participant(&mut self, id: Id) -> Result<(), Error> {
        if self.roster.has_participant(id) {
            return Ok(());
        }
        self.roster.add_participant(id, Role::Unassigned)?;
        Ok(())
    }

    /// Handles an incoming command from a device
    ///
    /// # Arguments
    ///
    /// * `id` - The sending device
    /// * `message` - The command to process
    /// * `schedule_message` - Function to schedule deadline alarms
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    ///
    /// # Errors
    ///
    /// Returns a typed error when the command is rejected; rejected
    /// commands leave the room state unchanged.
    pub fn receive_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        id: Id,
        message: IncomingMessage,
        mut schedule_message: S,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let Some(role) = self.roster.get_role(id) else {
            return Err(Error::UnknownParticipant);
        };

        // A player re-sending join keeps their existing assignment
        if let (IncomingMessage::Unassigned(IncomingUnassignedMessage::Join { .. }), Role::Player { name }) =
            (&message, &role)
        {
            let name = name.clone();
            let seq = self.next_seq();
            self.roster.send_delta(
                seq,
                &UpdateMessage::NameAssign(name).into(),
                id,
                &tunnel_finder,
            );
            self.roster.send_snapshot(
                &self.snapshot(self.state_message(id, RoleKind::Player, &tunnel_finder)),
                id,
                tunnel_finder,
            );
            return Ok(());
        }

        if !message.follows(role.kind()) {
            return Err(if matches!(message, IncomingMessage::Host(_)) {
                Error::NotHost
            } else {
                Error::WrongRole
            });
        }

        match message {
            IncomingMessage::Unassigned(IncomingUnassignedMessage::Join { name }) => {
                if self.locked {
                    return Err(Error::Locked);
                }
                self.join(id, name, tunnel_finder)
            }
            IncomingMessage::Host(IncomingHostMessage::Lock(lock_state)) => {
                self.locked = lock_state;
                Ok(())
            }
            IncomingMessage::Host(IncomingHostMessage::Start) => {
                if !self.is_waiting() {
                    return Err(Error::WrongStatus);
                }
                // The PIN dies with the lobby and may be reused elsewhere
                self.pin = None;
                self.open_round(0, &mut schedule_message, tunnel_finder);
                Ok(())
            }
            IncomingMessage::Host(IncomingHostMessage::Advance) => match &self.status {
                Status::Waiting => Err(Error::WrongStatus),
                Status::Playing(_) => {
                    self.finish_round(tunnel_finder);
                    Ok(())
                }
                Status::Results(current) => {
                    let next_index = current.index + 1;
                    self.open_round(next_index, &mut schedule_message, tunnel_finder);
                    Ok(())
                }
                Status::Finished => {
                    self.close_sessions(tunnel_finder);
                    Ok(())
                }
            },
            IncomingMessage::Player(IncomingPlayerMessage::Submit(submission)) => {
                let all_answered = match &mut self.status {
                    Status::Playing(current) => current.round.submit(
                        &mut self.seq,
                        id,
                        submission,
                        &self.roster,
                        &tunnel_finder,
                    ),
                    // Late or early submissions are dropped, not errors
                    _ => false,
                };

                if all_answered {
                    self.finish_round(tunnel_finder);
                }
                Ok(())
            }
        }
    }

    /// Handles a scheduled alarm
    ///
    /// Deadline alarms for rounds that are no longer playing are ignored.
    ///
    /// # Arguments
    ///
    /// * `message` - The alarm that fired
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    pub fn receive_alarm<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        message: &AlarmMessage,
        tunnel_finder: F,
    ) {
        match message {
            AlarmMessage::Round(round::AlarmMessage::Deadline { index }) => match &self.status {
                Status::Playing(current) if current.index == *index => {
                    self.finish_round(tunnel_finder);
                }
                _ => (),
            },
        }
    }

    /// Turns an unassigned connection into a player
    fn join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: Id,
        requested_name: Option<String>,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let name = match requested_name {
            Some(name) => self.names.set_name(id, &name)?,
            None => loop {
                // Collisions get rarer as the petname space is large
                if let Ok(name) = self.names.set_name(id, &names::random_name()) {
                    break name;
                }
            },
        };

        self.roster
            .update_role(id, Role::Player { name: name.clone() });

        let lobby_names = self.lobby_names(&tunnel_finder);
        let seq = self.next_seq();
        self.roster.announce_with(
            seq,
            |recipient, kind| match kind {
                RoleKind::Player if recipient == id => {
                    Some(UpdateMessage::NameAssign(name.clone()).into())
                }
                RoleKind::Host | RoleKind::Player => {
                    Some(UpdateMessage::Lobby(lobby_names.clone()).into())
                }
                RoleKind::Unassigned => None,
            },
            &tunnel_finder,
        );

        self.roster.send_snapshot(
            &self.snapshot(self.state_message(id, RoleKind::Player, &tunnel_finder)),
            id,
            tunnel_finder,
        );

        Ok(())
    }

    /// Opens the question at `index`, or finishes the session if there is none
    fn open_round<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, web_time::Duration)>(
        &mut self,
        index: usize,
        schedule_message: &mut S,
        tunnel_finder: F,
    ) {
        if let Some(config) = self.quiz.question(index) {
            let mut round = Round::new(config.clone());

            round.open(
                &mut self.seq,
                index,
                self.quiz.len(),
                &self.roster,
                schedule_message,
                tunnel_finder,
            );

            self.status = Status::Playing(Box::new(CurrentRound { index, round }));
        } else {
            self.announce_summary(tunnel_finder);
        }
    }

    /// Reveals the playing round and broadcasts the resulting standings
    fn finish_round<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        let status = std::mem::replace(&mut self.status, Status::Finished);

        let Status::Playing(mut current) = status else {
            self.status = status;
            return;
        };

        current.round.reveal(
            &mut self.seq,
            current.index,
            self.quiz.len(),
            &self.roster,
            &mut self.leaderboard,
            &tunnel_finder,
        );

        let standings = self.standings_message();
        let seq = self.next_seq();
        self.roster.announce_with(
            seq,
            |recipient, kind| match kind {
                RoleKind::Host => Some(
                    UpdateMessage::Standings {
                        leaderboard: standings.clone(),
                    }
                    .into(),
                ),
                RoleKind::Player => Some(
                    UpdateMessage::Score {
                        score: self.score(recipient),
                    }
                    .into(),
                ),
                RoleKind::Unassigned => None,
            },
            tunnel_finder,
        );

        self.status = Status::Results(current);
    }

    /// Sends the final summary and moves the room to the finished status
    fn announce_summary<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        self.status = Status::Finished;

        let seq = self.next_seq();
        self.roster.announce_with(
            seq,
            |id, kind| match kind {
                RoleKind::Host | RoleKind::Player => {
                    Some(UpdateMessage::Summary(self.summary_message(id, kind)).into())
                }
                RoleKind::Unassigned => None,
            },
            tunnel_finder,
        );
    }

    /// Closes every connected tunnel, ending the session
    fn close_sessions<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        let participants = self
            .roster
            .vec(&tunnel_finder)
            .iter()
            .map(|(x, _, _)| *x)
            .collect_vec();

        for id in participants {
            self.roster
                .remove_participant_session(&id, &tunnel_finder);
        }
    }

    /// Returns the sync message describing the current status for a device
    ///
    /// # Arguments
    ///
    /// * `id` - The device to synchronize
    /// * `kind` - The device's role kind
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    pub fn state_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        id: Id,
        kind: RoleKind,
        tunnel_finder: F,
    ) -> super::SyncMessage {
        match &self.status {
            Status::Waiting => SyncMessage::Lobby(self.lobby_names(tunnel_finder)).into(),
            Status::Playing(current) => current
                .round
                .state_message(current.index, self.quiz.len())
                .into(),
            Status::Results(current) => match kind {
                RoleKind::Host | RoleKind::Unassigned => SyncMessage::Standings {
                    index: current.index,
                    count: self.quiz.len(),
                    leaderboard: self.standings_message(),
                }
                .into(),
                RoleKind::Player => SyncMessage::Score {
                    index: current.index,
                    count: self.quiz.len(),
                    score: self.score(id),
                }
                .into(),
            },
            Status::Finished => match kind {
                RoleKind::Host | RoleKind::Player => {
                    SyncMessage::Summary(self.summary_message(id, kind)).into()
                }
                RoleKind::Unassigned => SyncMessage::NotAllowed.into(),
            },
        }
    }

    /// Resynchronizes a device after a connect or reconnect
    ///
    /// The device receives a full snapshot of the current status, stamped
    /// with the room's sequence number so it can resume delta filtering.
    ///
    /// # Arguments
    ///
    /// * `id` - The reconnecting device
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    pub fn update_session<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, id: Id, tunnel_finder: F) {
        let Some(role) = self.roster.get_role(id) else {
            return;
        };

        match role {
            Role::Host => {
                self.roster.send_snapshot(
                    &self.snapshot(SyncMessage::Metainfo(MetainfoMessage::Host {
                        locked: self.locked,
                    })),
                    id,
                    &tunnel_finder,
                );
                self.roster.send_snapshot(
                    &self.snapshot(self.state_message(id, RoleKind::Host, &tunnel_finder)),
                    id,
                    tunnel_finder,
                );
            }
            Role::Player { name } => {
                self.roster.send_snapshot(
                    &self.snapshot(SyncMessage::Metainfo(MetainfoMessage::Player {
                        name,
                        score: self.score(id).map_or(0, |x| x.points),
                    })),
                    id,
                    &tunnel_finder,
                );
                self.roster.send_snapshot(
                    &self.snapshot(self.state_message(id, RoleKind::Player, &tunnel_finder)),
                    id,
                    tunnel_finder,
                );
            }
            Role::Unassigned => {}
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{
        collections::{HashMap, VecDeque},
        str::FromStr,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use crate::{
        StateDelta,
        quiz::{ChoiceConfig, ChoiceOption, QuestionConfig, QuestionKind},
    };

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct MockTunnel {
        messages: Arc<Mutex<VecDeque<String>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl MockTunnel {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().iter().cloned().collect()
        }

        fn last_message(&self) -> String {
            self.messages
                .lock()
                .unwrap()
                .back()
                .cloned()
                .unwrap_or_default()
        }
    }

    impl Tunnel for &MockTunnel {
        fn send_delta(&self, delta: &StateDelta) {
            self.messages.lock().unwrap().push_back(delta.to_message());
        }

        fn send_snapshot(&self, snapshot: &Snapshot) {
            self.messages
                .lock()
                .unwrap()
                .push_back(snapshot.to_message());
        }

        fn close(self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    fn quiz() -> Quiz {
        Quiz::new(
            "Geography",
            vec![
                QuestionConfig::new(
                    "What is the capital of France?",
                    Duration::from_secs(20),
                    QuestionKind::Choice(ChoiceConfig {
                        options: vec![
                            ChoiceOption {
                                correct: false,
                                text: "Lyon".to_string(),
                            },
                            ChoiceOption {
                                correct: true,
                                text: "Paris".to_string(),
                            },
                        ],
                    }),
                ),
                QuestionConfig::new(
                    "What is the capital of Italy?",
                    Duration::from_secs(20),
                    QuestionKind::Choice(ChoiceConfig {
                        options: vec![
                            ChoiceOption {
                                correct: true,
                                text: "Rome".to_string(),
                            },
                            ChoiceOption {
                                correct: false,
                                text: "Milan".to_string(),
                            },
                        ],
                    }),
                ),
            ],
        )
    }

    struct Harness {
        room: Room,
        host_id: Id,
        tunnels: HashMap<Id, MockTunnel>,
    }

    impl Harness {
        fn new() -> Self {
            let host_id = Id::new();
            let pin = Pin::from_str("482913").unwrap();
            let room = Room::new(quiz(), host_id, pin);
            let mut tunnels = HashMap::new();
            tunnels.insert(host_id, MockTunnel::default());
            Self {
                room,
                host_id,
                tunnels,
            }
        }

        fn connect(&mut self) -> Id {
            let id = Id::new();
            self.tunnels.insert(id, MockTunnel::default());
            self.room.add_participant(id).unwrap();
            id
        }

        fn join(&mut self, name: &str) -> Id {
            let id = self.connect();
            self.send(
                id,
                IncomingMessage::Unassigned(IncomingUnassignedMessage::Join {
                    name: Some(name.to_string()),
                }),
            )
            .unwrap();
            id
        }

        fn send(&mut self, id: Id, message: IncomingMessage) -> Result<(), Error> {
            let tunnels = self.tunnels.clone();
            self.room
                .receive_message(id, message, |_, _| {}, |id| tunnels.get(&id))
        }

        fn messages(&self, id: Id) -> Vec<String> {
            self.tunnels[&id].messages()
        }
    }

    #[test]
    fn test_join_assigns_name_and_updates_lobby() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");

        let alice_messages = harness.messages(alice);
        assert!(alice_messages.iter().any(|m| m.contains("NameAssign")));
        assert!(alice_messages.iter().any(|m| m.contains("Lobby")));

        let host_messages = harness.messages(harness.host_id);
        assert!(
            host_messages
                .iter()
                .any(|m| m.contains("Lobby") && m.contains("Alice"))
        );
    }

    #[test]
    fn test_join_with_duplicate_name_is_rejected() {
        let mut harness = Harness::new();
        harness.join("Alice");

        let second = harness.connect();
        let result = harness.send(
            second,
            IncomingMessage::Unassigned(IncomingUnassignedMessage::Join {
                name: Some("Alice".to_string()),
            }),
        );
        assert_eq!(result, Err(Error::Name(names::Error::Used)));
    }

    #[test]
    fn test_join_without_name_generates_one() {
        let mut harness = Harness::new();
        let id = harness.connect();
        harness
            .send(
                id,
                IncomingMessage::Unassigned(IncomingUnassignedMessage::Join { name: None }),
            )
            .unwrap();

        assert!(harness.room.roster.get_name(id).is_some());
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");

        let result = harness.send(
            alice,
            IncomingMessage::Unassigned(IncomingUnassignedMessage::Join {
                name: Some("SomebodyElse".to_string()),
            }),
        );

        assert_eq!(result, Ok(()));
        assert_eq!(
            harness.room.roster.get_name(alice),
            Some("Alice".to_string())
        );
    }

    #[test]
    fn test_locked_room_rejects_joins() {
        let mut harness = Harness::new();
        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Lock(true)),
            )
            .unwrap();

        let id = harness.connect();
        let result = harness.send(
            id,
            IncomingMessage::Unassigned(IncomingUnassignedMessage::Join {
                name: Some("Alice".to_string()),
            }),
        );
        assert_eq!(result, Err(Error::Locked));
    }

    #[test]
    fn test_only_host_can_start() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");

        let result = harness.send(alice, IncomingMessage::Host(IncomingHostMessage::Start));
        assert_eq!(result, Err(Error::NotHost));
        assert!(harness.room.is_waiting());

        let result = harness.send(
            harness.host_id,
            IncomingMessage::Host(IncomingHostMessage::Start),
        );
        assert_eq!(result, Ok(()));
        assert!(matches!(harness.room.status, Status::Playing(_)));
    }

    #[test]
    fn test_only_host_can_advance() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Start),
            )
            .unwrap();
        let seq_before = harness.room.seq();

        let result = harness.send(alice, IncomingMessage::Host(IncomingHostMessage::Advance));

        assert_eq!(result, Err(Error::NotHost));
        assert!(matches!(harness.room.status, Status::Playing(_)));
        assert_eq!(harness.room.seq(), seq_before);
    }

    #[test]
    fn test_start_drops_pin() {
        let mut harness = Harness::new();
        harness.join("Alice");
        assert!(harness.room.pin().is_some());

        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Start),
            )
            .unwrap();
        assert!(harness.room.pin().is_none());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut harness = Harness::new();
        harness.join("Alice");
        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Start),
            )
            .unwrap();

        let result = harness.send(
            harness.host_id,
            IncomingMessage::Host(IncomingHostMessage::Start),
        );
        assert_eq!(result, Err(Error::WrongStatus));
    }

    #[test]
    fn test_advance_in_waiting_is_rejected() {
        let mut harness = Harness::new();
        let result = harness.send(
            harness.host_id,
            IncomingMessage::Host(IncomingHostMessage::Advance),
        );
        assert_eq!(result, Err(Error::WrongStatus));
    }

    #[test]
    fn test_all_answered_reveals_round() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        let bob = harness.join("Bob");
        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Start),
            )
            .unwrap();

        harness
            .send(
                alice,
                IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(1))),
            )
            .unwrap();
        assert!(matches!(harness.room.status, Status::Playing(_)));

        harness
            .send(
                bob,
                IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(0))),
            )
            .unwrap();
        assert!(matches!(harness.room.status, Status::Results(_)));

        // Host sees standings, players see their own score
        assert!(
            harness
                .messages(harness.host_id)
                .iter()
                .any(|m| m.contains("Standings"))
        );
        assert!(
            harness
                .messages(alice)
                .iter()
                .any(|m| m.contains("Score"))
        );
    }

    #[test]
    fn test_host_advance_forces_reveal() {
        let mut harness = Harness::new();
        harness.join("Alice");
        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Start),
            )
            .unwrap();

        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Advance),
            )
            .unwrap();
        assert!(matches!(harness.room.status, Status::Results(_)));
    }

    #[test]
    fn test_full_session_reaches_summary() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        let host_id = harness.host_id;

        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Start))
            .unwrap();

        for _ in 0..2 {
            harness
                .send(
                    alice,
                    IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(0))),
                )
                .unwrap();
            harness
                .send(host_id, IncomingMessage::Host(IncomingHostMessage::Advance))
                .unwrap();
        }

        assert!(harness.room.is_finished());
        assert!(
            harness
                .messages(host_id)
                .iter()
                .any(|m| m.contains("Summary"))
        );
        assert!(harness.messages(alice).iter().any(|m| m.contains("Summary")));
    }

    #[test]
    fn test_deadline_alarm_reveals_round() {
        let mut harness = Harness::new();
        harness.join("Alice");
        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Start),
            )
            .unwrap();

        let tunnels = harness.tunnels.clone();
        harness.room.receive_alarm(
            &AlarmMessage::Round(round::AlarmMessage::Deadline { index: 0 }),
            |id| tunnels.get(&id),
        );

        assert!(matches!(harness.room.status, Status::Results(_)));
    }

    #[test]
    fn test_stale_deadline_alarm_is_ignored() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        let host_id = harness.host_id;
        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Start))
            .unwrap();
        harness
            .send(
                alice,
                IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(1))),
            )
            .unwrap();
        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Advance))
            .unwrap();
        assert!(matches!(harness.room.status, Status::Playing(_)));

        // The first round's deadline fires after the room moved on
        let tunnels = harness.tunnels.clone();
        harness.room.receive_alarm(
            &AlarmMessage::Round(round::AlarmMessage::Deadline { index: 0 }),
            |id| tunnels.get(&id),
        );
        assert!(matches!(harness.room.status, Status::Playing(_)));
    }

    #[test]
    fn test_sequence_numbers_increase_monotonically() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        let host_id = harness.host_id;
        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Start))
            .unwrap();
        harness
            .send(
                alice,
                IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(1))),
            )
            .unwrap();

        let seqs: Vec<u64> = harness
            .messages(host_id)
            .iter()
            .map(|m| serde_json::from_str::<serde_json::Value>(m).unwrap()["seq"]
                .as_u64()
                .unwrap())
            .collect();

        assert!(!seqs.is_empty());
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_update_session_sends_snapshot_with_current_seq() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        harness
            .send(
                harness.host_id,
                IncomingMessage::Host(IncomingHostMessage::Start),
            )
            .unwrap();

        let seq = harness.room.seq();
        let tunnels = harness.tunnels.clone();
        harness
            .room
            .update_session(alice, |id| tunnels.get(&id));

        let last = harness.tunnels[&alice].last_message();
        assert!(last.contains(&format!("\"seq\":{seq}")));
        assert!(last.contains("QuestionOpen"));
    }

    #[test]
    fn test_unknown_participant_is_rejected() {
        let mut harness = Harness::new();
        let result = harness.send(
            Id::new(),
            IncomingMessage::Host(IncomingHostMessage::Advance),
        );
        assert_eq!(result, Err(Error::UnknownParticipant));
    }

    #[test]
    fn test_advance_after_summary_closes_sessions() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        let host_id = harness.host_id;
        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Start))
            .unwrap();
        for _ in 0..2 {
            harness
                .send(
                    alice,
                    IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(0))),
                )
                .unwrap();
            harness
                .send(host_id, IncomingMessage::Host(IncomingHostMessage::Advance))
                .unwrap();
        }
        assert!(harness.room.is_finished());

        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Advance))
            .unwrap();
        assert!(*harness.tunnels[&alice].closed.lock().unwrap());
        assert!(*harness.tunnels[&host_id].closed.lock().unwrap());
    }

    #[test]
    fn test_mid_round_joiner_plays_next_round() {
        let mut harness = Harness::new();
        let alice = harness.join("Alice");
        let host_id = harness.host_id;
        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Start))
            .unwrap();

        // Bob joins while the first question is open; he is not tracked,
        // so the round still completes with Alice alone
        let bob = harness.join("Bob");
        let result = harness.send(
            bob,
            IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(1))),
        );
        assert_eq!(result, Ok(()));

        harness
            .send(
                alice,
                IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(1))),
            )
            .unwrap();
        assert!(matches!(harness.room.status, Status::Results(_)));

        // The next round tracks both players
        harness
            .send(host_id, IncomingMessage::Host(IncomingHostMessage::Advance))
            .unwrap();
        harness
            .send(
                bob,
                IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(0))),
            )
            .unwrap();
        assert!(matches!(harness.room.status, Status::Playing(_)));
        harness
            .send(
                alice,
                IncomingMessage::Player(IncomingPlayerMessage::Submit(Submission::Index(0))),
            )
            .unwrap();
        assert!(matches!(harness.room.status, Status::Results(_)));
    }
}
