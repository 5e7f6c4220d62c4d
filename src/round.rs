//! Per-question round controller
//!
//! This module runs a single question from open to reveal: broadcasting the
//! prompt, collecting one submission per tracked player, counting answers
//! for the host, and revealing the correct answer with scores once every
//! player has answered, the deadline passes, or the host forces progression.

use std::{
    collections::HashMap,
    time::{self, Duration},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use web_time::SystemTime;

use crate::{
    grading::{self, Submission},
    leaderboard::Leaderboard,
    quiz::{CorrectAnswer, Media, QuestionConfig, QuestionView},
    roster::{Id, RoleKind, Roster},
    session::Tunnel,
};

/// The phase of a round
///
/// A round moves strictly forward: it opens once, accepts answers while
/// open, and reveals once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    /// Created but not yet shown to anyone
    #[default]
    Unstarted,
    /// Accepting submissions
    Open,
    /// Correct answer revealed, submissions closed
    Revealed,
}

/// Update messages broadcast while a round runs
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Announces that a question is open for answering
    QuestionOpen {
        /// Index of the current question (0-based)
        index: usize,
        /// Total number of questions in the quiz
        count: usize,
        /// The prompt text
        prompt: String,
        /// Optional media accompanying the prompt
        media: Option<Media>,
        /// Time players have to answer
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        duration: Duration,
        /// Player-safe rendering of the answer controls
        view: QuestionView,
    },
    /// (HOST ONLY) Reports the number of players who have answered so far
    AnsweredCount(usize),
    /// Reveals the correct answer once the round closes
    Reveal {
        /// Index of the revealed question
        index: usize,
        /// Total number of questions in the quiz
        count: usize,
        /// The correct answer
        correct: CorrectAnswer,
        /// Optional explanation text
        explanation: Option<String>,
    },
}

/// Alarm messages for the round deadline
///
/// The room schedules one deadline alarm per round when the question opens;
/// the index guards against an alarm outliving its round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The answering deadline of the question at `index` passed
    Deadline {
        /// Index of the question the deadline belongs to
        index: usize,
    },
}

/// Synchronization messages for devices (re)connecting during a round
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// The round is open for answering
    QuestionOpen {
        /// Index of the current question
        index: usize,
        /// Total number of questions in the quiz
        count: usize,
        /// The prompt text
        prompt: String,
        /// Optional media accompanying the prompt
        media: Option<Media>,
        /// Remaining time before the deadline
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        remaining: Duration,
        /// Player-safe rendering of the answer controls
        view: QuestionView,
        /// Number of players who have already answered
        answered_count: usize,
    },
    /// The round has been revealed
    Reveal {
        /// Index of the revealed question
        index: usize,
        /// Total number of questions in the quiz
        count: usize,
        /// The prompt text
        prompt: String,
        /// The correct answer
        correct: CorrectAnswer,
        /// Optional explanation text
        explanation: Option<String>,
    },
}

/// Runtime state of a single question
///
/// The tracker is the round's synchronization barrier: it is seeded with
/// the players present when the question opens, and the round completes
/// early once every tracked player has submitted. Players who join
/// mid-round are not tracked and cannot submit until the next round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// The question being played
    config: QuestionConfig,

    /// Submissions with the timestamp they arrived at (first write wins)
    submissions: HashMap<Id, (Submission, SystemTime)>,
    /// Players expected to answer this round, and whether they have
    tracker: HashMap<Id, bool>,
    /// When the question opened
    opened_at: Option<SystemTime>,
    /// Current phase
    phase: Phase,
}

impl Round {
    /// Creates a fresh round for a question
    pub fn new(config: QuestionConfig) -> Self {
        Self {
            config,
            submissions: HashMap::new(),
            tracker: HashMap::new(),
            opened_at: None,
            phase: Phase::Unstarted,
        }
    }

    /// Returns the current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the number of tracked players who have answered
    pub fn answered_count(&self) -> usize {
        self.tracker.values().filter(|answered| **answered).count()
    }

    /// Returns the question this round plays
    pub fn config(&self) -> &QuestionConfig {
        &self.config
    }

    /// Attempts to transition from one phase to another
    ///
    /// # Returns
    ///
    /// `true` if the transition happened, `false` if the current phase
    /// didn't match
    fn change_state(&mut self, before: Phase, after: Phase) -> bool {
        if self.phase == before {
            self.phase = after;

            true
        } else {
            false
        }
    }

    /// Returns when the question opened, or now if it hasn't
    fn timer(&self) -> SystemTime {
        self.opened_at.unwrap_or_else(SystemTime::now)
    }

    /// Opens the question for answering
    ///
    /// Seeds the tracker with the players currently in the roster,
    /// broadcasts the prompt, and schedules the deadline alarm.
    ///
    /// # Arguments
    ///
    /// * `seq` - The room's broadcast sequence counter
    /// * `index` - Index of this question in the quiz
    /// * `count` - Total number of questions
    /// * `roster` - Participant roster
    /// * `schedule_message` - Function to schedule the deadline alarm
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    pub fn open<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(crate::AlarmMessage, time::Duration)>(
        &mut self,
        seq: &mut u64,
        index: usize,
        count: usize,
        roster: &Roster,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        if self.change_state(Phase::Unstarted, Phase::Open) {
            self.tracker = roster
                .specific_ids(RoleKind::Player)
                .map(|id| (id, false))
                .collect();
            self.opened_at = Some(SystemTime::now());

            *seq += 1;
            roster.announce(
                *seq,
                &UpdateMessage::QuestionOpen {
                    index,
                    count,
                    prompt: self.config.prompt().to_owned(),
                    media: self.config.media().cloned(),
                    duration: self.config.time_limit(),
                    view: self.config.kind.view(),
                }
                .into(),
                tunnel_finder,
            );

            schedule_message(
                AlarmMessage::Deadline { index }.into(),
                self.config.time_limit(),
            );
        }
    }

    /// Records a player's submission
    ///
    /// Only tracked players can submit, only while the round is open, and
    /// only once; anything else is silently ignored. The host is notified
    /// of the new answered count.
    ///
    /// # Arguments
    ///
    /// * `seq` - The room's broadcast sequence counter
    /// * `id` - The submitting player
    /// * `submission` - The submitted answer
    /// * `roster` - Participant roster
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    ///
    /// # Returns
    ///
    /// `true` if every tracked player has now answered
    pub fn submit<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        seq: &mut u64,
        id: Id,
        submission: Submission,
        roster: &Roster,
        tunnel_finder: F,
    ) -> bool {
        if self.phase != Phase::Open {
            return false;
        }
        let Some(answered) = self.tracker.get_mut(&id) else {
            return false;
        };
        if *answered {
            return false;
        }

        *answered = true;
        self.submissions
            .insert(id, (submission, SystemTime::now()));

        *seq += 1;
        roster.announce_specific(
            *seq,
            RoleKind::Host,
            &UpdateMessage::AnsweredCount(self.answered_count()).into(),
            tunnel_finder,
        );

        self.tracker.values().all(|answered| *answered)
    }

    /// Closes the round and reveals the correct answer
    ///
    /// Players who never submitted are recorded with [`Submission::NoAnswer`]
    /// so every tracked player appears in the round's scores. Scores are
    /// computed from submission timing and recorded on the leaderboard.
    ///
    /// # Arguments
    ///
    /// * `seq` - The room's broadcast sequence counter
    /// * `index` - Index of this question in the quiz
    /// * `count` - Total number of questions
    /// * `roster` - Participant roster
    /// * `leaderboard` - Leaderboard to record the round's scores on
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    ///
    /// # Returns
    ///
    /// `true` if this call performed the reveal, `false` if the round was
    /// not open
    pub fn reveal<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        seq: &mut u64,
        index: usize,
        count: usize,
        roster: &Roster,
        leaderboard: &mut Leaderboard,
        tunnel_finder: F,
    ) -> bool {
        if !self.change_state(Phase::Open, Phase::Revealed) {
            return false;
        }

        let deadline = self.timer() + self.config.time_limit();
        for (id, answered) in &self.tracker {
            if !*answered {
                self.submissions
                    .insert(*id, (Submission::NoAnswer, deadline));
            }
        }

        self.record_scores(leaderboard);

        *seq += 1;
        roster.announce(
            *seq,
            &UpdateMessage::Reveal {
                index,
                count,
                correct: self.config.kind.correct_answer(),
                explanation: self.config.explanation().map(str::to_owned),
            }
            .into(),
            tunnel_finder,
        );

        true
    }

    /// Grades every submission and records the round on the leaderboard
    fn record_scores(&self, leaderboard: &mut Leaderboard) {
        let opened_at = self.timer();

        leaderboard.record_round(
            &self
                .submissions
                .iter()
                .map(|(id, (submission, instant))| {
                    let grade = grading::grade(&self.config.kind, submission);
                    let time_taken = instant
                        .duration_since(opened_at)
                        .unwrap_or(Duration::ZERO);
                    (
                        *id,
                        grading::award_points(grade, time_taken, self.config.time_limit()),
                    )
                })
                .collect_vec(),
        );
    }

    /// Generates a sync message for a device connecting during this round
    ///
    /// # Arguments
    ///
    /// * `index` - Index of this question in the quiz
    /// * `count` - Total number of questions
    pub fn state_message(&self, index: usize, count: usize) -> SyncMessage {
        match self.phase {
            Phase::Unstarted | Phase::Open => SyncMessage::QuestionOpen {
                index,
                count,
                prompt: self.config.prompt().to_owned(),
                media: self.config.media().cloned(),
                remaining: self
                    .config
                    .time_limit()
                    .saturating_sub(self.timer().elapsed().unwrap_or(Duration::ZERO)),
                view: self.config.kind.view(),
                answered_count: self.answered_count(),
            },
            Phase::Revealed => SyncMessage::Reveal {
                index,
                count,
                prompt: self.config.prompt().to_owned(),
                correct: self.config.kind.correct_answer(),
                explanation: self.config.explanation().map(str::to_owned),
            },
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use crate::{
        Snapshot, StateDelta,
        quiz::{ChoiceConfig, ChoiceOption, QuestionKind},
        roster::Role,
    };

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct MockTunnel {
        deltas: Arc<Mutex<VecDeque<String>>>,
    }

    impl MockTunnel {
        fn messages(&self) -> Vec<String> {
            self.deltas.lock().unwrap().iter().cloned().collect()
        }
    }

    impl Tunnel for &MockTunnel {
        fn send_delta(&self, delta: &StateDelta) {
            self.deltas.lock().unwrap().push_back(delta.to_message());
        }

        fn send_snapshot(&self, snapshot: &Snapshot) {
            self.deltas.lock().unwrap().push_back(snapshot.to_message());
        }

        fn close(self) {}
    }

    fn question() -> QuestionConfig {
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
        )
    }

    struct Fixture {
        roster: Roster,
        host: MockTunnel,
        alice_id: Id,
        alice: MockTunnel,
        bob_id: Id,
        bob: MockTunnel,
    }

    impl Fixture {
        fn new() -> Self {
            let host_id = Id::new();
            let alice_id = Id::new();
            let bob_id = Id::new();
            let mut roster = Roster::with_host_id(host_id);
            roster
                .add_participant(
                    alice_id,
                    Role::Player {
                        name: "Alice".to_string(),
                    },
                )
                .unwrap();
            roster
                .add_participant(
                    bob_id,
                    Role::Player {
                        name: "Bob".to_string(),
                    },
                )
                .unwrap();

            Self {
                roster,
                host: MockTunnel::default(),
                alice_id,
                alice: MockTunnel::default(),
                bob_id,
                bob: MockTunnel::default(),
            }
        }

        fn host_id(&self) -> Id {
            self.roster
                .specific_ids(RoleKind::Host)
                .next()
                .expect("fixture has a host")
        }

        fn finder<'a>(&'a self) -> impl Fn(Id) -> Option<&'a MockTunnel> + 'a {
            let host_id = self.host_id();
            move |id| {
                if id == host_id {
                    Some(&self.host)
                } else if id == self.alice_id {
                    Some(&self.alice)
                } else if id == self.bob_id {
                    Some(&self.bob)
                } else {
                    None
                }
            }
        }
    }

    #[test]
    fn test_open_broadcasts_and_schedules_deadline() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;
        let mut alarms = Vec::new();

        round.open(
            &mut seq,
            0,
            1,
            &fixture.roster,
            |message, duration| alarms.push((message, duration)),
            fixture.finder(),
        );

        assert_eq!(round.phase(), Phase::Open);
        assert_eq!(seq, 1);
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].1, Duration::from_secs(20));

        let host_messages = fixture.host.messages();
        assert_eq!(host_messages.len(), 1);
        assert!(host_messages[0].contains("QuestionOpen"));
        assert!(host_messages[0].contains("\"seq\":1"));
        // The broadcast must not leak the correct answer
        assert!(!host_messages[0].contains("correct"));
        assert_eq!(fixture.alice.messages().len(), 1);
    }

    #[test]
    fn test_open_twice_is_a_noop() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());
        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());

        assert_eq!(seq, 1);
        assert_eq!(fixture.alice.messages().len(), 1);
    }

    #[test]
    fn test_submit_counts_and_completes() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());

        let all_answered = round.submit(
            &mut seq,
            fixture.alice_id,
            Submission::Index(1),
            &fixture.roster,
            fixture.finder(),
        );
        assert!(!all_answered);
        assert_eq!(round.answered_count(), 1);

        let all_answered = round.submit(
            &mut seq,
            fixture.bob_id,
            Submission::Index(0),
            &fixture.roster,
            fixture.finder(),
        );
        assert!(all_answered);
        assert_eq!(round.answered_count(), 2);

        // Answered counts go to the host only
        let host_counts = fixture
            .host
            .messages()
            .iter()
            .filter(|m| m.contains("AnsweredCount"))
            .count();
        assert_eq!(host_counts, 2);
        let alice_counts = fixture
            .alice
            .messages()
            .iter()
            .filter(|m| m.contains("AnsweredCount"))
            .count();
        assert_eq!(alice_counts, 0);
    }

    #[test]
    fn test_submit_first_write_wins() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());

        round.submit(
            &mut seq,
            fixture.alice_id,
            Submission::Index(1),
            &fixture.roster,
            fixture.finder(),
        );
        round.submit(
            &mut seq,
            fixture.alice_id,
            Submission::Index(0),
            &fixture.roster,
            fixture.finder(),
        );

        assert_eq!(round.answered_count(), 1);
        assert_eq!(
            round.submissions.get(&fixture.alice_id).map(|(s, _)| s),
            Some(&Submission::Index(1))
        );
    }

    #[test]
    fn test_submit_from_untracked_player_is_ignored() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());

        let stranger = Id::new();
        let completed = round.submit(
            &mut seq,
            stranger,
            Submission::Index(1),
            &fixture.roster,
            fixture.finder(),
        );

        assert!(!completed);
        assert_eq!(round.answered_count(), 0);
    }

    #[test]
    fn test_submit_before_open_is_ignored() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;

        let completed = round.submit(
            &mut seq,
            fixture.alice_id,
            Submission::Index(1),
            &fixture.roster,
            fixture.finder(),
        );

        assert!(!completed);
        assert_eq!(seq, 0);
    }

    #[test]
    fn test_reveal_scores_and_fills_no_answer() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;
        let mut leaderboard = Leaderboard::default();

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());
        round.submit(
            &mut seq,
            fixture.alice_id,
            Submission::Index(1),
            &fixture.roster,
            fixture.finder(),
        );

        let revealed = round.reveal(
            &mut seq,
            0,
            1,
            &fixture.roster,
            &mut leaderboard,
            fixture.finder(),
        );
        assert!(revealed);
        assert_eq!(round.phase(), Phase::Revealed);

        // Alice answered correctly and quickly: between base and full points
        let alice_score = leaderboard.score(fixture.alice_id).unwrap();
        assert!(alice_score.points >= 500 && alice_score.points <= 1000);
        assert_eq!(alice_score.position, 0);

        // Bob never answered: zero points, still on the board
        let bob_score = leaderboard.score(fixture.bob_id).unwrap();
        assert_eq!(bob_score.points, 0);

        let reveal_messages = fixture
            .alice
            .messages()
            .iter()
            .filter(|m| m.contains("Reveal"))
            .count();
        assert_eq!(reveal_messages, 1);
    }

    #[test]
    fn test_reveal_twice_is_a_noop() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;
        let mut leaderboard = Leaderboard::default();

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());
        assert!(round.reveal(
            &mut seq,
            0,
            1,
            &fixture.roster,
            &mut leaderboard,
            fixture.finder(),
        ));
        assert!(!round.reveal(
            &mut seq,
            0,
            1,
            &fixture.roster,
            &mut leaderboard,
            fixture.finder(),
        ));
    }

    #[test]
    fn test_submit_after_reveal_is_ignored() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;
        let mut leaderboard = Leaderboard::default();

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());
        round.reveal(
            &mut seq,
            0,
            1,
            &fixture.roster,
            &mut leaderboard,
            fixture.finder(),
        );

        let completed = round.submit(
            &mut seq,
            fixture.alice_id,
            Submission::Index(1),
            &fixture.roster,
            fixture.finder(),
        );
        assert!(!completed);
        // The recorded no-answer sentinel is untouched
        assert_eq!(
            round.submissions.get(&fixture.alice_id).map(|(s, _)| s),
            Some(&Submission::NoAnswer)
        );
    }

    #[test]
    fn test_state_message_tracks_phase() {
        let fixture = Fixture::new();
        let mut round = Round::new(question());
        let mut seq = 0;
        let mut leaderboard = Leaderboard::default();

        match round.state_message(0, 1) {
            SyncMessage::QuestionOpen { answered_count, .. } => assert_eq!(answered_count, 0),
            SyncMessage::Reveal { .. } => panic!("round has not been revealed"),
        }

        round.open(&mut seq, 0, 1, &fixture.roster, |_, _| {}, fixture.finder());
        round.reveal(
            &mut seq,
            0,
            1,
            &fixture.roster,
            &mut leaderboard,
            fixture.finder(),
        );

        match round.state_message(0, 1) {
            SyncMessage::Reveal { index, count, .. } => {
                assert_eq!(index, 0);
                assert_eq!(count, 1);
            }
            SyncMessage::QuestionOpen { .. } => panic!("round has been revealed"),
        }
    }
}
