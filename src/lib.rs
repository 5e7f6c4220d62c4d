//! # Quizroom Session Core
//!
//! This library provides the synchronization core for live multiplayer quiz
//! sessions: room lifecycle, the join/lobby protocol, per-question rounds
//! with answer collection and scoring, host-driven progression, and the
//! per-device reactive client that mirrors the authoritative room state.
//!
//! The room is the single authoritative process for a session. Devices send
//! it commands (join, start, submit answer, advance) and receive
//! sequence-numbered state deltas in return, so a client can always detect
//! and discard stale updates. Transport is abstracted behind the
//! [`session::Tunnel`] trait; the crate itself performs no I/O.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod client;
pub mod grading;
pub mod leaderboard;
pub mod lobby;
pub mod names;
pub mod pin;
pub mod quiz;
pub mod room;
pub mod roster;
pub mod round;
pub mod session;

/// Update messages broadcast by a room when its state changes
///
/// Updates are incremental: they assume the recipient already holds a view
/// of the session and only describe what changed.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Room-level updates (lobby roster, standings, summary)
    Room(room::UpdateMessage),
    /// Round-level updates (question open, answered count, reveal)
    Round(round::UpdateMessage),
}

/// Sync messages that replace a device's entire view of the session
///
/// A sync message is sent when a device connects or reconnects; it carries
/// everything needed to render the current phase from scratch, which is how
/// reconnect gaps are resolved without replaying missed rounds.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum SyncMessage {
    /// Room-level synchronization
    Room(room::SyncMessage),
    /// Round-level synchronization
    Round(round::SyncMessage),
}

/// Alarm messages for scheduled deadlines
///
/// The room owns the round clock: when it opens a question it schedules an
/// alarm for the question's time limit, and the embedding layer delivers it
/// back via [`room::Room::receive_alarm`].
#[derive(Debug, Clone, derive_more::From, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Round deadline alarms
    Round(round::AlarmMessage),
}

/// A sequence-numbered update envelope
///
/// Every broadcast from a room carries the room's monotonically increasing
/// sequence number, letting clients drop stale or out-of-order deltas
/// deterministically instead of relying on "last write observed."
#[derive(Debug, Serialize, Clone)]
pub struct StateDelta {
    /// Per-room monotonic sequence number of this update
    pub seq: u64,
    /// The update itself
    pub update: UpdateMessage,
}

impl StateDelta {
    /// Converts the delta to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// A full-state snapshot envelope sent to (re)connecting devices
///
/// The snapshot carries the room's sequence number at the time it was
/// produced so the receiving client can resume delta filtering from there.
#[derive(Debug, Serialize, Clone)]
pub struct Snapshot {
    /// Room sequence number the snapshot reflects
    pub seq: u64,
    /// Full view of the current phase
    pub sync: SyncMessage,
}

impl Snapshot {
    /// Converts the snapshot to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// A truncated list that keeps the exact count while limiting shown items
///
/// Used for roster and leaderboard displays: a room may hold hundreds of
/// players but clients only render the first few names plus a total.
#[derive(Debug, Clone, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated list from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to keep
    /// * `exact_count` - The exact total count (may exceed `limit`)
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Maps a function over the kept items, preserving the exact count
    pub fn map<F, U>(self, f: F) -> TruncatedVec<U>
    where
        F: Fn(T) -> U,
    {
        TruncatedVec {
            exact_count: self.exact_count,
            items: self.items.into_iter().map(f).collect_vec(),
        }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the kept items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_vec_keeps_exact_count() {
        let truncated = TruncatedVec::new(["a", "b", "c", "d"].into_iter(), 2, 4);

        assert_eq!(truncated.exact_count(), 4);
        assert_eq!(truncated.items(), &["a", "b"]);
    }

    #[test]
    fn test_truncated_vec_limit_larger_than_items() {
        let truncated = TruncatedVec::new([1, 2].into_iter(), 10, 2);

        assert_eq!(truncated.exact_count(), 2);
        assert_eq!(truncated.items(), &[1, 2]);
    }

    #[test]
    fn test_truncated_vec_map() {
        let truncated = TruncatedVec::new([1, 2, 3].into_iter(), 2, 3);
        let mapped = truncated.map(|x| x * 10);

        assert_eq!(mapped.exact_count(), 3);
        assert_eq!(mapped.items(), &[10, 20]);
    }

    #[test]
    fn test_state_delta_to_message_includes_seq() {
        let delta = StateDelta {
            seq: 7,
            update: UpdateMessage::Round(round::UpdateMessage::AnsweredCount(3)),
        };
        let json = delta.to_message();

        assert!(json.contains("\"seq\":7"));
        assert!(json.contains("AnsweredCount"));
    }

    #[test]
    fn test_snapshot_to_message() {
        let names = TruncatedVec::new(["Alice".to_string()].into_iter(), 10, 1);
        let snapshot = Snapshot {
            seq: 1,
            sync: SyncMessage::Room(room::SyncMessage::Lobby(names)),
        };
        let json = snapshot.to_message();

        assert!(json.contains("Lobby"));
        assert!(json.contains("Alice"));
    }
}
