//! Room registry and PIN resolution
//!
//! This module maps join PINs to live rooms. A PIN resolves only while its
//! room is still waiting for players; once a session starts (or the room is
//! gone) the PIN is indistinguishable from one that never existed, and the
//! same six digits may be handed to a later room.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use serde::Serialize;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    pin::Pin,
    quiz::Quiz,
    room::Room,
    roster::Id,
};

/// A stable identifier for a room, independent of its reusable PIN
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct RoomId(Uuid);

impl RoomId {
    /// Creates a new random room ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    /// Creates a new random room ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoomId {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = uuid::Error;

    /// Parses a room ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Errors that can occur when joining through the lobby
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// The PIN does not resolve to a joinable room
    ///
    /// Unknown PINs and PINs of already-started rooms produce the same
    /// error, so a failed join leaks nothing about running sessions.
    #[error("no joinable room with this pin")]
    NotFound,
}

/// The registry of live rooms and their join PINs
#[derive(Debug, Default)]
pub struct Lobby {
    /// All live rooms by their stable ID
    rooms: HashMap<RoomId, Room>,
    /// PIN to room mapping; entries may be stale once rooms start
    pins: HashMap<Pin, RoomId>,
}

impl Lobby {
    /// Creates an empty lobby
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room for a quiz and registers a join PIN for it
    ///
    /// The PIN is drawn randomly until it doesn't collide with another
    /// still-waiting room; a PIN held by a started room is stale and gets
    /// overwritten.
    ///
    /// # Arguments
    ///
    /// * `quiz` - The quiz the room will play
    /// * `host_id` - The hosting device's ID
    ///
    /// # Returns
    ///
    /// The new room's ID and its join PIN
    pub fn create_room(&mut self, quiz: Quiz, host_id: Id) -> (RoomId, Pin) {
        let pin = loop {
            let candidate = Pin::new();
            let in_use = self
                .pins
                .get(&candidate)
                .and_then(|room_id| self.rooms.get(room_id))
                .is_some_and(Room::is_waiting);
            if !in_use {
                break candidate;
            }
        };

        let room_id = RoomId::new();
        self.rooms.insert(room_id, Room::new(quiz, host_id, pin));
        self.pins.insert(pin, room_id);

        (room_id, pin)
    }

    /// Resolves a PIN to a joinable room
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::NotFound`] if the PIN is unknown or its room is
    /// no longer waiting for players.
    pub fn resolve_pin(&self, pin: Pin) -> Result<RoomId, JoinError> {
        self.pins
            .get(&pin)
            .and_then(|room_id| {
                self.rooms
                    .get(room_id)
                    .is_some_and(Room::is_waiting)
                    .then_some(*room_id)
            })
            .ok_or(JoinError::NotFound)
    }

    /// Returns a reference to a room
    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    /// Returns a mutable reference to a room
    pub fn room_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    /// Removes a room and its PIN entry
    ///
    /// # Returns
    ///
    /// The removed room, if it existed
    pub fn remove_room(&mut self, room_id: RoomId) -> Option<Room> {
        let room = self.rooms.remove(&room_id)?;
        if let Some(pin) = room.pin() {
            if self.pins.get(&pin) == Some(&room_id) {
                self.pins.remove(&pin);
            }
        }
        Some(room)
    }

    /// Returns the number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if no rooms are registered
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
