//! Participant roster management
//!
//! This module tracks every device connected to a room, including the host,
//! players, and connections that have not joined yet. It provides
//! functionality for looking up roles, broadcasting sequence-numbered state
//! deltas, and managing the participant lifecycle.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use uuid::Uuid;

use super::{Snapshot, StateDelta, UpdateMessage, session::Tunnel};

/// A unique identifier for a participant device
///
/// Each device (host, player, or unassigned connection) gets a unique ID
/// that persists throughout its participation in the session, across
/// reconnects.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random participant ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role of a participant within a room
///
/// The role determines which commands the room accepts from the device and
/// which broadcasts the device receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A connection that has not joined as a player yet
    Unassigned,
    /// The session host who controls progression
    Host,
    /// A player participating in the session
    Player {
        /// The player's display name, unique within the room
        name: String,
    },
}

/// The kind of participant without associated data
///
/// This enum represents just the discriminant of the [`Role`] enum, useful
/// for filtering participants by type without needing the associated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum RoleKind {
    /// An unassigned connection
    Unassigned,
    /// The session host
    Host,
    /// A player
    Player,
}

impl Role {
    /// Returns the kind of this role without the associated data
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Unassigned => RoleKind::Unassigned,
            Role::Host => RoleKind::Host,
            Role::Player { .. } => RoleKind::Player,
        }
    }
}

/// Serialization helper for Roster struct
#[derive(Deserialize)]
struct RosterSerde {
    mapping: HashMap<Id, Role>,
}

/// Tracks all participant devices in a room
///
/// This struct maintains the role of every connected device and provides
/// helpers for sending sequence-numbered deltas and snapshots through the
/// tunnels the embedding layer provides.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "RosterSerde")]
pub struct Roster {
    /// Primary mapping from participant ID to their role
    mapping: HashMap<Id, Role>,

    /// Reverse mapping organized by role kind for efficient filtering
    #[serde(skip_serializing)]
    reverse_mapping: EnumMap<RoleKind, HashSet<Id>>,
}

impl From<RosterSerde> for Roster {
    /// Reconstructs the Roster struct from serialized data
    ///
    /// This rebuilds the reverse mapping from the primary mapping, which is
    /// necessary since the reverse mapping is not serialized.
    fn from(serde: RosterSerde) -> Self {
        let RosterSerde { mapping } = serde;
        let mut reverse_mapping: EnumMap<RoleKind, HashSet<Id>> = EnumMap::default();
        for (id, role) in &mapping {
            reverse_mapping[role.kind()].insert(*id);
        }
        Self {
            mapping,
            reverse_mapping,
        }
    }
}

/// Errors that can occur when managing the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The room has reached the maximum number of allowed players
    #[error("maximum number of players reached")]
    MaximumPlayers,
}

impl Roster {
    /// Creates a new roster with the host already registered
    ///
    /// # Arguments
    ///
    /// * `host_id` - The ID of the host device
    pub fn with_host_id(host_id: Id) -> Self {
        Self {
            mapping: {
                let mut map = HashMap::default();
                map.insert(host_id, Role::Host);
                map
            },
            reverse_mapping: {
                let mut map: EnumMap<RoleKind, HashSet<Id>> = EnumMap::default();
                map[RoleKind::Host].insert(host_id);
                map
            },
        }
    }

    /// Gets a vector of all participants with their tunnels and roles
    ///
    /// # Arguments
    ///
    /// * `tunnel_finder` - Function to retrieve the tunnel for a given ID
    ///
    /// # Returns
    ///
    /// Vector of tuples containing (ID, Tunnel, Role) for all participants
    /// with active tunnels
    pub fn vec<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) -> Vec<(Id, T, Role)> {
        self.reverse_mapping
            .values()
            .flat_map(|v| v.iter())
            .filter_map(|x| match (tunnel_finder(*x), self.mapping.get(x)) {
                (Some(t), Some(v)) => Some((*x, t, v.to_owned())),
                _ => None,
            })
            .collect_vec()
    }

    /// Gets a vector of participants of a specific kind with their tunnels
    ///
    /// # Arguments
    ///
    /// * `filter` - The kind of participants to include
    /// * `tunnel_finder` - Function to retrieve the tunnel for a given ID
    pub fn specific_vec<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        filter: RoleKind,
        tunnel_finder: F,
    ) -> Vec<(Id, T, Role)> {
        self.reverse_mapping[filter]
            .iter()
            .filter_map(|x| match (tunnel_finder(*x), self.mapping.get(x)) {
                (Some(t), Some(v)) => Some((*x, t, v.to_owned())),
                _ => None,
            })
            .collect_vec()
    }

    /// Gets the count of participants of a specific kind
    pub fn specific_count(&self, filter: RoleKind) -> usize {
        self.reverse_mapping[filter].len()
    }

    /// Returns the IDs of all participants of a specific kind
    pub fn specific_ids(&self, filter: RoleKind) -> impl Iterator<Item = Id> + '_ {
        self.reverse_mapping[filter].iter().copied()
    }

    /// Adds a new participant to the roster
    ///
    /// # Arguments
    ///
    /// * `id` - The unique ID for the new participant
    /// * `role` - The role for the new participant
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumPlayers` if adding this participant would
    /// exceed the maximum allowed number of devices.
    pub fn add_participant(&mut self, id: Id, role: Role) -> Result<(), Error> {
        let kind = role.kind();

        if self.mapping.len() >= crate::constants::room::MAX_PLAYER_COUNT {
            return Err(Error::MaximumPlayers);
        }

        self.mapping.insert(id, role);
        self.reverse_mapping[kind].insert(id);

        Ok(())
    }

    /// Updates the role of an existing participant
    ///
    /// This method properly handles moving the participant between role
    /// categories when their kind changes.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the participant to update
    /// * `role` - The new role for the participant
    pub fn update_role(&mut self, id: Id, role: Role) {
        let old_kind = match self.mapping.get(&id) {
            Some(v) => v.kind(),
            _ => return,
        };
        let new_kind = role.kind();
        if old_kind != new_kind {
            self.reverse_mapping[old_kind].remove(&id);
            self.reverse_mapping[new_kind].insert(id);
        }
        self.mapping.insert(id, role);
    }

    /// Gets the role of a specific participant
    ///
    /// # Returns
    ///
    /// The participant's role if they exist, otherwise `None`
    pub fn get_role(&self, id: Id) -> Option<Role> {
        self.mapping.get(&id).map(|v| v.to_owned())
    }

    /// Checks if a participant exists in the roster
    pub fn has_participant(&self, id: Id) -> bool {
        self.mapping.contains_key(&id)
    }

    /// Closes a participant's tunnel if one is connected
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the participant whose session should be closed
    /// * `tunnel_finder` - Function to retrieve the tunnel for the participant
    pub fn remove_participant_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: &Id,
        tunnel_finder: F,
    ) {
        if let Some(x) = tunnel_finder(*id) {
            x.close();
        }
    }

    /// Gets the display name of a participant
    ///
    /// This only returns a name for players, not hosts or unassigned
    /// connections.
    pub fn get_name(&self, id: Id) -> Option<String> {
        self.get_role(id).and_then(|v| match v {
            Role::Player { name } => Some(name),
            _ => None,
        })
    }

    /// Sends a sequence-numbered delta to a specific participant
    ///
    /// # Arguments
    ///
    /// * `seq` - The room's sequence number for this update
    /// * `message` - The update message to send
    /// * `id` - The ID of the participant to send to
    /// * `tunnel_finder` - Function to retrieve the tunnel for the participant
    pub fn send_delta<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        seq: u64,
        message: &UpdateMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(id) else {
            return;
        };

        session.send_delta(&StateDelta {
            seq,
            update: message.to_owned(),
        });
    }

    /// Sends a full-state snapshot to a specific participant
    ///
    /// # Arguments
    ///
    /// * `snapshot` - The snapshot to send
    /// * `id` - The ID of the participant to send to
    /// * `tunnel_finder` - Function to retrieve the tunnel for the participant
    pub fn send_snapshot<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        snapshot: &Snapshot,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(id) else {
            return;
        };

        session.send_snapshot(snapshot);
    }

    /// Sends personalized deltas to all participants using a sender function
    ///
    /// The sender function is called for each participant and can return a
    /// different message based on the participant's ID and role kind, or
    /// `None` to skip sending. Every recipient sees the same sequence
    /// number, since the deltas describe a single state change.
    ///
    /// # Arguments
    ///
    /// * `seq` - The room's sequence number for this update
    /// * `sender` - Function that generates messages for each participant
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        seq: u64,
        sender: S,
        tunnel_finder: F,
    ) where
        S: Fn(Id, RoleKind) -> Option<UpdateMessage>,
    {
        for (id, session, v) in self.vec(tunnel_finder) {
            let Some(message) = sender(id, v.kind()) else {
                continue;
            };

            session.send_delta(&StateDelta {
                seq,
                update: message,
            });
        }
    }

    /// Broadcasts a delta to all participants except unassigned ones
    ///
    /// # Arguments
    ///
    /// * `seq` - The room's sequence number for this update
    /// * `message` - The update message to broadcast
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        seq: u64,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        self.announce_with(
            seq,
            |_, role_kind| {
                if matches!(role_kind, RoleKind::Unassigned) {
                    None
                } else {
                    Some(message.to_owned())
                }
            },
            tunnel_finder,
        );
    }

    /// Sends a delta to all participants of a specific kind
    ///
    /// # Arguments
    ///
    /// * `seq` - The room's sequence number for this update
    /// * `filter` - The kind of participants to send to
    /// * `message` - The update message to send
    /// * `tunnel_finder` - Function to retrieve tunnels for participants
    pub fn announce_specific<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        seq: u64,
        filter: RoleKind,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, session, _) in self.specific_vec(filter, tunnel_finder) {
            session.send_delta(&StateDelta {
                seq,
                update: message.to_owned(),
            });
        }
    }
}
