//! Player name management and validation
//!
//! This module handles the assignment and validation of player names within
//! a room. It ensures name uniqueness, enforces length requirements, and
//! maintains bidirectional mappings between participant IDs and names.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use heck::ToTitleCase;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{constants::room::MAX_NAME_LENGTH, roster::Id};

/// Generates a random fallback name for a player who joined without one
///
/// # Returns
///
/// A title-cased adjective + animal combination.
pub fn random_name() -> String {
    petname::petname(2, " ").unwrap_or_default().to_title_case()
}

/// Serialization helper for Names struct
#[derive(Deserialize)]
struct NamesSerde {
    mapping: HashMap<Id, String>,
}

/// Manages player names and their associations with participant IDs
///
/// This struct maintains a bidirectional mapping between participant IDs
/// and names, ensuring that names are unique within a room and meet length
/// requirements.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "NamesSerde")]
pub struct Names {
    /// Primary mapping from participant ID to name
    mapping: HashMap<Id, String>,

    /// Reverse mapping from name to participant ID (not serialized)
    #[serde(skip_serializing)]
    reverse_mapping: HashMap<String, Id>,
    /// Set of all existing names for quick uniqueness checks (not serialized)
    #[serde(skip_serializing)]
    existing: HashSet<String>,
}

impl From<NamesSerde> for Names {
    /// Reconstructs the Names struct from serialized data
    ///
    /// This rebuilds the reverse mapping and existing names set from the
    /// primary mapping, which is necessary since these fields are not
    /// serialized.
    fn from(serde: NamesSerde) -> Self {
        let NamesSerde { mapping } = serde;
        let mut reverse_mapping = HashMap::new();
        let mut existing = HashSet::new();
        for (id, name) in &mapping {
            reverse_mapping.insert(name.to_owned(), *id);
            existing.insert(name.to_owned());
        }
        Self {
            mapping,
            reverse_mapping,
            existing,
        }
    }
}

/// Errors that can occur during name validation and assignment
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested name is already in use by another player
    #[error("name already in-use")]
    Used,
    /// The player already has an assigned name
    #[error("player has an existing name")]
    Assigned,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

impl Names {
    /// Retrieves the name associated with a participant ID
    ///
    /// # Arguments
    ///
    /// * `id` - The participant ID to look up
    ///
    /// # Returns
    ///
    /// The player's name if they have one assigned, otherwise `None`
    pub fn get_name(&self, id: &Id) -> Option<String> {
        self.mapping.get(id).map(std::borrow::ToOwned::to_owned)
    }

    /// Assigns a name to a player after validation
    ///
    /// # Arguments
    ///
    /// * `id` - The participant ID to assign the name to
    /// * `name` - The requested name (will be trimmed of whitespace)
    ///
    /// # Returns
    ///
    /// The cleaned and assigned name on success, or an error describing
    /// why the name was rejected.
    ///
    /// # Errors
    ///
    /// * `Error::TooLong` - Name exceeds the maximum length
    /// * `Error::Empty` - Name is empty after trimming whitespace
    /// * `Error::Used` - Name is already taken by another player
    /// * `Error::Assigned` - Player already has a name assigned
    pub fn set_name(&mut self, id: Id, name: &str) -> Result<String, Error> {
        let name = name.trim();
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::TooLong);
        }
        if name.is_empty() {
            return Err(Error::Empty);
        }
        if self.mapping.contains_key(&id) {
            return Err(Error::Assigned);
        }
        if !self.existing.insert(name.to_owned()) {
            return Err(Error::Used);
        }
        match self.mapping.entry(id) {
            Entry::Occupied(_) => Err(Error::Assigned),
            Entry::Vacant(v) => {
                v.insert(name.to_owned());
                self.reverse_mapping.insert(name.to_owned(), id);
                Ok(name.to_owned())
            }
        }
    }

    /// Retrieves the participant ID associated with a name
    ///
    /// # Arguments
    ///
    /// * `name` - The name to look up
    ///
    /// # Returns
    ///
    /// The participant ID if the name is assigned, otherwise `None`
    pub fn get_id(&self, name: &str) -> Option<Id> {
        self.reverse_mapping.get(name).copied()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_names_set_and_get() {
        let mut names = Names::default();
        let id = Id::new();

        let result = names.set_name(id, "TestPlayer");
        assert_eq!(result, Ok("TestPlayer".to_string()));

        assert_eq!(names.get_name(&id), Some("TestPlayer".to_string()));
        assert_eq!(names.get_id("TestPlayer"), Some(id));
    }

    #[test]
    fn test_names_too_long() {
        let mut names = Names::default();
        let id = Id::new();

        let long_name = "a".repeat(MAX_NAME_LENGTH + 1);
        assert_eq!(names.set_name(id, &long_name), Err(Error::TooLong));

        let max_name = "a".repeat(MAX_NAME_LENGTH);
        assert_eq!(names.set_name(id, &max_name), Ok(max_name));
    }

    #[test]
    fn test_names_length_counts_characters_not_bytes() {
        let mut names = Names::default();
        let id = Id::new();

        // 30 characters but far more than 30 bytes
        let multibyte = "é".repeat(MAX_NAME_LENGTH);
        assert_eq!(names.set_name(id, &multibyte), Ok(multibyte));

        let id2 = Id::new();
        let too_long = "é".repeat(MAX_NAME_LENGTH + 1);
        assert_eq!(names.set_name(id2, &too_long), Err(Error::TooLong));
    }

    #[test]
    fn test_names_empty_name() {
        let mut names = Names::default();
        let id = Id::new();

        assert_eq!(names.set_name(id, ""), Err(Error::Empty));
        assert_eq!(names.set_name(id, "   "), Err(Error::Empty));
        assert_eq!(names.set_name(id, "\t\n"), Err(Error::Empty));
    }

    #[test]
    fn test_names_whitespace_trimming() {
        let mut names = Names::default();
        let id = Id::new();

        assert_eq!(
            names.set_name(id, "  TestPlayer  "),
            Ok("TestPlayer".to_string())
        );
    }

    #[test]
    fn test_names_duplicate_error() {
        let mut names = Names::default();
        let id1 = Id::new();
        let id2 = Id::new();
        let id3 = Id::new();

        names.set_name(id1, "Player").unwrap();
        assert_eq!(names.set_name(id2, "Player"), Err(Error::Used));

        // Whitespace-trimmed names are also considered duplicates
        assert_eq!(names.set_name(id3, "  Player  "), Err(Error::Used));
    }

    #[test]
    fn test_names_already_assigned_error() {
        let mut names = Names::default();
        let id = Id::new();

        names.set_name(id, "FirstName").unwrap();
        assert_eq!(names.set_name(id, "SecondName"), Err(Error::Assigned));

        // Original name should still be there
        assert_eq!(names.get_name(&id), Some("FirstName".to_string()));
    }

    #[test]
    fn test_names_reverse_mapping_rebuild() {
        let mut original = Names::default();
        let id = Id::new();
        original.set_name(id, "TestPlayer").unwrap();

        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: Names = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized.get_id("TestPlayer"), Some(id));

        // Duplicate detection still works after the rebuild
        let mut names = deserialized;
        let new_id = Id::new();
        assert_eq!(names.set_name(new_id, "TestPlayer"), Err(Error::Used));
    }

    #[test]
    fn test_random_name_is_title_cased_words() {
        let name = random_name();
        assert!(!name.is_empty());
        assert!(name.chars().next().unwrap().is_uppercase());
        assert_eq!(name.matches(' ').count(), 1);
    }
}
