//! Join PIN generation and parsing
//!
//! This module provides the 6-digit join codes participants type to enter
//! a room. PINs are random decimal numbers rendered with leading zeros so
//! they are always exactly six digits when displayed or spoken aloud.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Number of decimal digits in a join PIN
const PIN_DIGITS: usize = 6;
/// Exclusive upper bound for PIN values (10^6)
const PIN_SPACE: u32 = 1_000_000;

/// A 6-digit human-enterable join code for a room
///
/// A PIN is only meaningful while its room is waiting for players; once a
/// session starts the room drops its PIN and the value may be reused by a
/// later room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pin(u32);

impl Pin {
    /// Creates a new random PIN
    pub fn new() -> Self {
        Self(fastrand::u32(0..PIN_SPACE))
    }
}

impl Default for Pin {
    /// Creates a new random PIN (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Pin {
    /// Formats the PIN as a zero-padded 6-digit decimal number
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// Errors that can occur when parsing a PIN from a string
#[derive(Debug, Error)]
pub enum ParsePinError {
    /// The string did not contain exactly six characters
    #[error("pin must be exactly {PIN_DIGITS} digits")]
    WrongLength,
    /// The string contained something other than decimal digits
    #[error("pin is not a number: {0}")]
    NotANumber(#[from] ParseIntError),
}

impl FromStr for Pin {
    type Err = ParsePinError;

    /// Parses a PIN from its zero-padded 6-digit representation
    ///
    /// # Errors
    ///
    /// Returns [`ParsePinError`] if the string is not exactly six decimal
    /// digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != PIN_DIGITS {
            return Err(ParsePinError::WrongLength);
        }
        Ok(Self(s.parse::<u32>()?))
    }
}

impl Serialize for Pin {
    /// Serializes the PIN as its zero-padded string form
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pin {
    /// Deserializes a PIN from its zero-padded string form
    fn deserialize<D>(deserializer: D) -> Result<Pin, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Pin::from_str(&s).map_err(serde::de::Error::custom)
    }
}
