//! Room Code Value Object
//!
//! Short, human-typeable decimal token that identifies a live room.
//! Codes are drawn from a fixed numeric range and rendered zero-padded to
//! the width of the range's upper bound, so `[1000, 9999]` gives 4-digit
//! codes and caps the number of simultaneously live rooms at 9000.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest code accepted from clients
const ROOM_CODE_MAX_LEN: usize = 9;

/// Error returned when a room code cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomCodeError {
    #[error("Room code must not be empty")]
    Empty,
    #[error("Room code must be at most {ROOM_CODE_MAX_LEN} digits")]
    TooLong,
    #[error("Room code must contain digits only")]
    NotNumeric,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Parse a code typed by a user (surrounding whitespace is ignored)
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RoomCodeError::Empty);
        }
        if trimmed.len() > ROOM_CODE_MAX_LEN {
            return Err(RoomCodeError::TooLong);
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RoomCodeError::NotNumeric);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Reconstruct from storage without validation
    pub fn from_trusted(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive numeric range room codes are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSpace {
    min: u32,
    max: u32,
}

impl CodeSpace {
    /// The default 4-digit space
    pub const FOUR_DIGIT: CodeSpace = CodeSpace { min: 1000, max: 9999 };

    pub fn new(min: u32, max: u32) -> Option<Self> {
        (min <= max && max < 10u32.pow(ROOM_CODE_MAX_LEN as u32)).then_some(Self { min, max })
    }

    /// Number of distinct codes in the space
    pub fn size(&self) -> u32 {
        self.max - self.min + 1
    }

    /// Width every code is padded to
    pub fn width(&self) -> usize {
        self.max.to_string().len()
    }

    /// Render the `offset`-th code of the space (`offset < size()`)
    pub fn code_at(&self, offset: u32) -> RoomCode {
        let value = self.min.saturating_add(offset).min(self.max);
        RoomCode(format!("{:0width$}", value, width = self.width()))
    }
}

impl Default for CodeSpace {
    fn default() -> Self {
        Self::FOUR_DIGIT
    }
}
