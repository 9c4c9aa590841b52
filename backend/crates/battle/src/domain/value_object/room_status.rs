//! Room Status Value Object
//!
//! `waiting -> active -> finished`. Transitions only move forward and
//! `finished` is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum RoomStatus {
    /// Created, admitting participants, no question open
    Waiting = 0,
    /// Questions are being played
    Active = 1,
    /// Terminal; kept for review
    Finished = 2,
}

impl RoomStatus {
    /// Get numeric ID for database storage
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    /// Get string code for serialization/API
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Forward-only: the only legal moves are to a strictly later state
    #[inline]
    pub fn can_transition_to(&self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Active) | (Self::Active, Self::Finished)
        )
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Waiting),
            1 => Some(Self::Active),
            2 => Some(Self::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which room states admit new participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    /// Only rooms that have not started
    #[default]
    WaitingOnly,
    /// Also rooms that are in progress
    AllowLateJoin,
}

impl JoinPolicy {
    pub fn admits(&self, status: RoomStatus) -> bool {
        match self {
            JoinPolicy::WaitingOnly => status == RoomStatus::Waiting,
            JoinPolicy::AllowLateJoin => status != RoomStatus::Finished,
        }
    }

    /// Statuses admitted under this policy, for storage-side filtering
    pub fn admitted_statuses(&self) -> &'static [RoomStatus] {
        match self {
            JoinPolicy::WaitingOnly => &[RoomStatus::Waiting],
            JoinPolicy::AllowLateJoin => &[RoomStatus::Waiting, RoomStatus::Active],
        }
    }
}
