//! Room Entity
//!
//! A single battle session: a frozen quiz snapshot, a live code and the
//! `waiting -> active -> finished` state machine with its question cursor.
//!
//! Transitions never mutate in place. Each returns the next state with
//! `version + 1`, which the repository writes with a compare-and-swap on
//! the previous version.

use chrono::{DateTime, Utc};
use kernel::id::RoomId;

use crate::domain::value_object::{
    question::{Question, QuizSnapshot},
    room_code::RoomCode,
    room_status::RoomStatus,
};
use crate::error::{BattleError, BattleResult};

/// Room entity
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub code: RoomCode,
    pub title: String,
    /// Catalog quiz the snapshot was taken from, if any
    pub quiz_id: Option<String>,
    pub snapshot: QuizSnapshot,
    pub status: RoomStatus,
    pub max_participants: u32,
    pub current_question_index: u32,
    pub question_time_limit_secs: u32,
    /// Incremented on every transition
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// When the question at the cursor was opened
    pub question_started_at: Option<DateTime<Utc>>,
}

/// Everything a new room needs except its code; validated by the create use case
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub title: String,
    pub quiz_id: Option<String>,
    pub snapshot: QuizSnapshot,
    pub max_participants: u32,
    pub question_time_limit_secs: u32,
}

impl Room {
    /// Create a room in `waiting` with the cursor at the first question
    pub fn new(code: RoomCode, input: NewRoom, now: DateTime<Utc>) -> Self {
        Self {
            id: RoomId::new(),
            code,
            title: input.title,
            quiz_id: input.quiz_id,
            snapshot: input.snapshot,
            status: RoomStatus::Waiting,
            max_participants: input.max_participants,
            current_question_index: 0,
            question_time_limit_secs: input.question_time_limit_secs,
            version: 0,
            created_at: now,
            started_at: None,
            finished_at: None,
            question_started_at: None,
        }
    }

    pub fn question_time_limit_ms(&self) -> u64 {
        u64::from(self.question_time_limit_secs) * 1000
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.snapshot.get(self.current_question_index)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_question_index >= self.snapshot.last_index()
    }

    /// `waiting -> active`
    pub fn start(&self, now: DateTime<Utc>) -> BattleResult<Room> {
        self.require(RoomStatus::Waiting, "start")?;
        let mut next = self.bumped();
        next.status = RoomStatus::Active;
        next.started_at = Some(now);
        next.question_started_at = Some(now);
        Ok(next)
    }

    /// Move the cursor forward, or finish when already on the last question
    pub fn advance(&self, now: DateTime<Utc>) -> BattleResult<Room> {
        self.require(RoomStatus::Active, "advance")?;
        if self.is_last_question() {
            return Ok(self.finished(now));
        }
        let mut next = self.bumped();
        next.current_question_index += 1;
        next.question_started_at = Some(now);
        Ok(next)
    }

    /// Moderator-initiated early stop: `active -> finished`
    pub fn end(&self, now: DateTime<Utc>) -> BattleResult<Room> {
        self.require(RoomStatus::Active, "end")?;
        Ok(self.finished(now))
    }

    /// Finish an abandoned room from any non-terminal state.
    ///
    /// Used by the code-release sweep only.
    pub fn expire(&self, now: DateTime<Utc>) -> BattleResult<Room> {
        if self.status.is_terminal() {
            return Err(self.invalid("expire"));
        }
        Ok(self.finished(now))
    }

    fn finished(&self, now: DateTime<Utc>) -> Room {
        let mut next = self.bumped();
        next.status = RoomStatus::Finished;
        next.finished_at = Some(now);
        next.question_started_at = None;
        next
    }

    fn bumped(&self) -> Room {
        let mut next = self.clone();
        next.version += 1;
        next
    }

    fn require(&self, expected: RoomStatus, action: &str) -> BattleResult<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &str) -> BattleError {
        BattleError::InvalidTransition(format!("cannot {action} a room that is {}", self.status))
    }
}
