//! Participant Entity
//!
//! One competitor in a room. The aggregate counters are a cached
//! projection of the participant's answer ledger: `apply_answer` is the
//! only way they change and `ParticipantStats::from_ledger` rebuilds them.

use chrono::{DateTime, Utc};
use kernel::id::{ParticipantId, RoomId};
use serde::Serialize;

use crate::domain::entity::answer::AnswerRecord;
use crate::domain::value_object::display_name::DisplayName;

/// Participant entity
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub room_id: RoomId,
    /// Stable id from the identity provider; `None` for anonymous players
    pub external_user_id: Option<String>,
    pub display_name: DisplayName,
    pub total_score: i64,
    pub current_streak: u32,
    pub max_streak: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Participant {
    /// New participant with all counters zeroed
    pub fn new(
        room_id: RoomId,
        display_name: DisplayName,
        external_user_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ParticipantId::new(),
            room_id,
            external_user_id,
            display_name,
            total_score: 0,
            current_streak: 0,
            max_streak: 0,
            questions_answered: 0,
            correct_answers: 0,
            joined_at: now,
            last_activity: now,
        }
    }

    /// Fold one graded answer into the aggregates
    pub fn apply_answer(&mut self, is_correct: bool, points: u32, at: DateTime<Utc>) {
        let mut stats = self.stats();
        stats.apply(is_correct, points);
        self.set_stats(stats);
        self.last_activity = at;
    }

    /// Monotonic per-participant version for idempotent client merges
    pub fn version(&self) -> u32 {
        self.questions_answered
    }

    pub fn stats(&self) -> ParticipantStats {
        ParticipantStats {
            total_score: self.total_score,
            current_streak: self.current_streak,
            max_streak: self.max_streak,
            questions_answered: self.questions_answered,
            correct_answers: self.correct_answers,
        }
    }

    pub fn set_stats(&mut self, stats: ParticipantStats) {
        self.total_score = stats.total_score;
        self.current_streak = stats.current_streak;
        self.max_streak = stats.max_streak;
        self.questions_answered = stats.questions_answered;
        self.correct_answers = stats.correct_answers;
    }
}

/// Aggregate counters derived from the answer ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub total_score: i64,
    pub current_streak: u32,
    pub max_streak: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
}

impl ParticipantStats {
    fn apply(&mut self, is_correct: bool, points: u32) {
        self.questions_answered += 1;
        if is_correct {
            self.correct_answers += 1;
            self.current_streak += 1;
            self.max_streak = self.max_streak.max(self.current_streak);
            self.total_score += i64::from(points);
        } else {
            self.current_streak = 0;
        }
    }

    /// Rebuild aggregates from ledger records in question order
    pub fn from_ledger(answers: &[AnswerRecord]) -> Self {
        let mut ordered: Vec<&AnswerRecord> = answers.iter().collect();
        ordered.sort_by_key(|a| a.question_index);

        let mut stats = Self::default();
        for answer in ordered {
            stats.apply(answer.is_correct, answer.points_earned);
        }
        stats
    }
}
