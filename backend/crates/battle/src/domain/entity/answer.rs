//! Answer Record Entity
//!
//! One row of the append-only answer ledger. Written once, never updated.
//! At most one record exists per `(participant_id, question_index)`.

use chrono::{DateTime, Utc};
use kernel::id::{AnswerId, ParticipantId, RoomId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub id: AnswerId,
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
    pub question_index: u32,
    pub question_id: String,
    pub raw_answer: String,
    pub is_correct: bool,
    pub points_earned: u32,
    /// As reported by the client
    pub time_taken_ms: u64,
    pub answered_at: DateTime<Utc>,
}
