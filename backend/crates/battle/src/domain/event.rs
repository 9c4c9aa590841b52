//! Realtime Events
//!
//! Committed mutations fanned out to every subscriber of a room's topic
//! (the room code). Delivery is at-least-once with best-effort ordering
//! inside a topic, so every payload carries the entity id plus a version
//! that clients merge on.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use kernel::id::{AnswerId, ParticipantId, RoomId};
use serde::Serialize;

use crate::domain::entity::{answer::AnswerRecord, participant::Participant, room::Room};
use crate::domain::value_object::{room_code::RoomCode, room_status::RoomStatus};

/// Stream handed to a subscriber
pub type EventStream = BoxStream<'static, EventEnvelope>;

/// Event bus trait
#[trait_variant::make(EventBus: Send)]
pub trait LocalEventBus {
    /// Publish to every current subscriber of `topic`. Never fails; an
    /// event with no subscribers is dropped.
    async fn publish(&self, topic: &RoomCode, event: BattleEvent);

    /// Subscribe to events published from now on
    async fn subscribe(&self, topic: &RoomCode) -> EventStream;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub topic: String,
    /// Monotonic per topic
    pub seq: u64,
    pub emitted_at: DateTime<Utc>,
    pub event: BattleEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    RoomStatusChanged {
        room: RoomState,
        version: i64,
    },
    ParticipantJoined {
        participant: ParticipantState,
    },
    ParticipantUpdated {
        participant: ParticipantState,
        version: u32,
    },
    AnswerRecorded {
        answer: AnswerSummary,
    },
}

impl BattleEvent {
    pub fn room_status_changed(room: &Room) -> Self {
        Self::RoomStatusChanged {
            room: RoomState::from(room),
            version: room.version,
        }
    }

    pub fn participant_joined(participant: &Participant) -> Self {
        Self::ParticipantJoined {
            participant: ParticipantState::from(participant),
        }
    }

    pub fn participant_updated(participant: &Participant) -> Self {
        Self::ParticipantUpdated {
            participant: ParticipantState::from(participant),
            version: participant.version(),
        }
    }

    pub fn answer_recorded(answer: &AnswerRecord) -> Self {
        Self::AnswerRecorded {
            answer: AnswerSummary::from(answer),
        }
    }

    /// Event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomStatusChanged { .. } => "room_status_changed",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantUpdated { .. } => "participant_updated",
            Self::AnswerRecorded { .. } => "answer_recorded",
        }
    }
}

/// Public room state (no correct answers)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub room_id: RoomId,
    pub code: RoomCode,
    pub status: RoomStatus,
    pub current_question_index: u32,
    pub question_count: u32,
    pub question_time_limit_secs: u32,
    pub question_started_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&Room> for RoomState {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.id,
            code: room.code.clone(),
            status: room.status,
            current_question_index: room.current_question_index,
            question_count: room.snapshot.len() as u32,
            question_time_limit_secs: room.question_time_limit_secs,
            question_started_at: room.question_started_at,
            started_at: room.started_at,
            finished_at: room.finished_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantState {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub total_score: i64,
    pub current_streak: u32,
    pub max_streak: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<&Participant> for ParticipantState {
    fn from(p: &Participant) -> Self {
        Self {
            participant_id: p.id,
            display_name: p.display_name.original().to_string(),
            total_score: p.total_score,
            current_streak: p.current_streak,
            max_streak: p.max_streak,
            questions_answered: p.questions_answered,
            correct_answers: p.correct_answers,
            joined_at: p.joined_at,
            last_activity: p.last_activity,
        }
    }
}

/// Answer as seen by other players: no raw answer text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSummary {
    pub answer_id: AnswerId,
    pub participant_id: ParticipantId,
    pub question_index: u32,
    pub is_correct: bool,
    pub points_earned: u32,
    pub answered_at: DateTime<Utc>,
}

impl From<&AnswerRecord> for AnswerSummary {
    fn from(a: &AnswerRecord) -> Self {
        Self {
            answer_id: a.id,
            participant_id: a.participant_id,
            question_index: a.question_index,
            is_correct: a.is_correct,
            points_earned: a.points_earned,
            answered_at: a.answered_at,
        }
    }
}
