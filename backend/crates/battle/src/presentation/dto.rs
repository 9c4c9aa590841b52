//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use kernel::id::{ParticipantId, RoomId};
use serde::{Deserialize, Serialize};

use crate::application::SubmitOutcome;
use crate::domain::entity::{answer::AnswerRecord, room::Room};
use crate::domain::event::ParticipantState;
use crate::domain::services::ranking::RankedParticipant;
use crate::domain::value_object::question::{Question, QuestionType};
use crate::domain::value_object::room_status::RoomStatus;

// ============================================================================
// Rooms
// ============================================================================

/// Inline question supplied with a create request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub question_id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: Option<String>,
    pub correct_answer: String,
    pub options: Option<Vec<String>>,
}

impl From<QuestionInput> for Question {
    fn from(q: QuestionInput) -> Self {
        Question {
            question_id: q.question_id,
            question_type: q.question_type,
            prompt: q.prompt,
            correct_answer: q.correct_answer,
            options: q.options,
        }
    }
}

/// Create room request. Exactly one of `quizId` and `questions` is expected.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub title: String,
    pub quiz_id: Option<String>,
    pub questions: Option<Vec<QuestionInput>>,
    pub max_participants: u32,
    /// Seconds per question
    pub question_time_limit: u32,
}

/// Create room response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room: RoomView,
    /// Bearer token for start / advance / end
    pub moderator_token: String,
}

/// Question as shown to players: no correct answer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub question_id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: Option<String>,
    pub options: Option<Vec<String>>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            question_id: q.question_id.clone(),
            question_type: q.question_type,
            prompt: q.prompt.clone(),
            options: q.options.clone(),
        }
    }
}

/// Room info response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: RoomId,
    pub code: String,
    pub title: String,
    pub status: RoomStatus,
    pub version: i64,
    pub current_question_index: u32,
    pub question_count: u32,
    /// Seconds per question
    pub question_time_limit: u32,
    pub max_participants: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<u32>,
    /// Only while the room is active
    pub current_question: Option<PublicQuestion>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub question_started_at: Option<DateTime<Utc>>,
}

impl RoomView {
    pub fn new(room: &Room, participant_count: Option<u32>) -> Self {
        let current_question = (room.status == RoomStatus::Active)
            .then(|| room.current_question().map(PublicQuestion::from))
            .flatten();
        Self {
            room_id: room.id,
            code: room.code.to_string(),
            title: room.title.clone(),
            status: room.status,
            version: room.version,
            current_question_index: room.current_question_index,
            question_count: room.snapshot.len() as u32,
            question_time_limit: room.question_time_limit_secs,
            max_participants: room.max_participants,
            participant_count,
            current_question,
            created_at: room.created_at,
            started_at: room.started_at,
            finished_at: room.finished_at,
            question_started_at: room.question_started_at,
        }
    }
}

// ============================================================================
// Join
// ============================================================================

/// Join room request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub display_name: String,
    /// Stable id from the identity provider, if signed in
    pub external_user_id: Option<String>,
}

/// Join room response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub room: RoomView,
    pub participant: ParticipantState,
    /// Bearer token for answer submission and review
    pub participant_token: String,
}

// ============================================================================
// Answers
// ============================================================================

/// Submit answer request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub participant_id: ParticipantId,
    pub question_index: u32,
    pub question_id: String,
    pub answer: String,
    pub time_taken_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Recorded,
    AlreadyAnswered,
}

/// Submit answer response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub status: SubmitStatus,
    pub is_correct: bool,
    pub points_earned: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantState>,
}

impl From<SubmitOutcome> for SubmitAnswerResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        let is_correct = outcome.is_correct();
        let points_earned = outcome.points_earned();
        match outcome {
            SubmitOutcome::Recorded { participant, .. } => Self {
                status: SubmitStatus::Recorded,
                is_correct,
                points_earned,
                participant: Some(ParticipantState::from(&participant)),
            },
            SubmitOutcome::AlreadyAnswered { .. } => Self {
                status: SubmitStatus::AlreadyAnswered,
                is_correct,
                points_earned,
                participant: None,
            },
        }
    }
}

/// One ledger entry in an answer review
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub question_index: u32,
    pub question_id: String,
    pub answer: String,
    pub is_correct: bool,
    pub points_earned: u32,
    pub time_taken_ms: u64,
    pub answered_at: DateTime<Utc>,
}

impl From<AnswerRecord> for AnswerView {
    fn from(a: AnswerRecord) -> Self {
        Self {
            question_index: a.question_index,
            question_id: a.question_id,
            answer: a.raw_answer,
            is_correct: a.is_correct,
            points_earned: a.points_earned,
            time_taken_ms: a.time_taken_ms,
            answered_at: a.answered_at,
        }
    }
}

/// Answer review response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReviewResponse {
    pub participant: ParticipantState,
    pub answers: Vec<AnswerView>,
}

// ============================================================================
// Leaderboard
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    #[serde(flatten)]
    pub participant: ParticipantState,
}

impl From<&RankedParticipant> for LeaderboardEntry {
    fn from(r: &RankedParticipant) -> Self {
        Self {
            rank: r.rank,
            participant: ParticipantState::from(&r.participant),
        }
    }
}

/// Leaderboard response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub entries: Vec<LeaderboardEntry>,
}

// ============================================================================
// Realtime
// ============================================================================

/// First frame on a new event subscription
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotFrame {
    Snapshot {
        room: RoomView,
        leaderboard: Vec<LeaderboardEntry>,
    },
}
