//! Submit Answer Use Case
//!
//! Validates a submission against the room cursor and snapshot, grades
//! and scores it, then appends it to the ledger together with the
//! participant's aggregate update. Re-submitting an answered question is
//! an idempotent no-op that reports the original grading.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::{AnswerId, ParticipantId, RoomId};

use crate::application::config::BattleConfig;
use crate::domain::entity::{answer::AnswerRecord, participant::Participant};
use crate::domain::event::{BattleEvent, EventBus};
use crate::domain::repository::{AnswerRepository, RoomRepository};
use crate::domain::services::grading;
use crate::domain::value_object::room_status::RoomStatus;
use crate::error::{BattleError, BattleResult};

/// Longest raw answer kept in the ledger (in characters)
const RAW_ANSWER_MAX_LENGTH: usize = 1024;

/// Submit answer input
pub struct SubmitAnswerInput {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
    pub question_index: u32,
    pub question_id: String,
    pub raw_answer: String,
    /// Client-reported elapsed time since the question opened
    pub time_taken_ms: u64,
}

/// Submit answer outcome
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Newly recorded
    Recorded {
        is_correct: bool,
        points_earned: u32,
        participant: Participant,
    },
    /// The question was answered before; nothing changed
    AlreadyAnswered {
        is_correct: bool,
        points_earned: u32,
    },
}

impl SubmitOutcome {
    pub fn is_correct(&self) -> bool {
        match self {
            Self::Recorded { is_correct, .. } | Self::AlreadyAnswered { is_correct, .. } => {
                *is_correct
            }
        }
    }

    pub fn points_earned(&self) -> u32 {
        match self {
            Self::Recorded { points_earned, .. } | Self::AlreadyAnswered { points_earned, .. } => {
                *points_earned
            }
        }
    }

    fn already_answered(existing: &AnswerRecord) -> Self {
        Self::AlreadyAnswered {
            is_correct: existing.is_correct,
            points_earned: existing.points_earned,
        }
    }
}

/// Submit answer use case
pub struct SubmitAnswerUseCase<R, B>
where
    R: RoomRepository + AnswerRepository,
    B: EventBus,
{
    repo: Arc<R>,
    bus: Arc<B>,
    config: Arc<BattleConfig>,
}

impl<R, B> SubmitAnswerUseCase<R, B>
where
    R: RoomRepository + AnswerRepository,
    B: EventBus,
{
    pub fn new(repo: Arc<R>, bus: Arc<B>, config: Arc<BattleConfig>) -> Self {
        Self { repo, bus, config }
    }

    pub async fn execute(&self, input: SubmitAnswerInput) -> BattleResult<SubmitOutcome> {
        let room = self
            .repo
            .find_room(input.room_id)
            .await?
            .ok_or(BattleError::RoomNotFound)?;

        if room.status != RoomStatus::Active {
            return Err(BattleError::RoomNotActive);
        }
        if input.question_index != room.current_question_index {
            return Err(BattleError::StaleQuestion {
                submitted: input.question_index,
                current: room.current_question_index,
            });
        }
        let question = room
            .current_question()
            .ok_or_else(|| BattleError::Internal("cursor outside snapshot".to_string()))?;
        if question.question_id != input.question_id {
            return Err(BattleError::QuestionMismatch);
        }

        if let Some(existing) = self
            .repo
            .find_answer(input.participant_id, input.question_index)
            .await?
        {
            return Ok(SubmitOutcome::already_answered(&existing));
        }

        let is_correct = grading::is_correct(&input.raw_answer, &question.correct_answer);
        let raw_answer: String = input.raw_answer.chars().take(RAW_ANSWER_MAX_LENGTH).collect();
        let points_earned = self.config.scoring().points(
            is_correct,
            input.time_taken_ms,
            room.question_time_limit_ms(),
        );

        let now = Utc::now();
        let answer = AnswerRecord {
            id: AnswerId::new(),
            room_id: room.id,
            participant_id: input.participant_id,
            question_index: input.question_index,
            question_id: input.question_id,
            raw_answer,
            is_correct,
            points_earned,
            time_taken_ms: input.time_taken_ms,
            answered_at: now,
        };

        let participant = match self.repo.record_answer(&answer).await {
            Ok(participant) => participant,
            Err(BattleError::DuplicateAnswer) => {
                // Lost the race against our own concurrent submission
                let existing = self
                    .repo
                    .find_answer(answer.participant_id, answer.question_index)
                    .await?
                    .ok_or(BattleError::DuplicateAnswer)?;
                return Ok(SubmitOutcome::already_answered(&existing));
            }
            Err(e) => return Err(e),
        };

        let server_elapsed_ms = room
            .question_started_at
            .map(|opened| (now - opened).num_milliseconds());
        tracing::info!(
            room_id = %room.id,
            participant_id = %participant.id,
            question_index = answer.question_index,
            is_correct,
            points = points_earned,
            reported_ms = answer.time_taken_ms,
            server_elapsed_ms = ?server_elapsed_ms,
            "Answer recorded"
        );

        self.bus
            .publish(&room.code, BattleEvent::participant_updated(&participant))
            .await;
        self.bus
            .publish(&room.code, BattleEvent::answer_recorded(&answer))
            .await;

        Ok(SubmitOutcome::Recorded {
            is_correct,
            points_earned,
            participant,
        })
    }
}
