//! Answer Review Use Case
//!
//! Returns a participant's ledger and checks the cached aggregates
//! against it.

use std::sync::Arc;

use kernel::id::{ParticipantId, RoomId};

use crate::domain::entity::{
    answer::AnswerRecord,
    participant::{Participant, ParticipantStats},
};
use crate::domain::repository::{AnswerRepository, ParticipantRepository};
use crate::error::{BattleError, BattleResult};

pub struct ReviewAnswersOutput {
    pub participant: Participant,
    pub answers: Vec<AnswerRecord>,
}

pub struct ReviewAnswersUseCase<R>
where
    R: ParticipantRepository + AnswerRepository,
{
    repo: Arc<R>,
}

impl<R> ReviewAnswersUseCase<R>
where
    R: ParticipantRepository + AnswerRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> BattleResult<ReviewAnswersOutput> {
        let participant = self
            .repo
            .find_participant(room_id, participant_id)
            .await?
            .ok_or(BattleError::ParticipantNotFound)?;
        let answers = self.repo.list_answers(room_id, participant_id).await?;

        let ledger = ParticipantStats::from_ledger(&answers);
        if ledger != participant.stats() {
            tracing::error!(
                room_id = %room_id,
                participant_id = %participant_id,
                cached = ?participant.stats(),
                ledger = ?ledger,
                "Participant aggregates drifted from answer ledger"
            );
        }

        Ok(ReviewAnswersOutput {
            participant,
            answers,
        })
    }
}
