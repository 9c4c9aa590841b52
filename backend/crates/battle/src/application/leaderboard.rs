//! Leaderboard Use Case
//!
//! Read-only projection of participant aggregates.

use std::sync::Arc;

use kernel::id::RoomId;

use crate::domain::entity::room::Room;
use crate::domain::repository::{ParticipantRepository, RoomRepository};
use crate::domain::services::ranking::{self, RankedParticipant};
use crate::error::{BattleError, BattleResult};

pub struct LeaderboardOutput {
    pub room: Room,
    pub entries: Vec<RankedParticipant>,
}

pub struct LeaderboardUseCase<R>
where
    R: RoomRepository + ParticipantRepository,
{
    repo: Arc<R>,
}

impl<R> LeaderboardUseCase<R>
where
    R: RoomRepository + ParticipantRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, room_id: RoomId) -> BattleResult<LeaderboardOutput> {
        let room = self
            .repo
            .find_room(room_id)
            .await?
            .ok_or(BattleError::RoomNotFound)?;
        let participants = self.repo.list_participants(room.id).await?;
        Ok(LeaderboardOutput {
            room,
            entries: ranking::rank(participants),
        })
    }
}
