//! Room Info Use Case
//!
//! Lookup by the code players type in.

use std::sync::Arc;

use crate::domain::entity::room::Room;
use crate::domain::repository::{ParticipantRepository, RoomRepository};
use crate::domain::value_object::room_code::RoomCode;
use crate::error::{BattleError, BattleResult};

pub struct RoomInfoOutput {
    pub room: Room,
    pub participant_count: u32,
}

pub struct RoomInfoUseCase<R>
where
    R: RoomRepository + ParticipantRepository,
{
    repo: Arc<R>,
}

impl<R> RoomInfoUseCase<R>
where
    R: RoomRepository + ParticipantRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, code: &str) -> BattleResult<RoomInfoOutput> {
        let code = RoomCode::parse(code).map_err(|_| BattleError::RoomNotFound)?;
        let room = self
            .repo
            .find_room_by_code(&code)
            .await?
            .ok_or(BattleError::RoomNotFound)?;
        let participant_count = self.repo.list_participants(room.id).await?.len() as u32;
        Ok(RoomInfoOutput {
            room,
            participant_count,
        })
    }
}
