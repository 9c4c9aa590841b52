//! Join Room Use Case
//!
//! Admits a participant by room code. The status, capacity and name
//! checks here are only a fast path; the repository re-checks all three
//! at write time, which is what decides concurrent joins.

use std::sync::Arc;

use chrono::Utc;
use platform::token::{self, TokenPurpose};

use crate::application::config::BattleConfig;
use crate::domain::entity::{participant::Participant, room::Room};
use crate::domain::event::{BattleEvent, EventBus};
use crate::domain::repository::{ParticipantRepository, RoomRepository};
use crate::domain::value_object::{display_name::DisplayName, room_code::RoomCode};
use crate::error::{BattleError, BattleResult};

/// Join room input
pub struct JoinRoomInput {
    pub code: String,
    pub display_name: String,
    pub external_user_id: Option<String>,
}

/// Join room output
pub struct JoinRoomOutput {
    pub room: Room,
    pub participant: Participant,
    pub participant_token: String,
}

/// Join room use case
pub struct JoinRoomUseCase<R, B>
where
    R: RoomRepository + ParticipantRepository,
    B: EventBus,
{
    repo: Arc<R>,
    bus: Arc<B>,
    config: Arc<BattleConfig>,
}

impl<R, B> JoinRoomUseCase<R, B>
where
    R: RoomRepository + ParticipantRepository,
    B: EventBus,
{
    pub fn new(repo: Arc<R>, bus: Arc<B>, config: Arc<BattleConfig>) -> Self {
        Self { repo, bus, config }
    }

    pub async fn execute(&self, input: JoinRoomInput) -> BattleResult<JoinRoomOutput> {
        let code = RoomCode::parse(&input.code).map_err(|_| BattleError::RoomNotFound)?;
        let display_name = DisplayName::new(&input.display_name)
            .map_err(|e| BattleError::InvalidDisplayName(e.to_string()))?;
        let external_user_id = input
            .external_user_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let room = self
            .repo
            .find_room_by_code(&code)
            .await?
            .ok_or(BattleError::RoomNotFound)?;

        let policy = self.config.join_policy;
        if !policy.admits(room.status) {
            return Err(BattleError::RoomNotJoinable);
        }

        let participant = Participant::new(room.id, display_name, external_user_id, Utc::now());
        self.repo
            .admit(&participant, policy.admitted_statuses())
            .await?;

        tracing::info!(
            room_id = %room.id,
            room_code = %room.code,
            participant_id = %participant.id,
            display_name = %participant.display_name,
            "Participant joined"
        );

        self.bus
            .publish(&room.code, BattleEvent::participant_joined(&participant))
            .await;

        let participant_token = token::issue(
            &self.config.token_secret,
            TokenPurpose::Participant,
            participant.id.as_uuid(),
        );

        Ok(JoinRoomOutput {
            room,
            participant,
            participant_token,
        })
    }
}
