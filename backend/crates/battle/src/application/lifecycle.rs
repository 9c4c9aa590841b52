//! Room Lifecycle Use Case
//!
//! `start`, `advance` and `end`. Every transition is a compare-and-swap on
//! the room version, so two concurrent `advance` calls cannot both move the
//! cursor, and each committed transition is published to the room topic.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::RoomId;

use crate::application::config::{BattleConfig, Pacing};
use crate::application::pacer;
use crate::domain::entity::room::Room;
use crate::domain::event::{BattleEvent, EventBus};
use crate::domain::repository::RoomRepository;
use crate::domain::value_object::room_status::RoomStatus;
use crate::error::{BattleError, BattleResult};

/// Lifecycle command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Advance,
    End,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Advance => "advance",
            Self::End => "end",
        }
    }
}

/// Lifecycle use case
pub struct LifecycleUseCase<R, B>
where
    R: RoomRepository,
    B: EventBus,
{
    repo: Arc<R>,
    bus: Arc<B>,
    config: Arc<BattleConfig>,
}

impl<R, B> Clone for LifecycleUseCase<R, B>
where
    R: RoomRepository,
    B: EventBus,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R, B> LifecycleUseCase<R, B>
where
    R: RoomRepository + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, bus: Arc<B>, config: Arc<BattleConfig>) -> Self {
        Self { repo, bus, config }
    }

    /// Apply a moderator command
    pub async fn execute(&self, room_id: RoomId, action: LifecycleAction) -> BattleResult<Room> {
        let room = self
            .repo
            .find_room(room_id)
            .await?
            .ok_or(BattleError::RoomNotFound)?;

        let now = Utc::now();
        let next = match action {
            LifecycleAction::Start => room.start(now)?,
            LifecycleAction::Advance => room.advance(now)?,
            LifecycleAction::End => room.end(now)?,
        };

        if !self.commit(&room, &next).await? {
            return Err(BattleError::InvalidTransition(format!(
                "room changed while trying to {}",
                action.as_str()
            )));
        }

        tracing::info!(
            room_id = %next.id,
            room_code = %next.code,
            action = action.as_str(),
            status = %next.status,
            question_index = next.current_question_index,
            version = next.version,
            "Room transition"
        );

        match self.config.pacing {
            Pacing::Server { grace } if next.status == RoomStatus::Active => {
                pacer::spawn(self.clone(), &next, grace);
            }
            _ => {}
        }

        Ok(next)
    }

    /// Advance only if the cursor is still at `expected_index`.
    ///
    /// Returns `None` when the room moved on (or finished) in the meantime.
    pub async fn advance_from(
        &self,
        room_id: RoomId,
        expected_index: u32,
    ) -> BattleResult<Option<Room>> {
        let Some(room) = self.repo.find_room(room_id).await? else {
            return Ok(None);
        };
        if room.status != RoomStatus::Active || room.current_question_index != expected_index {
            return Ok(None);
        }

        let next = room.advance(Utc::now())?;
        if !self.commit(&room, &next).await? {
            return Ok(None);
        }

        tracing::info!(
            room_id = %next.id,
            room_code = %next.code,
            status = %next.status,
            question_index = next.current_question_index,
            "Question timer elapsed"
        );
        Ok(Some(next))
    }

    async fn commit(&self, current: &Room, next: &Room) -> BattleResult<bool> {
        if !self.repo.compare_and_swap(next, current.version).await? {
            tracing::debug!(
                room_id = %current.id,
                version = current.version,
                "Lost transition race"
            );
            return Ok(false);
        }
        self.bus
            .publish(&next.code, BattleEvent::room_status_changed(next))
            .await;
        Ok(true)
    }
}
