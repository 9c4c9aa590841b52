//! Release Codes Use Case
//!
//! Frees room codes held by rooms that are long finished or abandoned so
//! the code space does not fill up. Rooms themselves are kept. Abandoned
//! rooms are force-finished and the transition is published like any other.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::config::BattleConfig;
use crate::domain::event::{BattleEvent, EventBus};
use crate::domain::repository::RoomRepository;
use crate::error::BattleResult;

pub struct ReleaseCodesUseCase<R, B>
where
    R: RoomRepository,
    B: EventBus,
{
    repo: Arc<R>,
    bus: Arc<B>,
    config: Arc<BattleConfig>,
}

impl<R, B> ReleaseCodesUseCase<R, B>
where
    R: RoomRepository,
    B: EventBus,
{
    pub fn new(repo: Arc<R>, bus: Arc<B>, config: Arc<BattleConfig>) -> Self {
        Self { repo, bus, config }
    }

    /// Returns the number of codes released
    pub async fn execute(&self, now: DateTime<Utc>) -> BattleResult<u64> {
        let finished_before = now - self.config.code_retention_chrono();
        let created_before = now - self.config.room_max_lifetime_chrono();
        let outcome = self
            .repo
            .release_expired_codes(finished_before, created_before, now)
            .await?;

        for room in &outcome.force_finished {
            tracing::info!(
                room_id = %room.id,
                room_code = %room.code,
                version = room.version,
                "Abandoned room force-finished"
            );
            self.bus
                .publish(&room.code, BattleEvent::room_status_changed(room))
                .await;
        }

        if outcome.released > 0 {
            tracing::info!(released = outcome.released, "Released expired room codes");
        }
        Ok(outcome.released)
    }
}
