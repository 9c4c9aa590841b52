//! Room Registry
//!
//! Allocates short numeric room codes. Candidates are drawn without
//! replacement from the configured code space; the room insert is what
//! actually claims a code, so two concurrent creations that pick the same
//! candidate cannot both win.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::index;

use crate::application::config::BattleConfig;
use crate::domain::entity::room::{NewRoom, Room};
use crate::domain::repository::RoomRepository;
use crate::domain::value_object::room_code::RoomCode;
use crate::error::{BattleError, BattleResult};

pub struct RoomRegistry<R>
where
    R: RoomRepository,
{
    repo: Arc<R>,
    config: Arc<BattleConfig>,
}

impl<R> RoomRegistry<R>
where
    R: RoomRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<BattleConfig>) -> Self {
        Self { repo, config }
    }

    /// Distinct random candidates, at most `code_max_attempts` of them
    fn candidates(&self) -> Vec<RoomCode> {
        let space = self.config.code_space();
        let amount = self.config.code_max_attempts.min(space.size()) as usize;
        let mut rng = rand::rng();
        index::sample(&mut rng, space.size() as usize, amount)
            .into_iter()
            .map(|offset| space.code_at(offset as u32))
            .collect()
    }

    /// First candidate not held by a live room.
    ///
    /// The code is not reserved; use `register` to claim one.
    pub async fn allocate_code(&self) -> BattleResult<RoomCode> {
        for code in self.candidates() {
            if !self.repo.code_in_use(&code).await? {
                return Ok(code);
            }
        }
        Err(self.exhausted())
    }

    /// Insert a new room under a freshly allocated code
    pub async fn register(&self, draft: NewRoom, now: DateTime<Utc>) -> BattleResult<Room> {
        for code in self.candidates() {
            if self.repo.code_in_use(&code).await? {
                continue;
            }
            let room = Room::new(code, draft.clone(), now);
            match self.repo.insert_room(&room).await {
                Ok(()) => return Ok(room),
                Err(BattleError::CodeTaken) => {
                    tracing::debug!(
                        room_code = %room.code,
                        "Room code claimed concurrently, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(self.exhausted())
    }

    fn exhausted(&self) -> BattleError {
        tracing::warn!(
            attempts = self.config.code_max_attempts,
            code_space = self.config.code_space().size(),
            "No free room code found"
        );
        BattleError::CodeSpaceExhausted
    }
}
