//! In-Memory Repository Implementation
//!
//! Single-node store for tests and deployments without PostgreSQL. All
//! state sits behind one mutex, so each repository call is one critical
//! section: the same write-time checks the database enforces with
//! constraints happen here under the lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use kernel::id::{ParticipantId, RoomId};

use crate::domain::entity::{answer::AnswerRecord, participant::Participant, room::Room};
use crate::domain::repository::{
    AnswerRepository, ParticipantRepository, ReleasedCodes, RoomRepository,
};
use crate::domain::value_object::{room_code::RoomCode, room_status::RoomStatus};
use crate::error::{BattleError, BattleResult};

#[derive(Default)]
struct MemoryState {
    rooms: HashMap<RoomId, Room>,
    /// Code -> room currently holding it
    live_codes: HashMap<RoomCode, RoomId>,
    participants: HashMap<ParticipantId, Participant>,
    /// Participants per room in join order
    roster: HashMap<RoomId, Vec<ParticipantId>>,
    /// (room, canonical display name)
    names: HashSet<(RoomId, String)>,
    answers: HashMap<(ParticipantId, u32), AnswerRecord>,
}

impl MemoryState {
    fn holds_live_code(&self, room: &Room) -> bool {
        self.live_codes.get(&room.code) == Some(&room.id)
    }
}

/// In-memory battle repository
#[derive(Clone, Default)]
pub struct MemoryBattleRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBattleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BattleResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| BattleError::Internal("memory store lock poisoned".to_string()))
    }
}

// ============================================================================
// Room Repository Implementation
// ============================================================================

impl RoomRepository for MemoryBattleRepository {
    async fn insert_room(&self, room: &Room) -> BattleResult<()> {
        let mut state = self.lock()?;
        if state.live_codes.contains_key(&room.code) {
            return Err(BattleError::CodeTaken);
        }
        state.live_codes.insert(room.code.clone(), room.id);
        state.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn find_room(&self, room_id: RoomId) -> BattleResult<Option<Room>> {
        Ok(self.lock()?.rooms.get(&room_id).cloned())
    }

    async fn find_room_by_code(&self, code: &RoomCode) -> BattleResult<Option<Room>> {
        let state = self.lock()?;
        Ok(state
            .live_codes
            .get(code)
            .and_then(|id| state.rooms.get(id))
            .cloned())
    }

    async fn code_in_use(&self, code: &RoomCode) -> BattleResult<bool> {
        Ok(self.lock()?.live_codes.contains_key(code))
    }

    async fn compare_and_swap(&self, next: &Room, expected_version: i64) -> BattleResult<bool> {
        let mut state = self.lock()?;
        match state.rooms.get_mut(&next.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_expired_codes(
        &self,
        finished_before: DateTime<Utc>,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> BattleResult<ReleasedCodes> {
        let mut state = self.lock()?;
        let state = &mut *state;

        let mut released = Vec::new();
        let mut force_finished = Vec::new();
        for (code, room_id) in &state.live_codes {
            let Some(room) = state.rooms.get_mut(room_id) else {
                released.push(code.clone());
                continue;
            };
            let expired = match room.finished_at {
                Some(finished_at) => finished_at < finished_before,
                None => room.created_at < created_before,
            };
            if !expired {
                continue;
            }
            if !room.status.is_terminal() {
                *room = room.expire(now)?;
                force_finished.push(room.clone());
            }
            released.push(code.clone());
        }

        for code in &released {
            state.live_codes.remove(code);
        }
        Ok(ReleasedCodes {
            released: released.len() as u64,
            force_finished,
        })
    }
}

// ============================================================================
// Participant Repository Implementation
// ============================================================================

impl ParticipantRepository for MemoryBattleRepository {
    async fn admit(&self, participant: &Participant, joinable: &[RoomStatus]) -> BattleResult<()> {
        let mut state = self.lock()?;

        let room = state
            .rooms
            .get(&participant.room_id)
            .filter(|room| state.holds_live_code(room))
            .ok_or(BattleError::RoomNotFound)?;
        if !joinable.contains(&room.status) {
            return Err(BattleError::RoomNotJoinable);
        }
        let seated = state.roster.get(&room.id).map_or(0, Vec::len);
        if seated >= room.max_participants as usize {
            return Err(BattleError::RoomFull);
        }

        let key = (
            participant.room_id,
            participant.display_name.canonical().to_string(),
        );
        if !state.names.insert(key) {
            return Err(BattleError::DuplicateDisplayName);
        }
        state
            .roster
            .entry(participant.room_id)
            .or_default()
            .push(participant.id);
        state.participants.insert(participant.id, participant.clone());
        Ok(())
    }

    async fn find_participant(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> BattleResult<Option<Participant>> {
        Ok(self
            .lock()?
            .participants
            .get(&participant_id)
            .filter(|p| p.room_id == room_id)
            .cloned())
    }

    async fn list_participants(&self, room_id: RoomId) -> BattleResult<Vec<Participant>> {
        let state = self.lock()?;
        Ok(state
            .roster
            .get(&room_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.participants.get(id).cloned())
            .collect())
    }
}

// ============================================================================
// Answer Repository Implementation
// ============================================================================

impl AnswerRepository for MemoryBattleRepository {
    async fn record_answer(&self, answer: &AnswerRecord) -> BattleResult<Participant> {
        let mut state = self.lock()?;

        let room = state
            .rooms
            .get(&answer.room_id)
            .ok_or(BattleError::RoomNotFound)?;
        if room.status != RoomStatus::Active {
            return Err(BattleError::RoomNotActive);
        }
        if room.current_question_index != answer.question_index {
            return Err(BattleError::StaleQuestion {
                submitted: answer.question_index,
                current: room.current_question_index,
            });
        }
        if !state
            .participants
            .get(&answer.participant_id)
            .is_some_and(|p| p.room_id == answer.room_id)
        {
            return Err(BattleError::ParticipantNotFound);
        }

        let key = (answer.participant_id, answer.question_index);
        if state.answers.contains_key(&key) {
            return Err(BattleError::DuplicateAnswer);
        }
        state.answers.insert(key, answer.clone());

        let participant = state
            .participants
            .get_mut(&answer.participant_id)
            .ok_or(BattleError::ParticipantNotFound)?;
        participant.apply_answer(answer.is_correct, answer.points_earned, answer.answered_at);
        Ok(participant.clone())
    }

    async fn find_answer(
        &self,
        participant_id: ParticipantId,
        question_index: u32,
    ) -> BattleResult<Option<AnswerRecord>> {
        Ok(self
            .lock()?
            .answers
            .get(&(participant_id, question_index))
            .cloned())
    }

    async fn list_answers(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> BattleResult<Vec<AnswerRecord>> {
        let state = self.lock()?;
        let mut answers: Vec<AnswerRecord> = state
            .answers
            .values()
            .filter(|a| a.room_id == room_id && a.participant_id == participant_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.question_index);
        Ok(answers)
    }
}
