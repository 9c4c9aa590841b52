//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the
//! infrastructure layer.
//!
//! Every race the engine cares about (code collision, capacity, display
//! name uniqueness, duplicate answers, concurrent transitions) is decided
//! inside these write operations, never by a read the caller made earlier.

use chrono::{DateTime, Utc};
use kernel::id::{ParticipantId, RoomId};

use crate::domain::entity::{answer::AnswerRecord, participant::Participant, room::Room};
use crate::domain::value_object::{room_code::RoomCode, room_status::RoomStatus};
use crate::error::BattleResult;

/// Room repository trait
#[trait_variant::make(RoomRepository: Send)]
pub trait LocalRoomRepository {
    /// Insert a new room claiming its code.
    ///
    /// Fails with `CodeTaken` when another live room holds the code.
    async fn insert_room(&self, room: &Room) -> BattleResult<()>;

    /// Find room by ID
    async fn find_room(&self, room_id: RoomId) -> BattleResult<Option<Room>>;

    /// Find the room currently holding a live code
    async fn find_room_by_code(&self, code: &RoomCode) -> BattleResult<Option<Room>>;

    /// Check if a code is held by a live room
    async fn code_in_use(&self, code: &RoomCode) -> BattleResult<bool>;

    /// Replace the stored room with `next` if its version is still
    /// `expected_version`. Returns `false` when another writer got there first.
    async fn compare_and_swap(&self, next: &Room, expected_version: i64) -> BattleResult<bool>;

    /// Release the codes of rooms finished before `finished_before`, and
    /// force-finish and release rooms created before `created_before` that
    /// never finished.
    async fn release_expired_codes(
        &self,
        finished_before: DateTime<Utc>,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> BattleResult<ReleasedCodes>;
}

/// Outcome of a code-release sweep
#[derive(Debug, Default)]
pub struct ReleasedCodes {
    /// Codes freed, including those of force-finished rooms
    pub released: u64,
    /// Rooms the sweep moved to `finished`, as stored afterwards
    pub force_finished: Vec<Room>,
}

/// Participant repository trait
#[trait_variant::make(ParticipantRepository: Send)]
pub trait LocalParticipantRepository {
    /// Admit a participant into its room.
    ///
    /// Status, capacity and display-name uniqueness are all checked at
    /// write time: `RoomNotFound`, `RoomNotJoinable`, `RoomFull`,
    /// `DuplicateDisplayName`.
    async fn admit(&self, participant: &Participant, joinable: &[RoomStatus]) -> BattleResult<()>;

    /// Find participant by ID within a room
    async fn find_participant(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> BattleResult<Option<Participant>>;

    /// All participants of a room, in join order
    async fn list_participants(&self, room_id: RoomId) -> BattleResult<Vec<Participant>>;
}

/// Answer ledger repository trait
#[trait_variant::make(AnswerRepository: Send)]
pub trait LocalAnswerRepository {
    /// Append an answer and fold it into the participant's aggregates,
    /// atomically. Returns the updated participant.
    ///
    /// Room status and cursor are re-checked in the same critical section:
    /// `RoomNotFound`, `RoomNotActive`, `StaleQuestion`,
    /// `ParticipantNotFound`, `DuplicateAnswer`.
    async fn record_answer(&self, answer: &AnswerRecord) -> BattleResult<Participant>;

    /// The ledger entry for one question, if any
    async fn find_answer(
        &self,
        participant_id: ParticipantId,
        question_index: u32,
    ) -> BattleResult<Option<AnswerRecord>>;

    /// A participant's ledger ordered by question index
    async fn list_answers(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> BattleResult<Vec<AnswerRecord>>;
}

/// Everything the battle use cases need from storage
pub trait BattleStore:
    RoomRepository + ParticipantRepository + AnswerRepository + Clone + Send + Sync + 'static
{
}

impl<T> BattleStore for T where
    T: RoomRepository + ParticipantRepository + AnswerRepository + Clone + Send + Sync + 'static
{
}
