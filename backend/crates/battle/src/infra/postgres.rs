//! PostgreSQL Repository Implementations
//!
//! Concurrency decisions are pushed into constraints and row locks:
//! - room insert claims its code through the `battle_rooms_live_code` index
//! - joins bump `participant_count` under the `battle_rooms_capacity` CHECK,
//!   filtered by admissible status, then insert under the per-room unique
//!   name constraint, in one transaction
//! - answers take a shared lock on the room row (blocking a concurrent
//!   transition), lock the participant row, and insert with
//!   `ON CONFLICT DO NOTHING`

use chrono::{DateTime, Utc};
use kernel::id::{AnswerId, ParticipantId, RoomId};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{answer::AnswerRecord, participant::Participant, room::Room};
use crate::domain::repository::{
    AnswerRepository, ParticipantRepository, ReleasedCodes, RoomRepository,
};
use crate::domain::value_object::{
    display_name::DisplayName, question::QuizSnapshot, room_code::RoomCode,
    room_status::RoomStatus,
};
use crate::error::{BattleError, BattleResult};

const LIVE_CODE_CONSTRAINT: &str = "battle_rooms_live_code";
const CAPACITY_CONSTRAINT: &str = "battle_rooms_capacity";
const UNIQUE_NAME_CONSTRAINT: &str = "battle_participants_unique_name";

const ROOM_COLUMNS: &str = r#"
    room_id,
    room_code,
    title,
    quiz_id,
    quiz_snapshot,
    status,
    max_participants,
    current_question_index,
    question_time_limit_secs,
    version,
    created_at,
    started_at,
    finished_at,
    question_started_at
"#;

const PARTICIPANT_COLUMNS: &str = r#"
    participant_id,
    room_id,
    external_user_id,
    display_name,
    display_name_canonical,
    total_score,
    current_streak,
    max_streak,
    questions_answered,
    correct_answers,
    joined_at,
    last_activity
"#;

const ANSWER_COLUMNS: &str = r#"
    answer_id,
    room_id,
    participant_id,
    question_index,
    question_id,
    raw_answer,
    is_correct,
    points_earned,
    time_taken_ms,
    answered_at
"#;

/// PostgreSQL-backed battle repository
#[derive(Clone)]
pub struct PgBattleRepository {
    pool: PgPool,
}

impl PgBattleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> BattleResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }
}

/// Name of the constraint a database error violated, if any
fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

// ============================================================================
// Room Repository Implementation
// ============================================================================

impl RoomRepository for PgBattleRepository {
    async fn insert_room(&self, room: &Room) -> BattleResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO battle_rooms (
                room_id,
                room_code,
                title,
                quiz_id,
                quiz_snapshot,
                status,
                max_participants,
                current_question_index,
                question_time_limit_secs,
                version,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(room.id.as_uuid())
        .bind(room.code.as_str())
        .bind(&room.title)
        .bind(room.quiz_id.as_deref())
        .bind(Json(&room.snapshot))
        .bind(room.status.id())
        .bind(room.max_participants as i32)
        .bind(room.current_question_index as i32)
        .bind(room.question_time_limit_secs as i32)
        .bind(room.version)
        .bind(room.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if violated_constraint(&e) == Some(LIVE_CODE_CONSTRAINT) => {
                Err(BattleError::CodeTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_room(&self, room_id: RoomId) -> BattleResult<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM battle_rooms WHERE room_id = $1"
        ))
        .bind(room_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoomRow::into_room).transpose()
    }

    async fn find_room_by_code(&self, code: &RoomCode) -> BattleResult<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {ROOM_COLUMNS} FROM battle_rooms WHERE room_code = $1 AND code_active"
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoomRow::into_room).transpose()
    }

    async fn code_in_use(&self, code: &RoomCode) -> BattleResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM battle_rooms WHERE room_code = $1 AND code_active)",
        )
        .bind(code.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn compare_and_swap(&self, next: &Room, expected_version: i64) -> BattleResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE battle_rooms SET
                status = $3,
                current_question_index = $4,
                version = $5,
                started_at = $6,
                finished_at = $7,
                question_started_at = $8
            WHERE room_id = $1 AND version = $2
            "#,
        )
        .bind(next.id.as_uuid())
        .bind(expected_version)
        .bind(next.status.id())
        .bind(next.current_question_index as i32)
        .bind(next.version)
        .bind(next.started_at)
        .bind(next.finished_at)
        .bind(next.question_started_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn release_expired_codes(
        &self,
        finished_before: DateTime<Utc>,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> BattleResult<ReleasedCodes> {
        let mut tx = self.begin().await?;

        let abandoned = sqlx::query_as::<_, RoomRow>(&format!(
            r#"
            UPDATE battle_rooms SET
                status = $3,
                finished_at = $2,
                question_started_at = NULL,
                version = version + 1,
                code_active = FALSE,
                code_released_at = $2
            WHERE code_active AND status <> $3 AND created_at < $1
            RETURNING {ROOM_COLUMNS}
            "#
        ))
        .bind(created_before)
        .bind(now)
        .bind(RoomStatus::Finished.id())
        .fetch_all(&mut *tx)
        .await?;

        let finished = sqlx::query(
            r#"
            UPDATE battle_rooms SET
                code_active = FALSE,
                code_released_at = $2
            WHERE code_active AND status = $3 AND finished_at < $1
            "#,
        )
        .bind(finished_before)
        .bind(now)
        .bind(RoomStatus::Finished.id())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        let force_finished = abandoned
            .into_iter()
            .map(RoomRow::into_room)
            .collect::<BattleResult<Vec<Room>>>()?;
        if !force_finished.is_empty() {
            tracing::info!(rooms = force_finished.len(), "Force-finished abandoned rooms");
        }

        Ok(ReleasedCodes {
            released: force_finished.len() as u64 + finished,
            force_finished,
        })
    }
}

// ============================================================================
// Participant Repository Implementation
// ============================================================================

impl ParticipantRepository for PgBattleRepository {
    async fn admit(&self, participant: &Participant, joinable: &[RoomStatus]) -> BattleResult<()> {
        let statuses: Vec<i16> = joinable.iter().map(RoomStatus::id).collect();
        let mut tx = self.begin().await?;

        let seat = sqlx::query(
            r#"
            UPDATE battle_rooms SET participant_count = participant_count + 1
            WHERE room_id = $1 AND code_active AND status = ANY($2)
            "#,
        )
        .bind(participant.room_id.as_uuid())
        .bind(&statuses)
        .execute(&mut *tx)
        .await;

        match seat {
            Ok(result) if result.rows_affected() == 1 => {}
            Ok(_) => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM battle_rooms WHERE room_id = $1 AND code_active)",
                )
                .bind(participant.room_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
                return Err(if exists {
                    BattleError::RoomNotJoinable
                } else {
                    BattleError::RoomNotFound
                });
            }
            Err(e) if violated_constraint(&e) == Some(CAPACITY_CONSTRAINT) => {
                return Err(BattleError::RoomFull);
            }
            Err(e) => return Err(e.into()),
        }

        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO battle_participants ({PARTICIPANT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#
        ))
        .bind(participant.id.as_uuid())
        .bind(participant.room_id.as_uuid())
        .bind(participant.external_user_id.as_deref())
        .bind(participant.display_name.original())
        .bind(participant.display_name.canonical())
        .bind(participant.total_score)
        .bind(participant.current_streak as i32)
        .bind(participant.max_streak as i32)
        .bind(participant.questions_answered as i32)
        .bind(participant.correct_answers as i32)
        .bind(participant.joined_at)
        .bind(participant.last_activity)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if violated_constraint(&e) == Some(UNIQUE_NAME_CONSTRAINT) => {
                return Err(BattleError::DuplicateDisplayName);
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_participant(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> BattleResult<Option<Participant>> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS} FROM battle_participants
            WHERE participant_id = $1 AND room_id = $2
            "#
        ))
        .bind(participant_id.as_uuid())
        .bind(room_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ParticipantRow::into_participant))
    }

    async fn list_participants(&self, room_id: RoomId) -> BattleResult<Vec<Participant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS} FROM battle_participants
            WHERE room_id = $1
            ORDER BY joined_at, participant_id
            "#
        ))
        .bind(room_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ParticipantRow::into_participant).collect())
    }
}

// ============================================================================
// Answer Repository Implementation
// ============================================================================

impl AnswerRepository for PgBattleRepository {
    async fn record_answer(&self, answer: &AnswerRecord) -> BattleResult<Participant> {
        let mut tx = self.begin().await?;

        // Shared lock: transitions wait until this answer is committed.
        let cursor = sqlx::query_as::<_, (i16, i32)>(
            "SELECT status, current_question_index FROM battle_rooms WHERE room_id = $1 FOR SHARE",
        )
        .bind(answer.room_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BattleError::RoomNotFound)?;

        if RoomStatus::from_id(cursor.0) != Some(RoomStatus::Active) {
            return Err(BattleError::RoomNotActive);
        }
        let current = cursor.1 as u32;
        if current != answer.question_index {
            return Err(BattleError::StaleQuestion {
                submitted: answer.question_index,
                current,
            });
        }

        let mut participant = sqlx::query_as::<_, ParticipantRow>(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS} FROM battle_participants
            WHERE participant_id = $1 AND room_id = $2
            FOR UPDATE
            "#
        ))
        .bind(answer.participant_id.as_uuid())
        .bind(answer.room_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .map(ParticipantRow::into_participant)
        .ok_or(BattleError::ParticipantNotFound)?;

        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO battle_answers ({ANSWER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (participant_id, question_index) DO NOTHING
            "#
        ))
        .bind(answer.id.as_uuid())
        .bind(answer.room_id.as_uuid())
        .bind(answer.participant_id.as_uuid())
        .bind(answer.question_index as i32)
        .bind(&answer.question_id)
        .bind(&answer.raw_answer)
        .bind(answer.is_correct)
        .bind(answer.points_earned as i32)
        .bind(answer.time_taken_ms.min(i64::MAX as u64) as i64)
        .bind(answer.answered_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(BattleError::DuplicateAnswer);
        }

        participant.apply_answer(answer.is_correct, answer.points_earned, answer.answered_at);

        sqlx::query(
            r#"
            UPDATE battle_participants SET
                total_score = $2,
                current_streak = $3,
                max_streak = $4,
                questions_answered = $5,
                correct_answers = $6,
                last_activity = $7
            WHERE participant_id = $1
            "#,
        )
        .bind(participant.id.as_uuid())
        .bind(participant.total_score)
        .bind(participant.current_streak as i32)
        .bind(participant.max_streak as i32)
        .bind(participant.questions_answered as i32)
        .bind(participant.correct_answers as i32)
        .bind(participant.last_activity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(participant)
    }

    async fn find_answer(
        &self,
        participant_id: ParticipantId,
        question_index: u32,
    ) -> BattleResult<Option<AnswerRecord>> {
        let row = sqlx::query_as::<_, AnswerRow>(&format!(
            r#"
            SELECT {ANSWER_COLUMNS} FROM battle_answers
            WHERE participant_id = $1 AND question_index = $2
            "#
        ))
        .bind(participant_id.as_uuid())
        .bind(question_index as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AnswerRow::into_answer))
    }

    async fn list_answers(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> BattleResult<Vec<AnswerRecord>> {
        let rows = sqlx::query_as::<_, AnswerRow>(&format!(
            r#"
            SELECT {ANSWER_COLUMNS} FROM battle_answers
            WHERE room_id = $1 AND participant_id = $2
            ORDER BY question_index
            "#
        ))
        .bind(room_id.as_uuid())
        .bind(participant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AnswerRow::into_answer).collect())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct RoomRow {
    room_id: Uuid,
    room_code: String,
    title: String,
    quiz_id: Option<String>,
    quiz_snapshot: Json<QuizSnapshot>,
    status: i16,
    max_participants: i32,
    current_question_index: i32,
    question_time_limit_secs: i32,
    version: i64,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    question_started_at: Option<DateTime<Utc>>,
}

impl RoomRow {
    fn into_room(self) -> BattleResult<Room> {
        let status = RoomStatus::from_id(self.status)
            .ok_or_else(|| BattleError::Internal(format!("Invalid room status: {}", self.status)))?;

        Ok(Room {
            id: RoomId::from_uuid(self.room_id),
            code: RoomCode::from_trusted(self.room_code),
            title: self.title,
            quiz_id: self.quiz_id,
            snapshot: self.quiz_snapshot.0,
            status,
            max_participants: self.max_participants as u32,
            current_question_index: self.current_question_index as u32,
            question_time_limit_secs: self.question_time_limit_secs as u32,
            version: self.version,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            question_started_at: self.question_started_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    participant_id: Uuid,
    room_id: Uuid,
    external_user_id: Option<String>,
    display_name: String,
    display_name_canonical: String,
    total_score: i64,
    current_streak: i32,
    max_streak: i32,
    questions_answered: i32,
    correct_answers: i32,
    joined_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl ParticipantRow {
    fn into_participant(self) -> Participant {
        Participant {
            id: ParticipantId::from_uuid(self.participant_id),
            room_id: RoomId::from_uuid(self.room_id),
            external_user_id: self.external_user_id,
            display_name: DisplayName::from_db(self.display_name, self.display_name_canonical),
            total_score: self.total_score,
            current_streak: self.current_streak as u32,
            max_streak: self.max_streak as u32,
            questions_answered: self.questions_answered as u32,
            correct_answers: self.correct_answers as u32,
            joined_at: self.joined_at,
            last_activity: self.last_activity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    answer_id: Uuid,
    room_id: Uuid,
    participant_id: Uuid,
    question_index: i32,
    question_id: String,
    raw_answer: String,
    is_correct: bool,
    points_earned: i32,
    time_taken_ms: i64,
    answered_at: DateTime<Utc>,
}

impl AnswerRow {
    fn into_answer(self) -> AnswerRecord {
        AnswerRecord {
            id: AnswerId::from_uuid(self.answer_id),
            room_id: RoomId::from_uuid(self.room_id),
            participant_id: ParticipantId::from_uuid(self.participant_id),
            question_index: self.question_index as u32,
            question_id: self.question_id,
            raw_answer: self.raw_answer,
            is_correct: self.is_correct,
            points_earned: self.points_earned as u32,
            time_taken_ms: self.time_taken_ms as u64,
            answered_at: self.answered_at,
        }
    }
}
