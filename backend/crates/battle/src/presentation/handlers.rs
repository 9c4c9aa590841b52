//! HTTP Handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use uuid::Uuid;

use kernel::id::{ParticipantId, RoomId};
use platform::bearer::extract_bearer;
use platform::token::{self, TokenPurpose};

use crate::application::{
    BattleConfig, CreateRoomInput, CreateRoomUseCase, JoinRoomInput, JoinRoomUseCase,
    LeaderboardUseCase, LifecycleAction, LifecycleUseCase, QuizSource, ReviewAnswersUseCase,
    RoomInfoUseCase, SubmitAnswerInput, SubmitAnswerUseCase,
};
use crate::domain::catalog::QuizCatalog;
use crate::domain::event::{EventBus, ParticipantState};
use crate::domain::repository::BattleStore;
use crate::error::{BattleError, BattleResult};
use crate::presentation::dto::{
    AnswerReviewResponse, AnswerView, CreateRoomRequest, CreateRoomResponse, JoinRoomRequest,
    JoinRoomResponse, LeaderboardEntry, LeaderboardResponse, RoomView, SubmitAnswerRequest,
    SubmitAnswerResponse,
};

/// Shared state for battle handlers
pub struct BattleAppState<R, C, B>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub catalog: Arc<C>,
    pub bus: Arc<B>,
    pub config: Arc<BattleConfig>,
}

impl<R, C, B> Clone for BattleAppState<R, C, B>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            catalog: self.catalog.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
        }
    }
}

/// Parse a room id path segment; anything else is an unknown room
fn parse_room_id(raw: &str) -> BattleResult<RoomId> {
    Uuid::parse_str(raw)
        .map(RoomId::from_uuid)
        .map_err(|_| BattleError::RoomNotFound)
}

fn parse_participant_id(raw: &str) -> BattleResult<ParticipantId> {
    Uuid::parse_str(raw)
        .map(ParticipantId::from_uuid)
        .map_err(|_| BattleError::ParticipantNotFound)
}

/// Check that the bearer token was issued for `purpose` and `id`
fn authorize(
    config: &BattleConfig,
    headers: &HeaderMap,
    purpose: TokenPurpose,
    id: &Uuid,
) -> BattleResult<()> {
    let bearer = extract_bearer(headers).ok_or(BattleError::Unauthorized)?;
    let granted = token::verify(&config.token_secret, purpose, &bearer)?;
    if &granted != id {
        return Err(BattleError::Forbidden);
    }
    Ok(())
}

// ============================================================================
// Rooms
// ============================================================================

/// POST /api/battle/rooms
pub async fn create_room<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Json(req): Json<CreateRoomRequest>,
) -> BattleResult<(StatusCode, Json<CreateRoomResponse>)>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let quiz = match (req.quiz_id, req.questions) {
        (Some(quiz_id), None) => QuizSource::Catalog(quiz_id),
        (None, Some(questions)) => {
            QuizSource::Inline(questions.into_iter().map(Into::into).collect())
        }
        _ => {
            return Err(BattleError::InvalidConfig(
                "provide either quizId or questions".to_string(),
            ));
        }
    };

    let use_case = CreateRoomUseCase::new(
        state.repo.clone(),
        state.catalog.clone(),
        state.config.clone(),
    );

    let input = CreateRoomInput {
        title: req.title,
        quiz,
        max_participants: req.max_participants,
        question_time_limit_secs: req.question_time_limit,
    };

    let output = use_case.execute(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            room: RoomView::new(&output.room, Some(0)),
            moderator_token: output.moderator_token,
        }),
    ))
}

/// GET /api/battle/rooms/{code}
pub async fn room_info<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(code): Path<String>,
) -> BattleResult<Json<RoomView>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let output = RoomInfoUseCase::new(state.repo.clone())
        .execute(&code)
        .await?;

    Ok(Json(RoomView::new(
        &output.room,
        Some(output.participant_count),
    )))
}

async fn transition<R, C, B>(
    state: BattleAppState<R, C, B>,
    headers: HeaderMap,
    room: String,
    action: LifecycleAction,
) -> BattleResult<Json<RoomView>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let room_id = parse_room_id(&room)?;
    authorize(
        &state.config,
        &headers,
        TokenPurpose::Moderator,
        room_id.as_uuid(),
    )?;

    let use_case = LifecycleUseCase::new(
        state.repo.clone(),
        state.bus.clone(),
        state.config.clone(),
    );
    let room = use_case.execute(room_id, action).await?;

    Ok(Json(RoomView::new(&room, None)))
}

/// POST /api/battle/rooms/{room_id}/start
pub async fn start_room<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(room): Path<String>,
    headers: HeaderMap,
) -> BattleResult<Json<RoomView>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    transition(state, headers, room, LifecycleAction::Start).await
}

/// POST /api/battle/rooms/{room_id}/advance
pub async fn advance_room<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(room): Path<String>,
    headers: HeaderMap,
) -> BattleResult<Json<RoomView>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    transition(state, headers, room, LifecycleAction::Advance).await
}

/// POST /api/battle/rooms/{room_id}/end
pub async fn end_room<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(room): Path<String>,
    headers: HeaderMap,
) -> BattleResult<Json<RoomView>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    transition(state, headers, room, LifecycleAction::End).await
}

// ============================================================================
// Participants
// ============================================================================

/// POST /api/battle/rooms/{code}/join
pub async fn join_room<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(code): Path<String>,
    Json(req): Json<JoinRoomRequest>,
) -> BattleResult<(StatusCode, Json<JoinRoomResponse>)>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let use_case = JoinRoomUseCase::new(
        state.repo.clone(),
        state.bus.clone(),
        state.config.clone(),
    );

    let input = JoinRoomInput {
        code,
        display_name: req.display_name,
        external_user_id: req.external_user_id,
    };

    let output = use_case.execute(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(JoinRoomResponse {
            room: RoomView::new(&output.room, None),
            participant: ParticipantState::from(&output.participant),
            participant_token: output.participant_token,
        }),
    ))
}

/// POST /api/battle/rooms/{room_id}/answers
pub async fn submit_answer<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(room): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SubmitAnswerRequest>,
) -> BattleResult<Json<SubmitAnswerResponse>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let room_id = parse_room_id(&room)?;
    authorize(
        &state.config,
        &headers,
        TokenPurpose::Participant,
        req.participant_id.as_uuid(),
    )?;

    let use_case = SubmitAnswerUseCase::new(
        state.repo.clone(),
        state.bus.clone(),
        state.config.clone(),
    );

    let input = SubmitAnswerInput {
        room_id,
        participant_id: req.participant_id,
        question_index: req.question_index,
        question_id: req.question_id,
        raw_answer: req.answer,
        time_taken_ms: req.time_taken_ms,
    };

    let outcome = use_case.execute(input).await?;
    Ok(Json(SubmitAnswerResponse::from(outcome)))
}

/// GET /api/battle/rooms/{room_id}/participants/{participant_id}/answers
///
/// Open to the participant itself and to the room's moderator.
pub async fn review_answers<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path((room, participant)): Path<(String, String)>,
    headers: HeaderMap,
) -> BattleResult<Json<AnswerReviewResponse>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let room_id = parse_room_id(&room)?;
    let participant_id = parse_participant_id(&participant)?;

    let as_participant = authorize(
        &state.config,
        &headers,
        TokenPurpose::Participant,
        participant_id.as_uuid(),
    );
    if as_participant.is_err() {
        authorize(
            &state.config,
            &headers,
            TokenPurpose::Moderator,
            room_id.as_uuid(),
        )?;
    }

    let output = ReviewAnswersUseCase::new(state.repo.clone())
        .execute(room_id, participant_id)
        .await?;

    Ok(Json(AnswerReviewResponse {
        participant: ParticipantState::from(&output.participant),
        answers: output.answers.into_iter().map(AnswerView::from).collect(),
    }))
}

// ============================================================================
// Leaderboard
// ============================================================================

/// GET /api/battle/rooms/{room_id}/leaderboard
pub async fn leaderboard<R, C, B>(
    State(state): State<BattleAppState<R, C, B>>,
    Path(room): Path<String>,
) -> BattleResult<Json<LeaderboardResponse>>
where
    R: BattleStore,
    C: QuizCatalog + Send + Sync + 'static,
    B: EventBus + Send + Sync + 'static,
{
    let room_id = parse_room_id(&room)?;
    let output = LeaderboardUseCase::new(state.repo.clone())
        .execute(room_id)
        .await?;

    Ok(Json(LeaderboardResponse {
        room_id: output.room.id,
        status: output.room.status,
        entries: output.entries.iter().map(LeaderboardEntry::from).collect(),
    }))
}
