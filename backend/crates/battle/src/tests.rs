//! Scenario tests against the in-memory store

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use kernel::id::RoomId;

use crate::application::{
    BattleConfig, CreateRoomInput, CreateRoomUseCase, JoinPolicy, JoinRoomInput,
    JoinRoomUseCase, LeaderboardUseCase, LifecycleAction, LifecycleUseCase, Pacing, QuizSource,
    ReleaseCodesUseCase, ReviewAnswersUseCase, RoomInfoUseCase, RoomRegistry,
    SubmitAnswerInput, SubmitAnswerUseCase, SubmitOutcome,
};
use crate::domain::entity::participant::{Participant, ParticipantStats};
use crate::domain::entity::room::{Room, tests::sample_snapshot};
use crate::domain::event::{BattleEvent, EventBus};
use crate::domain::repository::RoomRepository;
use crate::domain::value_object::question::Question;
use crate::domain::value_object::room_status::RoomStatus;
use crate::error::{BattleError, BattleResult};
use crate::infra::broadcast::BroadcastEventBus;
use crate::infra::catalog::StaticQuizCatalog;
use crate::infra::memory::MemoryBattleRepository;

impl Default for Harness {
    fn default() -> Self {
        Self::new(BattleConfig::with_random_secret())
    }
}

struct Harness {
    repo: Arc<MemoryBattleRepository>,
    bus: Arc<BroadcastEventBus>,
    catalog: Arc<StaticQuizCatalog>,
    config: Arc<BattleConfig>,
}

impl Harness {
    fn new(config: BattleConfig) -> Self {
        Self {
            repo: Arc::new(MemoryBattleRepository::new()),
            bus: Arc::new(BroadcastEventBus::new(config.event_channel_capacity)),
            catalog: Arc::new(StaticQuizCatalog::default()),
            config: Arc::new(config),
        }
    }

    async fn create(&self, questions: usize, max_participants: u32) -> BattleResult<Room> {
        let use_case =
            CreateRoomUseCase::new(self.repo.clone(), self.catalog.clone(), self.config.clone());
        let output = use_case
            .execute(CreateRoomInput {
                title: "Friday battle".to_string(),
                quiz: QuizSource::Inline(sample_snapshot(questions).questions().to_vec()),
                max_participants,
                question_time_limit_secs: 30,
            })
            .await?;
        Ok(output.room)
    }

    async fn join(&self, room: &Room, name: &str) -> BattleResult<Participant> {
        let use_case =
            JoinRoomUseCase::new(self.repo.clone(), self.bus.clone(), self.config.clone());
        let output = use_case
            .execute(JoinRoomInput {
                code: room.code.to_string(),
                display_name: name.to_string(),
                external_user_id: None,
            })
            .await?;
        Ok(output.participant)
    }

    fn lifecycle(&self) -> LifecycleUseCase<MemoryBattleRepository, BroadcastEventBus> {
        LifecycleUseCase::new(self.repo.clone(), self.bus.clone(), self.config.clone())
    }

    async fn act(&self, room_id: RoomId, action: LifecycleAction) -> BattleResult<Room> {
        self.lifecycle().execute(room_id, action).await
    }

    async fn submit(
        &self,
        room: &Room,
        participant: &Participant,
        index: u32,
        answer: &str,
        time_taken_ms: u64,
    ) -> BattleResult<SubmitOutcome> {
        let use_case =
            SubmitAnswerUseCase::new(self.repo.clone(), self.bus.clone(), self.config.clone());
        use_case
            .execute(SubmitAnswerInput {
                room_id: room.id,
                participant_id: participant.id,
                question_index: index,
                question_id: format!("q{index}"),
                raw_answer: answer.to_string(),
                time_taken_ms,
            })
            .await
    }

    async fn room(&self, room_id: RoomId) -> Room {
        self.repo.find_room(room_id).await.unwrap().unwrap()
    }
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_end_to_end_scoring_and_ranking() {
    let h = Harness::default();
    let room = h.create(5, 10).await.unwrap();
    assert_eq!(room.status, RoomStatus::Waiting);

    let fast = h.join(&room, "Fast").await.unwrap();
    let medium = h.join(&room, "Medium").await.unwrap();
    let slow = h.join(&room, "Slow").await.unwrap();

    h.act(room.id, LifecycleAction::Start).await.unwrap();

    let mut points = Vec::new();
    for (participant, time_taken_ms) in [(&slow, 30_000), (&medium, 10_000), (&fast, 0)] {
        let outcome = h
            .submit(&room, participant, 0, "a", time_taken_ms)
            .await
            .unwrap();
        assert!(outcome.is_correct());
        points.push(outcome.points_earned());
    }
    assert_eq!(points, [100, 133, 150]);

    let board = LeaderboardUseCase::new(h.repo.clone())
        .execute(room.id)
        .await
        .unwrap();
    let ranked: Vec<(u32, &str, i64)> = board
        .entries
        .iter()
        .map(|e| {
            (
                e.rank,
                e.participant.display_name.original(),
                e.participant.total_score,
            )
        })
        .collect();
    assert_eq!(
        ranked,
        [(1, "Fast", 150), (2, "Medium", 133), (3, "Slow", 100)]
    );
}

#[tokio::test]
async fn test_incorrect_answer_scores_zero_and_breaks_streak() {
    let h = Harness::default();
    let room = h.create(3, 10).await.unwrap();
    let p = h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    h.submit(&room, &p, 0, "A", 0).await.unwrap();
    h.act(room.id, LifecycleAction::Advance).await.unwrap();
    let wrong = h.submit(&room, &p, 1, "B", 0).await.unwrap();
    assert!(!wrong.is_correct());
    assert_eq!(wrong.points_earned(), 0);

    let SubmitOutcome::Recorded { participant, .. } = wrong else {
        panic!("expected a recorded answer");
    };
    assert_eq!(participant.total_score, 150);
    assert_eq!(participant.current_streak, 0);
    assert_eq!(participant.max_streak, 1);
    assert_eq!(participant.questions_answered, 2);
    assert_eq!(participant.correct_answers, 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_lifecycle_is_monotonic() {
    let h = Harness::default();
    let room = h.create(3, 10).await.unwrap();

    assert!(matches!(
        h.act(room.id, LifecycleAction::Advance).await,
        Err(BattleError::InvalidTransition(_))
    ));
    assert!(matches!(
        h.act(room.id, LifecycleAction::End).await,
        Err(BattleError::InvalidTransition(_))
    ));

    let mut last_index = 0;
    let mut last_version = room.version;
    let mut room = h.act(room.id, LifecycleAction::Start).await.unwrap();
    while room.status == RoomStatus::Active {
        assert!(room.current_question_index >= last_index);
        assert!(room.version > last_version);
        last_index = room.current_question_index;
        last_version = room.version;
        room = h.act(room.id, LifecycleAction::Advance).await.unwrap();
    }

    assert_eq!(room.status, RoomStatus::Finished);
    assert_eq!(room.current_question_index, 2);
    assert!(room.finished_at.is_some());
    for action in [
        LifecycleAction::Start,
        LifecycleAction::Advance,
        LifecycleAction::End,
    ] {
        assert!(h.act(room.id, action).await.is_err());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_advances_move_cursor_once_each() {
    let h = Arc::new(Harness::default());
    let room_id = h.create(50, 10).await.unwrap().id;
    h.act(room_id, LifecycleAction::Start).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            h.act(room_id, LifecycleAction::Advance).await
        }));
    }
    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(BattleError::InvalidTransition(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let stored = h.room(room_id).await;
    assert_eq!(stored.current_question_index, succeeded);
    assert_eq!(stored.version, 1 + i64::from(succeeded));
}

#[tokio::test]
async fn test_end_stops_early() {
    let h = Harness::default();
    let room = h.create(5, 10).await.unwrap();
    let p = h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();
    let ended = h.act(room.id, LifecycleAction::End).await.unwrap();

    assert_eq!(ended.status, RoomStatus::Finished);
    assert_eq!(ended.current_question_index, 0);
    assert!(matches!(
        h.submit(&room, &p, 0, "A", 0).await,
        Err(BattleError::RoomNotActive)
    ));
}

#[tokio::test]
async fn test_create_room_validation() {
    let h = Harness::default();
    assert!(matches!(
        h.create(3, 1).await,
        Err(BattleError::InvalidConfig(_))
    ));
    assert!(matches!(
        h.create(3, 501).await,
        Err(BattleError::InvalidConfig(_))
    ));

    let use_case = CreateRoomUseCase::new(h.repo.clone(), h.catalog.clone(), h.config.clone());
    let zero_limit = use_case
        .execute(CreateRoomInput {
            title: "t".into(),
            quiz: QuizSource::Inline(sample_snapshot(1).questions().to_vec()),
            max_participants: 2,
            question_time_limit_secs: 0,
        })
        .await;
    assert!(matches!(zero_limit, Err(BattleError::InvalidConfig(_))));

    let empty = use_case
        .execute(CreateRoomInput {
            title: "t".into(),
            quiz: QuizSource::Inline(Vec::new()),
            max_participants: 2,
            question_time_limit_secs: 10,
        })
        .await;
    assert!(matches!(empty, Err(BattleError::InvalidConfig(_))));

    let unknown_quiz = use_case
        .execute(CreateRoomInput {
            title: "t".into(),
            quiz: QuizSource::Catalog("missing".into()),
            max_participants: 2,
            question_time_limit_secs: 10,
        })
        .await;
    assert!(matches!(unknown_quiz, Err(BattleError::QuizNotFound(_))));
}

#[tokio::test]
async fn test_catalog_snapshot_is_frozen() {
    let mut h = Harness::default();
    let questions = sample_snapshot(2).questions().to_vec();
    h.catalog = Arc::new(StaticQuizCatalog::new(
        [("quiz-1".to_string(), questions.clone())].into(),
    ));

    let use_case = CreateRoomUseCase::new(h.repo.clone(), h.catalog.clone(), h.config.clone());
    let created = use_case
        .execute(CreateRoomInput {
            title: "From catalog".into(),
            quiz: QuizSource::Catalog("quiz-1".into()),
            max_participants: 4,
            question_time_limit_secs: 20,
        })
        .await
        .unwrap();

    // A catalog edit after creation does not reach the room.
    let mut edited = questions;
    edited[0].correct_answer = "C".into();
    h.catalog = Arc::new(StaticQuizCatalog::new([("quiz-1".to_string(), edited)].into()));

    let stored = h.room(created.room.id).await;
    assert_eq!(stored.quiz_id.as_deref(), Some("quiz-1"));
    assert_eq!(stored.snapshot.get(0).unwrap().correct_answer, "A");
}

// ============================================================================
// Participant directory
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_name_exactly_one_wins() {
    let h = Arc::new(Harness::default());
    let room = h.create(3, 100).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..30 {
        let h = h.clone();
        let room = room.clone();
        let name = if i % 2 == 0 { "alice" } else { " ALICE " };
        tasks.push(tokio::spawn(async move { h.join(&room, name).await }));
    }

    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(BattleError::DuplicateDisplayName) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_exceed_capacity() {
    let h = Arc::new(Harness::default());
    let room = h.create(3, 5).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..25 {
        let h = h.clone();
        let room = room.clone();
        tasks.push(tokio::spawn(
            async move { h.join(&room, &format!("player{i}")).await },
        ));
    }

    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(BattleError::RoomFull) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 5);

    let info = RoomInfoUseCase::new(h.repo.clone())
        .execute(room.code.as_str())
        .await
        .unwrap();
    assert_eq!(info.participant_count, 5);
}

#[tokio::test]
async fn test_join_errors() {
    let h = Harness::default();
    let room = h.create(3, 10).await.unwrap();

    let unknown = Room {
        code: crate::domain::value_object::room_code::RoomCode::parse("0000").unwrap(),
        ..room.clone()
    };
    assert!(matches!(
        h.join(&unknown, "Bob").await,
        Err(BattleError::RoomNotFound)
    ));
    assert!(matches!(
        h.join(&room, "   ").await,
        Err(BattleError::InvalidDisplayName(_))
    ));

    h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();
    assert!(matches!(
        h.join(&room, "Late").await,
        Err(BattleError::RoomNotJoinable)
    ));
}

#[tokio::test]
async fn test_late_join_policy() {
    let h = Harness::new(BattleConfig {
        join_policy: JoinPolicy::AllowLateJoin,
        ..BattleConfig::with_random_secret()
    });
    let room = h.create(2, 10).await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();
    assert!(h.join(&room, "Late").await.is_ok());

    h.act(room.id, LifecycleAction::End).await.unwrap();
    assert!(matches!(
        h.join(&room, "Later").await,
        Err(BattleError::RoomNotJoinable)
    ));
}

// ============================================================================
// Answer intake
// ============================================================================

#[tokio::test]
async fn test_duplicate_submission_is_idempotent() {
    let h = Harness::default();
    let room = h.create(3, 10).await.unwrap();
    let p = h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    let first = h.submit(&room, &p, 0, "A", 15_000).await.unwrap();
    assert!(matches!(first, SubmitOutcome::Recorded { .. }));
    assert_eq!(first.points_earned(), 125);

    let again = h.submit(&room, &p, 0, "B", 0).await.unwrap();
    assert!(matches!(
        again,
        SubmitOutcome::AlreadyAnswered {
            is_correct: true,
            points_earned: 125
        }
    ));

    let board = LeaderboardUseCase::new(h.repo.clone())
        .execute(room.id)
        .await
        .unwrap();
    let stored = &board.entries[0].participant;
    assert_eq!(stored.total_score, 125);
    assert_eq!(stored.questions_answered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_submissions_record_once() {
    let h = Arc::new(Harness::default());
    let room = h.create(3, 10).await.unwrap();
    let p = h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let h = h.clone();
        let room = room.clone();
        let p = p.clone();
        tasks.push(tokio::spawn(async move {
            h.submit(&room, &p, 0, "A", 0).await
        }));
    }

    let mut recorded = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            SubmitOutcome::Recorded { .. } => recorded += 1,
            SubmitOutcome::AlreadyAnswered { points_earned, .. } => {
                assert_eq!(points_earned, 150)
            }
        }
    }
    assert_eq!(recorded, 1);

    let review = ReviewAnswersUseCase::new(h.repo.clone())
        .execute(room.id, p.id)
        .await
        .unwrap();
    assert_eq!(review.answers.len(), 1);
    assert_eq!(review.participant.total_score, 150);
}

#[tokio::test]
async fn test_submission_rejections() {
    let h = Harness::default();
    let room = h.create(3, 10).await.unwrap();
    let p = h.join(&room, "Alice").await.unwrap();

    assert!(matches!(
        h.submit(&room, &p, 0, "A", 0).await,
        Err(BattleError::RoomNotActive)
    ));

    h.act(room.id, LifecycleAction::Start).await.unwrap();
    h.act(room.id, LifecycleAction::Advance).await.unwrap();

    assert!(matches!(
        h.submit(&room, &p, 0, "A", 0).await,
        Err(BattleError::StaleQuestion {
            submitted: 0,
            current: 1
        })
    ));
    assert!(matches!(
        h.submit(&room, &p, 2, "A", 0).await,
        Err(BattleError::StaleQuestion { .. })
    ));

    let use_case = SubmitAnswerUseCase::new(h.repo.clone(), h.bus.clone(), h.config.clone());
    let mismatch = use_case
        .execute(SubmitAnswerInput {
            room_id: room.id,
            participant_id: p.id,
            question_index: 1,
            question_id: "q0".into(),
            raw_answer: "A".into(),
            time_taken_ms: 0,
        })
        .await;
    assert!(matches!(mismatch, Err(BattleError::QuestionMismatch)));

    let stranger = Participant::new(
        room.id,
        crate::domain::value_object::display_name::DisplayName::new("Ghost").unwrap(),
        None,
        Utc::now(),
    );
    assert!(matches!(
        h.submit(&room, &stranger, 1, "A", 0).await,
        Err(BattleError::ParticipantNotFound)
    ));
}

#[tokio::test]
async fn test_aggregates_match_ledger() {
    let h = Harness::default();
    let room = h.create(4, 10).await.unwrap();
    let p = h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    for (index, (answer, time)) in [("A", 1_000), ("a", 29_000), ("B", 0), ("A", 45_000)]
        .into_iter()
        .enumerate()
    {
        h.submit(&room, &p, index as u32, answer, time).await.unwrap();
        h.act(room.id, LifecycleAction::Advance).await.unwrap();
    }
    assert_eq!(h.room(room.id).await.status, RoomStatus::Finished);

    let review = ReviewAnswersUseCase::new(h.repo.clone())
        .execute(room.id, p.id)
        .await
        .unwrap();
    let ledger = ParticipantStats::from_ledger(&review.answers);
    assert_eq!(ledger, review.participant.stats());
    assert_eq!(ledger.questions_answered, review.answers.len() as u32);
    assert!(ledger.correct_answers <= ledger.questions_answered);
    assert_eq!(ledger.correct_answers, 3);
    assert_eq!(ledger.max_streak, 2);
    assert_eq!(ledger.total_score, 148 + 102 + 100);
    assert_eq!(
        review
            .answers
            .iter()
            .map(|a| a.question_index)
            .collect::<Vec<_>>(),
        [0, 1, 2, 3]
    );
}

// ============================================================================
// Leaderboard
// ============================================================================

#[tokio::test]
async fn test_ties_broken_by_join_order() {
    let h = Harness::default();
    let room = h.create(2, 10).await.unwrap();
    let first = h.join(&room, "First").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h.join(&room, "Second").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = h.join(&room, "Third").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    h.submit(&room, &third, 0, "A", 0).await.unwrap();
    h.submit(&room, &second, 0, "A", 0).await.unwrap();
    h.submit(&room, &first, 0, "A", 0).await.unwrap();

    let board = LeaderboardUseCase::new(h.repo.clone())
        .execute(room.id)
        .await
        .unwrap();
    let order: Vec<_> = board.entries.iter().map(|e| e.participant.id).collect();
    assert_eq!(order, [first.id, second.id, third.id]);
    assert!(board.entries.iter().all(|e| e.participant.total_score == 150));
}

// ============================================================================
// Room registry
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creations_get_distinct_codes() {
    let h = Arc::new(Harness::default());
    let mut tasks = Vec::new();
    for _ in 0..64 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move { h.create(1, 2).await }));
    }

    let mut codes = HashSet::new();
    for task in tasks {
        let room = task.await.unwrap().unwrap();
        assert_eq!(room.code.as_str().len(), 4);
        assert!(codes.insert(room.code));
    }
    assert_eq!(codes.len(), 64);
}

#[tokio::test]
async fn test_code_space_exhaustion_and_release() {
    let h = Harness::new(BattleConfig {
        code_min: 1,
        code_max: 3,
        ..BattleConfig::with_random_secret()
    });

    let mut rooms = Vec::new();
    for _ in 0..3 {
        rooms.push(h.create(1, 2).await.unwrap());
    }
    assert!(matches!(
        h.create(1, 2).await,
        Err(BattleError::CodeSpaceExhausted)
    ));
    let registry = RoomRegistry::new(h.repo.clone(), h.config.clone());
    assert!(matches!(
        registry.allocate_code().await,
        Err(BattleError::CodeSpaceExhausted)
    ));

    // Finish one room and let its retention lapse.
    h.act(rooms[0].id, LifecycleAction::Start).await.unwrap();
    h.act(rooms[0].id, LifecycleAction::End).await.unwrap();
    let release = ReleaseCodesUseCase::new(h.repo.clone(), h.bus.clone(), h.config.clone());
    assert_eq!(release.execute(Utc::now()).await.unwrap(), 0);
    let later = Utc::now() + chrono::Duration::hours(25);
    let soon = Utc::now() + chrono::Duration::hours(11);
    assert_eq!(release.execute(soon).await.unwrap(), 0);
    assert_eq!(release.execute(later).await.unwrap(), 3);

    // Abandoned rooms were force-finished; the ended one stays reviewable.
    assert_eq!(h.room(rooms[1].id).await.status, RoomStatus::Finished);
    assert_eq!(h.room(rooms[0].id).await.status, RoomStatus::Finished);

    let reused = h.create(1, 2).await.unwrap();
    assert_eq!(reused.code.as_str().len(), 1);
}

// ============================================================================
// Event bus
// ============================================================================

#[tokio::test]
async fn test_mutations_are_published_to_room_topic() {
    let h = Harness::default();
    let room = h.create(2, 10).await.unwrap();
    let mut events = h.bus.subscribe(&room.code).await;

    let p = h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();
    h.submit(&room, &p, 0, "A", 0).await.unwrap();
    // Idempotent resubmission publishes nothing
    h.submit(&room, &p, 0, "A", 0).await.unwrap();
    h.act(room.id, LifecycleAction::End).await.unwrap();

    let mut received = Vec::new();
    for _ in 0..5 {
        received.push(events.next().await.unwrap());
    }
    let names: Vec<_> = received.iter().map(|e| e.event.name()).collect();
    assert_eq!(
        names,
        [
            "participant_joined",
            "room_status_changed",
            "participant_updated",
            "answer_recorded",
            "room_status_changed",
        ]
    );
    assert!(received.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(received.iter().all(|e| e.topic == room.code.as_str()));

    match &received[2].event {
        BattleEvent::ParticipantUpdated {
            participant,
            version,
        } => {
            assert_eq!(participant.participant_id, p.id);
            assert_eq!(participant.total_score, 150);
            assert_eq!(*version, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match &received[4].event {
        BattleEvent::RoomStatusChanged { room, .. } => {
            assert_eq!(room.status, RoomStatus::Finished)
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

// ============================================================================
// Server pacing
// ============================================================================

fn server_paced() -> BattleConfig {
    BattleConfig {
        pacing: Pacing::Server {
            grace: Duration::from_secs(2),
        },
        ..BattleConfig::with_random_secret()
    }
}

#[tokio::test(start_paused = true)]
async fn test_server_pacing_advances_and_finishes() {
    let h = Harness::new(server_paced());
    let room = h.create(2, 10).await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.room(room.id).await.current_question_index, 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let room_now = h.room(room.id).await;
    assert_eq!(room_now.status, RoomStatus::Active);
    assert_eq!(room_now.current_question_index, 1);

    tokio::time::sleep(Duration::from_secs(32)).await;
    assert_eq!(h.room(room.id).await.status, RoomStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_manual_advance_supersedes_timer() {
    let h = Harness::new(server_paced());
    let room = h.create(3, 10).await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    h.act(room.id, LifecycleAction::Advance).await.unwrap();

    // The first timer fires at 32s, finds the cursor moved and stops.
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(h.room(room.id).await.current_question_index, 1);

    // The timer started by the manual advance fires at 10s + 32s.
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(h.room(room.id).await.current_question_index, 2);
}

#[tokio::test]
async fn test_sweep_publishes_force_finished_rooms() {
    let h = Harness::default();
    let abandoned = h.create(3, 10).await.unwrap();
    let p = h.join(&abandoned, "Alice").await.unwrap();
    h.act(abandoned.id, LifecycleAction::Start).await.unwrap();
    let mut events = h.bus.subscribe(&abandoned.code).await;

    let release = ReleaseCodesUseCase::new(h.repo.clone(), h.bus.clone(), h.config.clone());
    let released = release
        .execute(Utc::now() + chrono::Duration::hours(13))
        .await
        .unwrap();
    assert_eq!(released, 1);

    let envelope = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .expect("force-finish was not published")
        .unwrap();
    match envelope.event {
        BattleEvent::RoomStatusChanged { room, version } => {
            assert_eq!(room.room_id, abandoned.id);
            assert_eq!(room.status, RoomStatus::Finished);
            assert_eq!(version, 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let stored = h.room(abandoned.id).await;
    assert_eq!(stored.status, RoomStatus::Finished);
    assert_eq!(stored.version, 2);
    assert!(matches!(
        h.submit(&abandoned, &p, 0, "A", 0).await,
        Err(BattleError::RoomNotActive)
    ));
}

// ============================================================================
// Quiz validation
// ============================================================================

async fn create_inline(h: &Harness, questions: Vec<Question>) -> BattleResult<Room> {
    let use_case = CreateRoomUseCase::new(h.repo.clone(), h.catalog.clone(), h.config.clone());
    let output = use_case
        .execute(CreateRoomInput {
            title: "Inline".into(),
            quiz: QuizSource::Inline(questions),
            max_participants: 4,
            question_time_limit_secs: 30,
        })
        .await?;
    Ok(output.room)
}

#[tokio::test]
async fn test_unanswerable_questions_are_rejected() {
    let h = Harness::default();
    let base = sample_snapshot(2).questions().to_vec();

    let mut blank_answer = base.clone();
    blank_answer[0].correct_answer = "  ".into();
    let mut blank_id = base.clone();
    blank_id[1].question_id = String::new();
    let mut duplicate_id = base.clone();
    duplicate_id[1].question_id = "q0".into();

    for questions in [blank_answer, blank_id, duplicate_id] {
        assert!(matches!(
            create_inline(&h, questions).await,
            Err(BattleError::InvalidConfig(_))
        ));
    }

    let mut catalog_blank = base;
    catalog_blank[1].correct_answer = String::new();
    let mut h = h;
    h.catalog = Arc::new(StaticQuizCatalog::new(
        [("broken".to_string(), catalog_blank)].into(),
    ));
    let use_case = CreateRoomUseCase::new(h.repo.clone(), h.catalog.clone(), h.config.clone());
    let from_catalog = use_case
        .execute(CreateRoomInput {
            title: "Broken".into(),
            quiz: QuizSource::Catalog("broken".into()),
            max_participants: 4,
            question_time_limit_secs: 30,
        })
        .await;
    assert!(matches!(from_catalog, Err(BattleError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_long_answers_are_graded_in_full() {
    let h = Harness::default();
    let mut questions = sample_snapshot(1).questions().to_vec();
    questions[0].correct_answer = "x".repeat(1500);
    let room = create_inline(&h, questions).await.unwrap();
    let p = h.join(&room, "Alice").await.unwrap();
    h.act(room.id, LifecycleAction::Start).await.unwrap();

    let outcome = h.submit(&room, &p, 0, &"X".repeat(1500), 0).await.unwrap();
    assert!(outcome.is_correct());
    assert_eq!(outcome.points_earned(), 150);

    let review = ReviewAnswersUseCase::new(h.repo.clone())
        .execute(room.id, p.id)
        .await
        .unwrap();
    assert_eq!(review.answers[0].raw_answer.chars().count(), 1024);
    assert!(review.answers[0].is_correct);
}

// ============================================================================
// HTTP surface
// ============================================================================

mod http {
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::application::BattleConfig;
    use crate::infra::broadcast::BroadcastEventBus;
    use crate::infra::catalog::StaticQuizCatalog;
    use crate::infra::memory::MemoryBattleRepository;
    use crate::presentation::router::battle_router_generic;

    fn app() -> Router {
        battle_router_generic(
            MemoryBattleRepository::new(),
            StaticQuizCatalog::default(),
            BroadcastEventBus::new(16),
            BattleConfig::with_random_secret(),
        )
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn create_body() -> Value {
        json!({
            "title": "Capitals",
            "maxParticipants": 4,
            "questionTimeLimit": 20,
            "questions": [
                {
                    "questionId": "q-paris",
                    "type": "multiple_choice",
                    "prompt": "Capital of France?",
                    "correctAnswer": "Paris",
                    "options": ["Paris", "Lyon"]
                },
                {
                    "questionId": "q-rome",
                    "type": "short_answer",
                    "correctAnswer": "Rome"
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_battle_over_http() {
        let app = app();

        let (status, created) = call(&app, Method::POST, "/rooms", None, Some(create_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let room_id = created["room"]["roomId"].as_str().unwrap().to_string();
        let code = created["room"]["code"].as_str().unwrap().to_string();
        let moderator = created["moderatorToken"].as_str().unwrap().to_string();
        assert_eq!(created["room"]["status"], "waiting");
        assert!(created["room"]["currentQuestion"].is_null());

        let (status, info) = call(&app, Method::GET, &format!("/rooms/{code}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["participantCount"], 0);

        let (status, joined) = call(
            &app,
            Method::POST,
            &format!("/rooms/{code}/join"),
            None,
            Some(json!({ "displayName": "Alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let participant_id = joined["participant"]["participantId"]
            .as_str()
            .unwrap()
            .to_string();
        let player = joined["participantToken"].as_str().unwrap().to_string();

        let (status, started) = call(
            &app,
            Method::POST,
            &format!("/rooms/{room_id}/start"),
            Some(&moderator),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["status"], "active");
        assert_eq!(started["currentQuestion"]["questionId"], "q-paris");
        assert!(started["currentQuestion"].get("correctAnswer").is_none());

        let submit = json!({
            "participantId": participant_id,
            "questionIndex": 0,
            "questionId": "q-paris",
            "answer": " paris ",
            "timeTakenMs": 0
        });
        let answers_uri = format!("/rooms/{room_id}/answers");
        let (status, recorded) =
            call(&app, Method::POST, &answers_uri, Some(&player), Some(submit.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recorded["status"], "recorded");
        assert_eq!(recorded["isCorrect"], true);
        assert_eq!(recorded["pointsEarned"], 150);

        let (status, again) =
            call(&app, Method::POST, &answers_uri, Some(&player), Some(submit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["status"], "already_answered");
        assert_eq!(again["pointsEarned"], 150);

        let (status, board) = call(
            &app,
            Method::GET,
            &format!("/rooms/{room_id}/leaderboard"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board["entries"][0]["rank"], 1);
        assert_eq!(board["entries"][0]["displayName"], "Alice");
        assert_eq!(board["entries"][0]["totalScore"], 150);

        let (status, review) = call(
            &app,
            Method::GET,
            &format!("/rooms/{room_id}/participants/{participant_id}/answers"),
            Some(&player),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(review["answers"][0]["answer"], " paris ");
    }

    #[tokio::test]
    async fn test_moderator_routes_require_token() {
        let app = app();
        let (_, created) = call(&app, Method::POST, "/rooms", None, Some(create_body())).await;
        let room_id = created["room"]["roomId"].as_str().unwrap().to_string();
        let start = format!("/rooms/{room_id}/start");

        let (status, problem) = call(&app, Method::POST, &start, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(problem["status"], 401);

        let (_, other) = call(&app, Method::POST, "/rooms", None, Some(create_body())).await;
        let foreign = other["moderatorToken"].as_str().unwrap();
        let (status, _) = call(&app, Method::POST, &start, Some(foreign), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::POST, &start, Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_http_errors() {
        let app = app();

        let (status, _) = call(
            &app,
            Method::POST,
            "/rooms/9999/join",
            None,
            Some(json!({ "displayName": "Bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            Method::GET,
            "/rooms/not-a-uuid/leaderboard",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let mut both = create_body();
        both["quizId"] = json!("quiz-1");
        let (status, _) = call(&app, Method::POST, "/rooms", None, Some(both)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    // ------------------------------------------------------------------------
    // Event subscription
    // ------------------------------------------------------------------------

    mod events {
        use std::sync::Arc;
        use std::time::Duration;

        use futures::StreamExt;
        use serde_json::Value;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        use crate::application::{
            BattleConfig, CreateRoomInput, CreateRoomUseCase, JoinRoomInput, JoinRoomUseCase,
            LifecycleAction, LifecycleUseCase, QuizSource,
        };
        use crate::domain::entity::room::{Room, tests::sample_snapshot};
        use crate::domain::event::BattleEvent;
        use crate::error::BattleError;
        use crate::infra::broadcast::BroadcastEventBus;
        use crate::infra::catalog::StaticQuizCatalog;
        use crate::infra::memory::MemoryBattleRepository;
        use crate::presentation::handlers::BattleAppState;
        use crate::presentation::router::battle_router_generic;
        use crate::presentation::ws::subscribe_with_snapshot;

        type State = BattleAppState<MemoryBattleRepository, StaticQuizCatalog, BroadcastEventBus>;

        fn state() -> State {
            let config = BattleConfig::with_random_secret();
            BattleAppState {
                repo: Arc::new(MemoryBattleRepository::new()),
                catalog: Arc::new(StaticQuizCatalog::default()),
                bus: Arc::new(BroadcastEventBus::new(config.event_channel_capacity)),
                config: Arc::new(config),
            }
        }

        async fn room_with_player(state: &State) -> Room {
            let room = CreateRoomUseCase::new(
                state.repo.clone(),
                state.catalog.clone(),
                state.config.clone(),
            )
            .execute(CreateRoomInput {
                title: "Live".into(),
                quiz: QuizSource::Inline(sample_snapshot(2).questions().to_vec()),
                max_participants: 4,
                question_time_limit_secs: 30,
            })
            .await
            .unwrap()
            .room;
            JoinRoomUseCase::new(state.repo.clone(), state.bus.clone(), state.config.clone())
                .execute(JoinRoomInput {
                    code: room.code.to_string(),
                    display_name: "Alice".into(),
                    external_user_id: None,
                })
                .await
                .unwrap();
            room
        }

        #[tokio::test]
        async fn test_snapshot_then_events() {
            let state = state();
            let room = room_with_player(&state).await;

            let (snapshot, mut events) =
                subscribe_with_snapshot(&state, room.code.as_str()).await.unwrap();
            let frame = serde_json::to_value(&snapshot).unwrap();
            assert_eq!(frame["type"], "snapshot");
            assert_eq!(frame["room"]["code"], room.code.as_str());
            assert_eq!(frame["room"]["status"], "waiting");
            assert_eq!(frame["room"]["participantCount"], 1);
            assert_eq!(frame["leaderboard"][0]["rank"], 1);
            assert_eq!(frame["leaderboard"][0]["displayName"], "Alice");
            assert_eq!(frame["leaderboard"][0]["totalScore"], 0);

            LifecycleUseCase::new(state.repo.clone(), state.bus.clone(), state.config.clone())
                .execute(room.id, LifecycleAction::Start)
                .await
                .unwrap();
            let envelope = tokio::time::timeout(Duration::from_secs(1), events.next())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(
                envelope.event,
                BattleEvent::RoomStatusChanged { version: 1, .. }
            ));
        }

        #[tokio::test]
        async fn test_snapshot_for_unknown_code() {
            let state = state();
            for code in ["0000", "not-a-code"] {
                let Err(err) = subscribe_with_snapshot(&state, code).await else {
                    panic!("subscribed to {code}");
                };
                assert!(matches!(err, BattleError::RoomNotFound));
                assert_eq!(err.status_code().as_u16(), 404);
            }
        }

        async fn serve(state: &State) -> std::net::SocketAddr {
            let app = battle_router_generic(
                (*state.repo).clone(),
                (*state.catalog).clone(),
                (*state.bus).clone(),
                (*state.config).clone(),
            );
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await });
            addr
        }

        async fn upgrade(addr: std::net::SocketAddr, code: &str) -> (TcpStream, String, Vec<u8>) {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let request = format!(
                "GET /rooms/{code}/events HTTP/1.1\r\n\
                 Host: {addr}\r\n\
                 Connection: Upgrade\r\n\
                 Upgrade: websocket\r\n\
                 Sec-WebSocket-Version: 13\r\n\
                 Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
            );
            stream.write_all(request.as_bytes()).await.unwrap();

            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the response head");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let rest = buf.split_off(end + 4);
                    return (stream, String::from_utf8(buf).unwrap(), rest);
                }
            }
        }

        /// Read one unmasked server text frame
        async fn read_text_frame(stream: &mut TcpStream, mut buf: Vec<u8>) -> String {
            async fn fill(stream: &mut TcpStream, buf: &mut Vec<u8>, len: usize) {
                let mut chunk = [0u8; 4096];
                while buf.len() < len {
                    let n = stream.read(&mut chunk).await.unwrap();
                    assert!(n > 0, "connection closed inside a frame");
                    buf.extend_from_slice(&chunk[..n]);
                }
            }

            fill(stream, &mut buf, 2).await;
            assert_eq!(buf[0], 0x81, "expected a final text frame");
            let (len, offset) = match buf[1] & 0x7f {
                126 => {
                    fill(stream, &mut buf, 4).await;
                    (usize::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
                }
                127 => {
                    fill(stream, &mut buf, 10).await;
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&buf[2..10]);
                    (u64::from_be_bytes(raw) as usize, 10)
                }
                short => (usize::from(short), 2),
            };
            fill(stream, &mut buf, offset + len).await;
            String::from_utf8(buf[offset..offset + len].to_vec()).unwrap()
        }

        #[tokio::test]
        async fn test_events_route_over_socket() {
            let state = state();
            let room = room_with_player(&state).await;
            let addr = serve(&state).await;

            let (_, head, _) = upgrade(addr, "0000").await;
            assert!(head.starts_with("HTTP/1.1 404"), "{head}");

            let (mut stream, head, rest) = upgrade(addr, room.code.as_str()).await;
            assert!(head.starts_with("HTTP/1.1 101"), "{head}");
            let text = read_text_frame(&mut stream, rest).await;
            let frame: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(frame["type"], "snapshot");
            assert_eq!(frame["room"]["roomId"], room.id.to_string());
            assert_eq!(frame["leaderboard"][0]["displayName"], "Alice");
        }
    }
}
