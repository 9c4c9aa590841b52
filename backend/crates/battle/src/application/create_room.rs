//! Create Room Use Case
//!
//! Freezes a quiz snapshot into a new `waiting` room and hands back a
//! moderator token for it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use platform::token::{self, TokenPurpose};

use crate::application::config::BattleConfig;
use crate::application::registry::RoomRegistry;
use crate::domain::catalog::QuizCatalog;
use crate::domain::entity::room::{NewRoom, Room};
use crate::domain::repository::RoomRepository;
use crate::domain::value_object::question::{Question, QuizSnapshot};
use crate::error::{BattleError, BattleResult};

/// Minimum number of participants a room must allow
pub const MIN_PARTICIPANTS: u32 = 2;

/// Maximum title length (in characters)
pub const TITLE_MAX_LENGTH: usize = 120;

/// Where the questions come from
#[derive(Debug, Clone)]
pub enum QuizSource {
    /// Fetched once from the quiz catalog
    Catalog(String),
    /// Supplied by the caller
    Inline(Vec<Question>),
}

/// Create room input
pub struct CreateRoomInput {
    pub title: String,
    pub quiz: QuizSource,
    pub max_participants: u32,
    pub question_time_limit_secs: u32,
}

/// Create room output
pub struct CreateRoomOutput {
    pub room: Room,
    pub moderator_token: String,
}

/// Create room use case
pub struct CreateRoomUseCase<R, C>
where
    R: RoomRepository,
    C: QuizCatalog,
{
    repo: Arc<R>,
    catalog: Arc<C>,
    config: Arc<BattleConfig>,
}

impl<R, C> CreateRoomUseCase<R, C>
where
    R: RoomRepository,
    C: QuizCatalog,
{
    pub fn new(repo: Arc<R>, catalog: Arc<C>, config: Arc<BattleConfig>) -> Self {
        Self {
            repo,
            catalog,
            config,
        }
    }

    pub async fn execute(&self, input: CreateRoomInput) -> BattleResult<CreateRoomOutput> {
        let title = input.title.trim().to_string();
        self.validate(&title, input.max_participants, input.question_time_limit_secs)?;

        let (quiz_id, questions) = match input.quiz {
            QuizSource::Catalog(quiz_id) => {
                let questions = self.catalog.fetch_quiz(&quiz_id).await?;
                (Some(quiz_id), questions)
            }
            QuizSource::Inline(questions) => (None, questions),
        };
        validate_questions(&questions)?;
        let snapshot = QuizSnapshot::new(questions)
            .ok_or_else(|| BattleError::InvalidConfig("quiz has no questions".to_string()))?;

        let draft = NewRoom {
            title,
            quiz_id,
            snapshot,
            max_participants: input.max_participants,
            question_time_limit_secs: input.question_time_limit_secs,
        };

        let registry = RoomRegistry::new(self.repo.clone(), self.config.clone());
        let room = registry.register(draft, Utc::now()).await?;

        tracing::info!(
            room_id = %room.id,
            room_code = %room.code,
            questions = room.snapshot.len(),
            max_participants = room.max_participants,
            "Room created"
        );

        let moderator_token = token::issue(
            &self.config.token_secret,
            TokenPurpose::Moderator,
            room.id.as_uuid(),
        );

        Ok(CreateRoomOutput {
            room,
            moderator_token,
        })
    }

    fn validate(
        &self,
        title: &str,
        max_participants: u32,
        time_limit_secs: u32,
    ) -> BattleResult<()> {
        if title.is_empty() {
            return Err(BattleError::InvalidConfig("title must not be empty".to_string()));
        }
        if title.chars().count() > TITLE_MAX_LENGTH {
            return Err(BattleError::InvalidConfig(format!(
                "title must be at most {TITLE_MAX_LENGTH} characters"
            )));
        }
        if max_participants < MIN_PARTICIPANTS
            || max_participants > self.config.max_participants_limit
        {
            return Err(BattleError::InvalidConfig(format!(
                "max participants must be between {MIN_PARTICIPANTS} and {}",
                self.config.max_participants_limit
            )));
        }
        if time_limit_secs < 1 || time_limit_secs > self.config.max_question_time_limit_secs {
            return Err(BattleError::InvalidConfig(format!(
                "question time limit must be between 1 and {} seconds",
                self.config.max_question_time_limit_secs
            )));
        }
        Ok(())
    }
}

/// Reject questions that could never be graded sensibly
fn validate_questions(questions: &[Question]) -> BattleResult<()> {
    let mut seen = HashSet::new();
    for (index, question) in questions.iter().enumerate() {
        let question_id = question.question_id.trim();
        if question_id.is_empty() {
            return Err(BattleError::InvalidConfig(format!(
                "question {index} has an empty question id"
            )));
        }
        if !seen.insert(question_id) {
            return Err(BattleError::InvalidConfig(format!(
                "duplicate question id {question_id}"
            )));
        }
        // "A,B" style answers need at least one non-empty token
        if !question
            .correct_answer
            .split(',')
            .any(|token| !token.trim().is_empty())
        {
            return Err(BattleError::InvalidConfig(format!(
                "question {question_id} has no correct answer"
            )));
        }
    }
    Ok(())
}
