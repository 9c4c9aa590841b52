//! Quiz Catalog
//!
//! External source of quiz content. Read once per room at creation time.

use crate::domain::value_object::question::Question;
use crate::error::BattleResult;

#[trait_variant::make(QuizCatalog: Send)]
pub trait LocalQuizCatalog {
    /// Ordered question list for a quiz.
    ///
    /// Fails with `QuizNotFound` for unknown ids and `Catalog` when the
    /// catalog cannot be reached or returns garbage.
    async fn fetch_quiz(&self, quiz_id: &str) -> BattleResult<Vec<Question>>;
}
