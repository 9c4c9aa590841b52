//! Question Value Objects
//!
//! Questions as delivered by the quiz catalog and frozen into a room at
//! creation time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
    ShortAnswer,
    /// Any type this engine does not know; still graded by string equality
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Ordered question list copied into a room when it is created.
///
/// Later edits to the source quiz never reach an existing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizSnapshot(Vec<Question>);

impl QuizSnapshot {
    /// Returns `None` for an empty list; a room needs at least one question
    pub fn new(questions: Vec<Question>) -> Option<Self> {
        (!questions.is_empty()).then_some(Self(questions))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the final question
    pub fn last_index(&self) -> u32 {
        self.0.len().saturating_sub(1) as u32
    }

    pub fn get(&self, index: u32) -> Option<&Question> {
        self.0.get(index as usize)
    }

    pub fn questions(&self) -> &[Question] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_wire_format() {
        let q: Question = serde_json::from_str(
            r#"{
                "question_id": "q1",
                "type": "multiple_choice",
                "correct_answer": "B",
                "options": ["A", "B"]
            }"#,
        )
        .unwrap();
        assert_eq!(q.question_type, QuestionType::MultipleChoice);
        assert_eq!(q.options.as_deref().map(<[String]>::len), Some(2));
        assert!(q.prompt.is_none());
    }

    #[test]
    fn test_unknown_type_is_other() {
        let q: Question = serde_json::from_str(
            r#"{"question_id":"q1","type":"drag_and_drop","correct_answer":"x"}"#,
        )
        .unwrap();
        assert_eq!(q.question_type, QuestionType::Other);
    }

    #[test]
    fn test_snapshot_rejects_empty() {
        assert!(QuizSnapshot::new(Vec::new()).is_none());
    }

    #[test]
    fn test_snapshot_indexing() {
        let q = Question {
            question_id: "q".into(),
            question_type: QuestionType::TrueFalse,
            prompt: None,
            correct_answer: "true".into(),
            options: None,
        };
        let snap = QuizSnapshot::new(vec![q.clone(), q]).unwrap();
        assert_eq!(snap.last_index(), 1);
        assert!(snap.get(1).is_some());
        assert!(snap.get(2).is_none());
    }
}
