//! Answer Grading
//!
//! String-equality oracle: case-insensitive and whitespace-trimmed. A
//! correct answer containing commas ("A,B") is multi-valued and compared
//! as an unordered set of tokens.

use std::collections::BTreeSet;

const MULTI_VALUE_SEPARATOR: char = ',';

/// Grade `raw` against the question's `correct` answer
pub fn is_correct(raw: &str, correct: &str) -> bool {
    if correct.contains(MULTI_VALUE_SEPARATOR) {
        let expected = tokens(correct);
        !expected.is_empty() && tokens(raw) == expected
    } else {
        let expected = fold(correct);
        !expected.is_empty() && fold(raw) == expected
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

fn tokens(s: &str) -> BTreeSet<String> {
    s.split(MULTI_VALUE_SEPARATOR)
        .map(fold)
        .filter(|t| !t.is_empty())
        .collect()
}
