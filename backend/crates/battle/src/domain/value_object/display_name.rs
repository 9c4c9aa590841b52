//! Display Name Value Object
//!
//! The name a participant plays under. Unique within a room.
//!
//! ## Processing
//! trim -> NFKC -> validate. The canonical form (NFKC + lowercase) is what
//! the uniqueness constraint is keyed on, so "Alice" and "ＡＬＩＣＥ"
//! collide while the original spelling is kept for display.
//!
//! ## Invariants
//! - 1..=32 characters after normalization
//! - No control characters

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Minimum length for a display name (in characters)
pub const DISPLAY_NAME_MIN_LENGTH: usize = 1;

/// Maximum length for a display name (in characters)
pub const DISPLAY_NAME_MAX_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisplayNameError {
    #[error("Display name must not be empty")]
    Empty,
    #[error("Display name must be at most {DISPLAY_NAME_MAX_LENGTH} characters")]
    TooLong,
    #[error("Display name must not contain control characters")]
    ControlCharacter,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayName {
    /// NFKC form as entered
    original: String,
    /// NFKC + lowercase, used for uniqueness
    canonical: String,
}

impl DisplayName {
    pub fn new(input: &str) -> Result<Self, DisplayNameError> {
        let original: String = input.trim().nfkc().collect();

        let len = original.chars().count();
        if len < DISPLAY_NAME_MIN_LENGTH {
            return Err(DisplayNameError::Empty);
        }
        if len > DISPLAY_NAME_MAX_LENGTH {
            return Err(DisplayNameError::TooLong);
        }
        if original.chars().any(char::is_control) {
            return Err(DisplayNameError::ControlCharacter);
        }

        let canonical = original.to_lowercase();
        Ok(Self {
            original,
            canonical,
        })
    }

    /// Reconstruct from database (trusted data)
    pub fn from_db(original: String, canonical: String) -> Self {
        Self {
            original,
            canonical,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
