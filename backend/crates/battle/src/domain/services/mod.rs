//! Domain Services
//!
//! Pure functions over domain values: grading, scoring and ranking.

pub mod grading;
pub mod ranking;
pub mod scoring;
