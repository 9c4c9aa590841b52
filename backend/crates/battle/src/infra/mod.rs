//! Infrastructure Layer
//!
//! Storage, event bus and quiz catalog implementations.

pub mod broadcast;
pub mod catalog;
pub mod memory;
pub mod postgres;
