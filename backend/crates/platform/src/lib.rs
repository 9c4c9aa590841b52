//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (HMAC-SHA256, Base64, secure randomness)
//! - Signed capability tokens for moderators and participants
//! - Bearer token extraction from request headers

pub mod bearer;
pub mod crypto;
pub mod token;
