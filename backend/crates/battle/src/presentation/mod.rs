//! Presentation Layer
//!
//! HTTP handlers, WebSocket subscription, DTOs and router.

pub mod dto;
pub mod handlers;
pub mod router;
pub mod ws;
