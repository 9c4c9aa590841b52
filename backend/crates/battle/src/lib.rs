//! Battle (Real-time Quiz Battle) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, scoring rules, repository and bus traits
//! - `application/` - Use cases (registry, lifecycle, join, answers, leaderboard)
//! - `infra/` - PostgreSQL and in-memory stores, broadcast event bus, quiz catalog
//! - `presentation/` - HTTP handlers, WebSocket events, DTOs, router
//!
//! ## Features
//! - Rooms addressed by short numeric codes, frozen quiz snapshot per room
//! - `waiting -> active -> finished` lifecycle with compare-and-swap transitions
//! - Capacity and display-name uniqueness enforced at write time
//! - One answer per participant per question, speed-bonus scoring
//! - Deterministic leaderboard, live updates over WebSocket
//!
//! ## Capacity
//! The default 4-digit code space (1000-9999) allows at most 9000 rooms to
//! hold a live code at the same time. Codes of finished rooms are released
//! after `BattleConfig::code_retention`.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::{BattleConfig, JoinPolicy, Pacing};
pub use error::{BattleError, BattleResult};
pub use infra::broadcast::BroadcastEventBus;
pub use infra::catalog::{AnyQuizCatalog, HttpQuizCatalog, StaticQuizCatalog};
pub use infra::memory::MemoryBattleRepository;
pub use infra::postgres::PgBattleRepository;
pub use presentation::router::{battle_router, battle_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

