//! Domain Layer
//!
//! Contains entities, value objects, domain services and the traits the
//! outer layers implement (repositories, event bus, quiz catalog).

pub mod catalog;
pub mod entity;
pub mod event;
pub mod repository;
pub mod services;
pub mod value_object;

// Re-exports
pub use catalog::QuizCatalog;
pub use entity::{answer::AnswerRecord, participant::Participant, room::Room};
pub use event::{BattleEvent, EventBus, EventEnvelope};
pub use repository::{AnswerRepository, BattleStore, ParticipantRepository, RoomRepository};
