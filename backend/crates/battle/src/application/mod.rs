//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod create_room;
pub mod join_room;
pub mod leaderboard;
pub mod lifecycle;
pub mod pacer;
pub mod registry;
pub mod release_codes;
pub mod review_answers;
pub mod room_info;
pub mod submit_answer;

// Re-exports
pub use config::{BattleConfig, JoinPolicy, Pacing};
pub use create_room::{CreateRoomInput, CreateRoomOutput, CreateRoomUseCase, QuizSource};
pub use join_room::{JoinRoomInput, JoinRoomOutput, JoinRoomUseCase};
pub use leaderboard::{LeaderboardOutput, LeaderboardUseCase};
pub use lifecycle::{LifecycleAction, LifecycleUseCase};
pub use registry::RoomRegistry;
pub use release_codes::ReleaseCodesUseCase;
pub use review_answers::{ReviewAnswersOutput, ReviewAnswersUseCase};
pub use room_info::{RoomInfoOutput, RoomInfoUseCase};
pub use submit_answer::{SubmitAnswerInput, SubmitAnswerUseCase, SubmitOutcome};
