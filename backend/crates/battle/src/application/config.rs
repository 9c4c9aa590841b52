//! Application Configuration
//!
//! Configuration for the Battle application layer.

use std::time::Duration;

use crate::domain::services::scoring::ScoringRule;
use crate::domain::value_object::room_code::CodeSpace;

pub use crate::domain::value_object::room_status::JoinPolicy;

/// Who moves the question cursor forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// The moderator calls `advance`
    #[default]
    Client,
    /// A per-room timer advances after the time limit plus `grace`
    Server { grace: Duration },
}

/// Battle application configuration
#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// Lowest room code
    pub code_min: u32,
    /// Highest room code; its width sets the code width
    pub code_max: u32,
    /// Distinct candidates tried before giving up with `CodeSpaceExhausted`
    pub code_max_attempts: u32,
    /// Upper bound accepted for `max_participants`
    pub max_participants_limit: u32,
    /// Upper bound accepted for `question_time_limit`
    pub max_question_time_limit_secs: u32,
    /// Points for a correct answer before the speed bonus
    pub base_points: u32,
    /// Speed bonus for an instant correct answer
    pub max_speed_bonus: u32,
    pub join_policy: JoinPolicy,
    pub pacing: Pacing,
    /// Per-room broadcast buffer; slower subscribers skip ahead
    pub event_channel_capacity: usize,
    /// Key for moderator and participant tokens (32 bytes)
    pub token_secret: [u8; 32],
    /// How long a finished room keeps its code (24 hours)
    pub code_retention: Duration,
    /// How long an unfinished room may hold its code (12 hours)
    pub room_max_lifetime: Duration,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            code_min: 1000,
            code_max: 9999,
            code_max_attempts: 32,
            max_participants_limit: 500,
            max_question_time_limit_secs: 600,
            base_points: 100,
            max_speed_bonus: 50,
            join_policy: JoinPolicy::WaitingOnly,
            pacing: Pacing::Client,
            event_channel_capacity: 256,
            token_secret: [0u8; 32],
            code_retention: Duration::from_secs(24 * 3600), // 24 hours
            room_max_lifetime: Duration::from_secs(12 * 3600), // 12 hours
        }
    }
}

impl BattleConfig {
    /// Create config with a random token secret
    pub fn with_random_secret() -> Self {
        Self {
            token_secret: platform::crypto::random_key(),
            ..Default::default()
        }
    }

    /// Create config for development (server pacing with a short grace)
    pub fn development() -> Self {
        Self {
            pacing: Pacing::Server {
                grace: Duration::from_secs(2),
            },
            ..Self::with_random_secret()
        }
    }

    /// Room code space; falls back to the 4-digit space if the bounds are unusable
    pub fn code_space(&self) -> CodeSpace {
        CodeSpace::new(self.code_min, self.code_max).unwrap_or_else(|| {
            tracing::warn!(
                code_min = self.code_min,
                code_max = self.code_max,
                "Invalid code range, using 4-digit default"
            );
            CodeSpace::default()
        })
    }

    pub fn scoring(&self) -> ScoringRule {
        ScoringRule {
            base_points: self.base_points,
            max_speed_bonus: self.max_speed_bonus,
        }
    }

    pub fn code_retention_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.code_retention).unwrap_or(chrono::Duration::hours(24))
    }

    pub fn room_max_lifetime_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.room_max_lifetime).unwrap_or(chrono::Duration::hours(12))
    }
}
