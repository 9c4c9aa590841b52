//! Answer Scoring
//!
//! Correct answers earn `base_points` plus a speed bonus that decays
//! linearly from `max_speed_bonus` at 0ms to 0 at the time limit:
//!
//! `bonus = round((limit - taken) / (limit / max_speed_bonus))`
//!
//! With the defaults and a 30s limit: 0ms -> 150, 15s -> 125, 30s -> 100.

/// Scoring parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRule {
    pub base_points: u32,
    pub max_speed_bonus: u32,
}

impl Default for ScoringRule {
    fn default() -> Self {
        Self {
            base_points: 100,
            max_speed_bonus: 50,
        }
    }
}

impl ScoringRule {
    /// Points for one graded answer
    pub fn points(&self, is_correct: bool, time_taken_ms: u64, time_limit_ms: u64) -> u32 {
        if !is_correct {
            return 0;
        }
        self.base_points + self.speed_bonus(time_taken_ms, time_limit_ms)
    }

    fn speed_bonus(&self, time_taken_ms: u64, time_limit_ms: u64) -> u32 {
        if time_limit_ms == 0 || time_taken_ms >= time_limit_ms {
            return 0;
        }
        let remaining = (time_limit_ms - time_taken_ms) as f64;
        let bonus = (remaining * f64::from(self.max_speed_bonus) / time_limit_ms as f64).round();
        (bonus as u32).min(self.max_speed_bonus)
    }
}
