//! Leaderboard Ranking
//!
//! Order: `total_score` DESC, `joined_at` ASC, `id` ASC. The last key only
//! matters for participants who joined in the same instant, but it makes
//! the order total.

use std::cmp::Ordering;

use crate::domain::entity::participant::Participant;

/// A participant with its 1-based leaderboard position
#[derive(Debug, Clone, PartialEq)]
pub struct RankedParticipant {
    pub rank: u32,
    pub participant: Participant,
}

pub fn compare(a: &Participant, b: &Participant) -> Ordering {
    b.total_score
        .cmp(&a.total_score)
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort and number participants
pub fn rank(mut participants: Vec<Participant>) -> Vec<RankedParticipant> {
    participants.sort_by(compare);
    participants
        .into_iter()
        .enumerate()
        .map(|(i, participant)| RankedParticipant {
            rank: i as u32 + 1,
            participant,
        })
        .collect()
}
