//! Leaderboard ranking.

use crate::types::{Address, Agent, Timestamp};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    pub address: Address,
    pub name: String,
    pub karma_score: f64,
    pub registered_at: Timestamp,
}

/// Rank agents by karma, highest first.
///
/// Ties go to the earlier registration, then the lower registration
/// sequence, so the order is total and reproducible.
pub fn rank<'a>(
    scored: impl IntoIterator<Item = (&'a Agent, f64)>,
    limit: Option<usize>,
) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(&Agent, f64)> = scored.into_iter().collect();
    rows.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .total_cmp(a_score)
            .then_with(|| a.registered_at.cmp(&b.registered_at))
            .then_with(|| a.registration_seq.cmp(&b.registration_seq))
            .then_with(|| a.address.cmp(&b.address))
    });

    rows.into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(index, (agent, score))| LeaderboardEntry {
            rank: index + 1,
            address: agent.address.clone(),
            name: agent.metadata.name.clone(),
            karma_score: score,
            registered_at: agent.registered_at,
        })
        .collect()
}
