//! Karma engine.
//!
//! Scores are derived from the rating and interaction records by
//! [`formula::compute`]. A committing write calls [`KarmaEngine::recompute`]
//! explicitly for each agent whose inputs changed; reads evaluate the same
//! formula at the read time, which applies decay lazily.

pub mod formula;
mod history;
pub mod leaderboard;

pub use formula::KarmaBreakdown;
pub use history::{KarmaReason, KarmaScore, KarmaSnapshot, KarmaUpdate};
pub use leaderboard::LeaderboardEntry;

use crate::config::KarmaConfig;
use crate::interactions::InteractionLedger;
use crate::ratings::RatingAggregator;
use crate::types::{Address, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Committed karma scores and their history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KarmaEngine {
    scores: BTreeMap<Address, KarmaScore>,
    history: BTreeMap<Address, Vec<KarmaSnapshot>>,
}

impl KarmaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-state score for a newly registered agent.
    pub fn initialize(&mut self, config: &KarmaConfig, address: &Address, now: Timestamp) -> KarmaUpdate {
        let score = config.base_score;
        self.commit(address, score, score, now, KarmaReason::Registered)
    }

    /// Evaluate the formula for `address` at `now`.
    pub fn breakdown(
        &self,
        config: &KarmaConfig,
        address: &Address,
        ratings: &RatingAggregator,
        interactions: &InteractionLedger,
        now: Timestamp,
    ) -> KarmaBreakdown {
        formula::compute(
            config,
            ratings.ratings_for(address),
            interactions.count_for(address),
            now,
        )
    }

    /// Current karma with decay applied up to `now`.
    pub fn karma_at(
        &self,
        config: &KarmaConfig,
        address: &Address,
        ratings: &RatingAggregator,
        interactions: &InteractionLedger,
        now: Timestamp,
    ) -> f64 {
        self.breakdown(config, address, ratings, interactions, now).score
    }

    /// Recompute and commit the score of `address`, appending a snapshot.
    pub fn recompute(
        &mut self,
        config: &KarmaConfig,
        address: &Address,
        ratings: &RatingAggregator,
        interactions: &InteractionLedger,
        now: Timestamp,
        reason: KarmaReason,
    ) -> KarmaUpdate {
        let score = self.karma_at(config, address, ratings, interactions, now);
        let previous = self
            .scores
            .get(address)
            .map_or(config.base_score, |s| s.score);
        let update = self.commit(address, previous, score, now, reason);
        debug!(
            address = %address,
            previous = update.previous,
            score = update.score,
            reason = ?reason,
            "Karma recomputed"
        );
        update
    }

    fn commit(
        &mut self,
        address: &Address,
        previous: f64,
        score: f64,
        now: Timestamp,
        reason: KarmaReason,
    ) -> KarmaUpdate {
        let delta = match reason {
            KarmaReason::Registered => 0.0,
            _ => score - previous,
        };
        self.scores.insert(
            address.clone(),
            KarmaScore {
                score,
                last_updated: now,
            },
        );
        self.history
            .entry(address.clone())
            .or_default()
            .push(KarmaSnapshot::new(address, now, score, delta, reason));

        KarmaUpdate {
            address: address.clone(),
            previous,
            score,
            delta,
            reason,
        }
    }

    /// Last committed score, without decay since.
    pub fn committed(&self, address: &Address) -> Option<&KarmaScore> {
        self.scores.get(address)
    }

    /// Snapshots for `address`, oldest first.
    pub fn history(&self, address: &Address) -> &[KarmaSnapshot] {
        self.history.get(address).map_or(&[], Vec::as_slice)
    }
}
