//! Rating aggregator.
//!
//! Accepts ratings gated by a shared interaction and keeps per-agent
//! statistics current. Validation runs in a fixed order so each rejection
//! has a single, predictable cause:
//!
//! ```text
//! registered ─▶ not self ─▶ score 1..=10 ─▶ interaction + participants
//!     ─▶ rating window ─▶ feedback ─▶ not a duplicate ─▶ rater rate limit
//! ```

mod stats;

pub use stats::RatingStats;

use crate::config::RatingConfig;
use crate::error::{KarmaError, Result};
use crate::hashing::rating_id;
use crate::interactions::InteractionLedger;
use crate::registry::IdentityRegistry;
use crate::types::{Address, Rating, Timestamp};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Lowest accepted score.
pub const MIN_SCORE: i64 = 1;
/// Highest accepted score.
pub const MAX_SCORE: i64 = 10;

/// A rating as submitted by the rater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmission {
    pub rated: Address,
    /// Unchecked score; must be within 1-10
    pub score: i64,
    pub interaction_id: String,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl RatingSubmission {
    pub fn new(rated: impl Into<Address>, score: i64, interaction_id: impl Into<String>) -> Self {
        Self {
            rated: rated.into(),
            score,
            interaction_id: interaction_id.into(),
            feedback: None,
            context: None,
        }
    }

    /// Builder: attach feedback text.
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// Builder: attach a context key.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Accepted ratings indexed by rated and rating agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingAggregator {
    ratings: BTreeMap<String, Rating>,
    by_rated: BTreeMap<Address, Vec<String>>,
    by_rater: BTreeMap<Address, Vec<String>>,
    stats: BTreeMap<Address, RatingStats>,
}

impl RatingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and accept a rating, freezing `rater_weight` into it.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        config: &RatingConfig,
        registry: &IdentityRegistry,
        interactions: &InteractionLedger,
        rater: &Address,
        submission: RatingSubmission,
        now: Timestamp,
        rater_weight: f64,
    ) -> Result<Rating> {
        let (id, score) = self.check(config, registry, interactions, rater, &submission, now)?;

        let rating = Rating {
            id: id.clone(),
            rater: rater.clone(),
            rated: submission.rated,
            score,
            interaction_id: submission.interaction_id,
            timestamp: now,
            feedback: submission.feedback,
            context: submission.context,
            rater_weight,
        };

        self.by_rated
            .entry(rating.rated.clone())
            .or_default()
            .push(id.clone());
        self.by_rater
            .entry(rating.rater.clone())
            .or_default()
            .push(id.clone());
        self.stats
            .entry(rating.rated.clone())
            .or_default()
            .record(score, config.recent_window);
        self.ratings.insert(id, rating.clone());

        Ok(rating)
    }

    /// Run every validation step without mutating.
    fn check(
        &self,
        config: &RatingConfig,
        registry: &IdentityRegistry,
        interactions: &InteractionLedger,
        rater: &Address,
        submission: &RatingSubmission,
        now: Timestamp,
    ) -> Result<(String, u8)> {
        let rated = &submission.rated;
        registry.get(rater)?;
        registry.get(rated)?;
        registry.require_active(rater)?;
        registry.require_active(rated)?;

        if rater == rated {
            return Err(KarmaError::SelfRatingForbidden {
                address: rater.clone(),
            });
        }

        let score = u8::try_from(submission.score)
            .ok()
            .filter(|s| (MIN_SCORE..=MAX_SCORE).contains(&i64::from(*s)))
            .ok_or(KarmaError::ScoreOutOfRange {
                score: submission.score,
            })?;

        let interaction = interactions.get(&submission.interaction_id)?;
        for party in [rater, rated] {
            if !interaction.involves(party) {
                return Err(KarmaError::NotAParticipant {
                    address: party.clone(),
                    interaction_id: interaction.id.clone(),
                });
            }
        }

        if let Some(window) = config.rating_window_secs {
            let deadline = i64::try_from(window)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|window| interaction.timestamp.checked_add_signed(window));
            if deadline.is_some_and(|deadline| now > deadline) {
                return Err(KarmaError::RatingWindowExpired {
                    interaction_id: interaction.id.clone(),
                });
            }
        }

        if let Some(feedback) = &submission.feedback {
            let len = feedback.chars().count();
            if len > config.max_feedback_len {
                return Err(KarmaError::InvalidFeedback {
                    reason: format!(
                        "feedback is {len} characters, limit {}",
                        config.max_feedback_len
                    ),
                });
            }
        }

        let id = rating_id(rater, rated, &interaction.id);
        if self.ratings.contains_key(&id) {
            return Err(KarmaError::DuplicateRating {
                rater: rater.clone(),
                rated: rated.clone(),
                interaction_id: interaction.id.clone(),
            });
        }

        if let Some(limit) = config.max_ratings_per_window {
            let window_start = i64::try_from(config.rate_limit_window_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|window| now.checked_sub_signed(window));
            // Ratings by one rater are stored in timestamp order
            let recent = self
                .ratings_by(rater)
                .into_iter()
                .rev()
                .take_while(|r| !window_start.is_some_and(|start| r.timestamp <= start))
                .count();
            if recent >= limit as usize {
                return Err(KarmaError::RateLimitExceeded {
                    rater: rater.clone(),
                    limit,
                    window_secs: config.rate_limit_window_secs,
                });
            }
        }

        Ok((id, score))
    }

    pub fn get(&self, id: &str) -> Option<&Rating> {
        self.ratings.get(id)
    }

    /// Ratings received by `agent`, oldest first.
    pub fn ratings_for(&self, agent: &Address) -> Vec<&Rating> {
        self.collect(self.by_rated.get(agent))
    }

    /// Ratings given by `agent`, oldest first.
    pub fn ratings_by(&self, agent: &Address) -> Vec<&Rating> {
        self.collect(self.by_rater.get(agent))
    }

    fn collect(&self, ids: Option<&Vec<String>>) -> Vec<&Rating> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.ratings.get(id))
            .collect()
    }

    /// Statistics for `agent`; empty when it has never been rated.
    pub fn stats(&self, agent: &Address) -> RatingStats {
        self.stats.get(agent).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}
