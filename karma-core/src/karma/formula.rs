//! The karma formula.
//!
//! ```text
//! karma = base
//!       + Σ weight(r) * (r.score - midpoint) * decay(now - r.timestamp)
//!       + bonus * min(interactions, cap)
//!       + Σ modifiers[r.context]
//! ```
//!
//! Only positive rating terms decay; negative terms keep their full weight.
//! With no new inputs the score can therefore only fall over time. The
//! result is clamped to `[0, max_score]`.

use crate::config::KarmaConfig;
use crate::types::{Rating, Timestamp};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Each term of the formula, for audit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct KarmaBreakdown {
    pub base: f64,
    /// Weighted, decayed rating contributions
    pub ratings: f64,
    /// Capped interaction bonus
    pub interactions: f64,
    /// Sum of contextual modifiers
    pub contextual: f64,
    /// Sum before clamping
    pub raw: f64,
    /// Clamped score
    pub score: f64,
}

/// `exp(-Δt / τ)` with Δt clamped at zero, so the factor stays in `[0, 1]`.
pub fn decay(elapsed_secs: f64, decay_constant_secs: u64) -> f64 {
    if decay_constant_secs == 0 {
        return 0.0;
    }
    let elapsed = elapsed_secs.max(0.0);
    (-elapsed / decay_constant_secs as f64).exp().clamp(0.0, 1.0)
}

/// Weight a rater's karma confers on their ratings.
pub fn rating_weight(config: &KarmaConfig, rater_karma: f64) -> f64 {
    if !config.reputation_weighting {
        return 1.0;
    }
    (rater_karma / config.weight_reference).clamp(config.min_rating_weight, config.max_rating_weight)
}

/// Evaluate the formula for one agent.
pub fn compute<'a>(
    config: &KarmaConfig,
    ratings: impl IntoIterator<Item = &'a Rating>,
    interaction_count: u64,
    now: Timestamp,
) -> KarmaBreakdown {
    let mut rating_sum = 0.0;
    let mut contextual = 0.0;

    for rating in ratings {
        let term = rating.rater_weight * (f64::from(rating.score) - config.midpoint);
        rating_sum += if term > 0.0 {
            let elapsed = (now - rating.timestamp).num_milliseconds() as f64 / 1000.0;
            term * decay(elapsed, config.decay_constant_secs)
        } else {
            term
        };

        if let Some(modifier) = rating
            .context
            .as_ref()
            .and_then(|context| config.contextual_modifiers.get(context))
        {
            contextual += modifier;
        }
    }

    let interactions =
        config.interaction_bonus * interaction_count.min(config.interaction_bonus_cap) as f64;
    let raw = config.base_score + rating_sum + interactions + contextual;

    KarmaBreakdown {
        base: config.base_score,
        ratings: rating_sum,
        interactions,
        contextual,
        raw,
        score: raw.clamp(0.0, config.max_score),
    }
}
