//! Incrementally maintained rating statistics.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Per-agent rating statistics, updated in O(1) per rating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub average_score: f64,
    pub total_ratings: u64,
    /// Count per score 1-10
    pub distribution: BTreeMap<u8, u64>,
    /// Mean of the recent window minus the lifetime mean
    pub recent_trend: f64,
    /// Population variance of all scores
    pub variance: f64,
    /// Welford sum of squared deviations
    #[serde(default)]
    m2: f64,
    /// Most recent scores, newest last
    #[serde(default)]
    recent: VecDeque<u8>,
}

impl RatingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one accepted score into the statistics.
    pub fn record(&mut self, score: u8, recent_window: usize) {
        let value = f64::from(score);
        self.total_ratings += 1;
        let delta = value - self.average_score;
        self.average_score += delta / self.total_ratings as f64;
        self.m2 += delta * (value - self.average_score);
        self.variance = self.m2 / self.total_ratings as f64;

        *self.distribution.entry(score).or_insert(0) += 1;

        self.recent.push_back(score);
        while self.recent.len() > recent_window.max(1) {
            self.recent.pop_front();
        }
        self.recent_trend = self.recent_mean() - self.average_score;
    }

    /// Mean of the recent window, or zero with no ratings.
    pub fn recent_mean(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.recent.iter().map(|s| u64::from(*s)).sum();
        sum as f64 / self.recent.len() as f64
    }

    pub fn recent_scores(&self) -> impl Iterator<Item = u8> + '_ {
        self.recent.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_single_rating() {
        let mut stats = RatingStats::new();
        stats.record(8, 10);
        assert_eq!(stats.average_score, 8.0);
        assert_eq!(stats.total_ratings, 1);
        assert_eq!(stats.distribution.get(&8), Some(&1));
        assert_eq!(stats.recent_trend, 0.0);
        assert_eq!(stats.variance, 0.0);
    }

    #[test]
    fn test_welford_matches_direct_computation() {
        let scores = [3u8, 9, 7, 7, 1, 10, 6];
        let mut stats = RatingStats::new();
        for s in scores {
            stats.record(s, 10);
        }
        let n = scores.len() as f64;
        let mean = scores.iter().map(|s| f64::from(*s)).sum::<f64>() / n;
        let var = scores
            .iter()
            .map(|s| (f64::from(*s) - mean).powi(2))
            .sum::<f64>()
            / n;
        assert!(approx(stats.average_score, mean));
        assert!(approx(stats.variance, var));
        assert_eq!(stats.distribution.get(&7), Some(&2));
    }

    #[test]
    fn test_recent_trend_uses_window() {
        let mut stats = RatingStats::new();
        for _ in 0..4 {
            stats.record(2, 2);
        }
        stats.record(10, 2);
        stats.record(10, 2);
        // recent = [10, 10], lifetime mean = 36 / 6 = 6
        assert!(approx(stats.recent_mean(), 10.0));
        assert!(approx(stats.recent_trend, 4.0));
        assert_eq!(stats.recent_scores().count(), 2);
    }
}
