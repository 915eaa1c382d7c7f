//! Karma score state and its append-only history.

use crate::hashing::calculation_hash;
use crate::types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// What triggered a karma recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum KarmaReason {
    /// Initial score on registration
    Registered,
    /// A rating was received
    RatingReceived,
    /// An interaction was logged
    InteractionLogged,
    /// Explicit recalculation request
    Recalculated,
    /// Karma parameters changed by governance
    ParametersChanged,
}

/// Last committed karma of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct KarmaScore {
    pub score: f64,
    pub last_updated: Timestamp,
}

/// One entry in an agent's karma history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct KarmaSnapshot {
    pub timestamp: Timestamp,
    pub score: f64,
    /// Change from the previous snapshot
    pub delta: f64,
    pub reason: KarmaReason,
    /// SHA-256 over (address, timestamp, score)
    pub calculation_hash: String,
}

impl KarmaSnapshot {
    pub fn new(
        address: &Address,
        timestamp: Timestamp,
        score: f64,
        delta: f64,
        reason: KarmaReason,
    ) -> Self {
        Self {
            timestamp,
            score,
            delta,
            reason,
            calculation_hash: calculation_hash(address, timestamp, score),
        }
    }

    /// Recompute the audit hash and compare.
    pub fn verify(&self, address: &Address) -> bool {
        self.calculation_hash == calculation_hash(address, self.timestamp, self.score)
    }
}

/// Result of a committed recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct KarmaUpdate {
    pub address: Address,
    pub previous: f64,
    pub score: f64,
    pub delta: f64,
    pub reason: KarmaReason,
}
