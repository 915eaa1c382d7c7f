//! Domain events emitted by committed writes.
//!
//! Events are the feed external indexers consume to build read-side
//! projections. They are produced only for writes that commit.

use crate::governance::{ProposalKind, ProposalStatus, TallyOutcome, VoteOption};
use crate::karma::KarmaReason;
use crate::types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A state change produced by a committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DomainEvent {
    AgentRegistered {
        address: Address,
        metadata_hash: String,
        registered_at: Timestamp,
    },
    AgentMetadataUpdated {
        address: Address,
        metadata_hash: String,
    },
    InteractionLogged {
        interaction_id: String,
        participants: Vec<Address>,
        interaction_type: String,
    },
    RatingSubmitted {
        rating_id: String,
        rater: Address,
        rated: Address,
        score: u8,
        interaction_id: String,
    },
    KarmaUpdated {
        address: Address,
        previous: f64,
        score: f64,
        delta: f64,
        reason: KarmaReason,
    },
    ProposalCreated {
        proposal_id: u64,
        proposer: Address,
        kind: ProposalKind,
        voting_start: Timestamp,
        voting_end: Timestamp,
    },
    ProposalActivated {
        proposal_id: u64,
    },
    VoteCast {
        proposal_id: u64,
        voter: Address,
        option: VoteOption,
        weight: f64,
        /// Whether an earlier vote by the same voter was replaced
        replaced: bool,
    },
    ProposalFinalized {
        proposal_id: u64,
        status: ProposalStatus,
        outcome: TallyOutcome,
    },
    ProposalExecuted {
        proposal_id: u64,
        kind: ProposalKind,
    },
    ProposalCancelled {
        proposal_id: u64,
    },
    AgentSuspended {
        address: Address,
        proposal_id: u64,
    },
}

impl DomainEvent {
    /// Event name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentRegistered { .. } => "agent_registered",
            Self::AgentMetadataUpdated { .. } => "agent_metadata_updated",
            Self::InteractionLogged { .. } => "interaction_logged",
            Self::RatingSubmitted { .. } => "rating_submitted",
            Self::KarmaUpdated { .. } => "karma_updated",
            Self::ProposalCreated { .. } => "proposal_created",
            Self::ProposalActivated { .. } => "proposal_activated",
            Self::VoteCast { .. } => "vote_cast",
            Self::ProposalFinalized { .. } => "proposal_finalized",
            Self::ProposalExecuted { .. } => "proposal_executed",
            Self::ProposalCancelled { .. } => "proposal_cancelled",
            Self::AgentSuspended { .. } => "agent_suspended",
        }
    }
}
