//! Governance module.
//!
//! Proposal lifecycle:
//!
//! ```text
//! pending ──(voting_start)──▶ active ──(voting_end, tally)──▶ passed ──(execute)──▶ executed
//!    │                          │
//!    └──────(cancel)────────────┴──────────────────────────────▶ rejected
//! ```
//!
//! Transitions out of `pending` and `active` happen lazily: a vote activates
//! a due proposal, and [`GovernanceModule::advance`] is a permissionless
//! crank that activates and finalizes whatever is due. Execution is always
//! a separate explicit request.

mod proposal;
pub mod tally;

pub use proposal::{
    Proposal, ProposalAction, ProposalKind, ProposalStatus, Tally, TallyOutcome, Vote, VoteOption,
};
pub use tally::TallyResult;

use crate::config::{EngineConfig, GovernanceConfig};
use crate::error::{KarmaError, Result};
use crate::types::{Address, Timestamp};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Content of a new proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ProposalDraft {
    pub title: String,
    pub description: String,
    pub action: ProposalAction,
}

impl ProposalDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>, action: ProposalAction) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            action,
        }
    }
}

/// Protocol version recorded by an executed system upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ProtocolVersion {
    pub version: String,
    pub code_hash: String,
    pub proposal_id: u64,
    pub activated_at: Timestamp,
}

/// Result of casting a vote.
#[derive(Debug, Clone, PartialEq)]
pub struct CastOutcome {
    pub vote: Vote,
    /// The vote this one replaced
    pub replaced: Option<Vote>,
    /// Whether this vote moved the proposal from pending to active
    pub activated: bool,
}

/// A lifecycle transition made by [`GovernanceModule::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Activated { proposal_id: u64 },
    Finalized { proposal_id: u64, result: TallyResult },
}

/// Proposals, votes and the active protocol version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceModule {
    proposals: BTreeMap<u64, Proposal>,
    /// Votes per proposal keyed by voter
    votes: BTreeMap<u64, BTreeMap<Address, Vote>>,
    next_id: u64,
    protocol: Option<ProtocolVersion>,
}

impl GovernanceModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a proposal.
    ///
    /// Registration and standing of the proposer, and registration of a
    /// suspension target, are checked by the caller.
    pub fn create(
        &mut self,
        config: &EngineConfig,
        proposer: &Address,
        proposer_karma: f64,
        quorum_base: f64,
        draft: ProposalDraft,
        now: Timestamp,
    ) -> Result<&Proposal> {
        let gov = &config.governance;
        if proposer_karma < gov.min_karma_for_proposal {
            return Err(KarmaError::InsufficientKarma {
                required: gov.min_karma_for_proposal,
                available: proposer_karma,
            });
        }
        check_text("title", &draft.title, gov.max_title_len)?;
        check_text("description", &draft.description, gov.max_description_len)?;
        draft.action.validate(config)?;

        let voting_start = offset(now, gov.voting_delay_secs)?;
        let voting_end = offset(voting_start, gov.voting_period_secs)?;

        self.next_id += 1;
        let id = self.next_id;
        let proposal = Proposal {
            id,
            title: draft.title,
            description: draft.description,
            proposer: proposer.clone(),
            action: draft.action,
            status: ProposalStatus::Pending,
            created_at: now,
            voting_start,
            voting_end,
            tally: Tally::default(),
            quorum_base,
            voting_power: gov.voting_power,
            outcome: None,
            finalized_at: None,
            executed_at: None,
        };

        info!(
            proposal_id = id,
            proposer = %proposer,
            kind = ?proposal.kind(),
            quorum_base,
            "Proposal created"
        );

        Ok(self.proposals.entry(id).or_insert(proposal))
    }

    /// Check that a proposal accepts votes at `now`.
    pub fn ensure_voting_open(&self, proposal_id: u64, now: Timestamp) -> Result<&Proposal> {
        let proposal = self.get(proposal_id)?;
        if !proposal.status.is_open() || now >= proposal.voting_end {
            return Err(KarmaError::VotingClosed { proposal_id });
        }
        if now < proposal.voting_start {
            return Err(KarmaError::VotingNotStarted {
                proposal_id,
                voting_start: proposal.voting_start,
            });
        }
        Ok(proposal)
    }

    /// Cast or replace a vote. Voter eligibility is checked by the caller.
    ///
    /// Weight uses the proposal's own voting-power curve, so votes stay in
    /// the units of its `quorum_base` even if governance changes the curve.
    pub fn cast(
        &mut self,
        config: &GovernanceConfig,
        proposal_id: u64,
        voter: &Address,
        voter_karma: f64,
        option: VoteOption,
        now: Timestamp,
    ) -> Result<CastOutcome> {
        self.ensure_voting_open(proposal_id, now)?;
        if voter_karma < config.min_karma_for_voting {
            return Err(KarmaError::InsufficientKarma {
                required: config.min_karma_for_voting,
                available: voter_karma,
            });
        }

        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(KarmaError::ProposalNotFound { proposal_id })?;
        let activated = proposal.status == ProposalStatus::Pending;
        if activated {
            proposal.status = ProposalStatus::Active;
        }

        let vote = Vote {
            proposal_id,
            voter: voter.clone(),
            option,
            weight: proposal.voting_power.power(voter_karma),
            karma_at_cast: voter_karma,
            cast_at: now,
        };

        let ballots = self.votes.entry(proposal_id).or_default();
        let replaced = ballots.insert(voter.clone(), vote.clone());
        proposal.tally = Tally::from_votes(ballots.values());

        Ok(CastOutcome {
            vote,
            replaced,
            activated,
        })
    }

    /// Tally a proposal whose voting period has ended.
    pub fn finalize(
        &mut self,
        config: &GovernanceConfig,
        proposal_id: u64,
        now: Timestamp,
    ) -> Result<TallyResult> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(KarmaError::ProposalNotFound { proposal_id })?;
        if !proposal.status.is_open() {
            return Err(KarmaError::AlreadyFinalized { proposal_id });
        }
        if now < proposal.voting_end {
            return Err(KarmaError::VotingStillOpen {
                proposal_id,
                voting_end: proposal.voting_end,
            });
        }

        let result = tally::decide(
            &proposal.tally,
            proposal.quorum_base,
            config.quorum_fraction,
            config.veto_threshold,
        );
        proposal.status = if result.passed() {
            ProposalStatus::Passed
        } else {
            ProposalStatus::Rejected
        };
        proposal.outcome = Some(result.outcome);
        proposal.finalized_at = Some(now);

        info!(
            proposal_id,
            outcome = ?result.outcome,
            cast = result.cast,
            required_quorum = result.required_quorum,
            "Proposal finalized"
        );
        Ok(result)
    }

    /// Activate due pending proposals and finalize ended ones.
    pub fn advance(&mut self, config: &GovernanceConfig, now: Timestamp) -> Vec<Transition> {
        let due: Vec<u64> = self
            .proposals
            .values()
            .filter(|p| p.status.is_open() && now >= p.voting_start)
            .map(|p| p.id)
            .collect();

        let mut transitions = Vec::new();
        for proposal_id in due {
            let ended = self
                .proposals
                .get(&proposal_id)
                .is_some_and(|p| now >= p.voting_end);
            if ended {
                if let Ok(result) = self.finalize(config, proposal_id, now) {
                    transitions.push(Transition::Finalized {
                        proposal_id,
                        result,
                    });
                }
            } else if let Some(proposal) = self.proposals.get_mut(&proposal_id) {
                if proposal.status == ProposalStatus::Pending {
                    proposal.status = ProposalStatus::Active;
                    transitions.push(Transition::Activated { proposal_id });
                }
            }
        }
        transitions
    }

    /// Check that a proposal may be executed at `now`.
    pub fn ensure_executable(
        &self,
        config: &GovernanceConfig,
        proposal_id: u64,
        now: Timestamp,
    ) -> Result<&Proposal> {
        let proposal = self.get(proposal_id)?;
        match proposal.status {
            ProposalStatus::Executed => Err(KarmaError::AlreadyExecuted { proposal_id }),
            ProposalStatus::Rejected if proposal.outcome == Some(TallyOutcome::QuorumNotMet) => {
                Err(KarmaError::QuorumNotMet {
                    proposal_id,
                    cast: proposal.tally.total_cast(),
                    required: config.quorum_fraction * proposal.quorum_base,
                })
            }
            ProposalStatus::Passed => {
                let executable_at = offset(proposal.voting_end, config.execution_delay_secs)?;
                if now < executable_at {
                    return Err(KarmaError::ExecutionDelayActive {
                        proposal_id,
                        executable_at,
                    });
                }
                Ok(proposal)
            }
            _ => Err(KarmaError::ProposalNotPassed { proposal_id }),
        }
    }

    /// Record execution. The action itself is applied by the caller.
    pub fn mark_executed(&mut self, proposal_id: u64, now: Timestamp) -> Result<()> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(KarmaError::ProposalNotFound { proposal_id })?;
        proposal.status = ProposalStatus::Executed;
        proposal.executed_at = Some(now);
        if let ProposalAction::SystemUpgrade { version, code_hash } = &proposal.action {
            self.protocol = Some(ProtocolVersion {
                version: version.clone(),
                code_hash: code_hash.clone(),
                proposal_id,
                activated_at: now,
            });
        }
        info!(proposal_id, kind = ?proposal.kind(), "Proposal executed");
        Ok(())
    }

    /// Withdraw a proposal before its voting period ends. Proposer only.
    pub fn cancel(&mut self, caller: &Address, proposal_id: u64, now: Timestamp) -> Result<()> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(KarmaError::ProposalNotFound { proposal_id })?;
        if &proposal.proposer != caller {
            return Err(KarmaError::Unauthorized {
                caller: caller.clone(),
                action: format!("cancel proposal {proposal_id}"),
            });
        }
        match proposal.status {
            ProposalStatus::Executed => return Err(KarmaError::AlreadyExecuted { proposal_id }),
            ProposalStatus::Passed | ProposalStatus::Rejected => {
                return Err(KarmaError::AlreadyFinalized { proposal_id })
            }
            ProposalStatus::Pending | ProposalStatus::Active => {}
        }
        if now >= proposal.voting_end {
            return Err(KarmaError::VotingClosed { proposal_id });
        }

        proposal.status = ProposalStatus::Rejected;
        proposal.outcome = Some(TallyOutcome::Cancelled);
        proposal.finalized_at = Some(now);
        info!(proposal_id, proposer = %caller, "Proposal cancelled");
        Ok(())
    }

    pub fn get(&self, proposal_id: u64) -> Result<&Proposal> {
        self.proposals
            .get(&proposal_id)
            .ok_or(KarmaError::ProposalNotFound { proposal_id })
    }

    /// All proposals, oldest first.
    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    /// Votes on a proposal in voter order.
    pub fn votes(&self, proposal_id: u64) -> Vec<&Vote> {
        self.votes
            .get(&proposal_id)
            .map(|votes| votes.values().collect())
            .unwrap_or_default()
    }

    pub fn vote_of(&self, proposal_id: u64, voter: &Address) -> Option<&Vote> {
        self.votes.get(&proposal_id)?.get(voter)
    }

    /// Protocol version set by the last executed upgrade.
    pub fn protocol_version(&self) -> Option<&ProtocolVersion> {
        self.protocol.as_ref()
    }
}

fn offset(at: Timestamp, secs: u64) -> Result<Timestamp> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or(KarmaError::TimestampOutOfRange {
            timestamp: at,
            offset_secs: secs,
        })
}

fn check_text(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len == 0 || len > max {
        return Err(KarmaError::InvalidProposal {
            reason: format!("{field} must be 1-{max} characters, got {len}"),
        });
    }
    Ok(())
}
