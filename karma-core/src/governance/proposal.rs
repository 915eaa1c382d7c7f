//! Proposal, vote and typed execution payloads.

use crate::config::{EngineConfig, GovernanceUpdate, KarmaParameter, VotingPowerCurve};
use crate::error::{KarmaError, Result};
use crate::hashing::is_sha256_hex;
use crate::types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

const MAX_VERSION_LEN: usize = 32;
const MAX_SUSPENSION_REASON_LEN: usize = 512;

/// Lifecycle state of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Created, voting not yet open
    Pending,
    /// Accepting votes
    Active,
    /// Tallied and passed, awaiting execution
    Passed,
    /// Tallied and rejected, or cancelled (terminal)
    Rejected,
    /// Action applied (terminal)
    Executed,
}

impl ProposalStatus {
    /// Whether the proposal is still before its tally.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

/// A ballot option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum VoteOption {
    Yes,
    No,
    Abstain,
    NoWithVeto,
}

/// Discriminant of a [`ProposalAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    ParameterChange,
    GovernanceUpdate,
    AgentSuspension,
    SystemUpgrade,
}

/// What a proposal does when executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum ProposalAction {
    /// Change karma or rating parameters
    ParameterChange { changes: Vec<KarmaParameter> },
    /// Change governance parameters
    GovernanceUpdate(GovernanceUpdate),
    /// Suspend an agent
    AgentSuspension { agent: Address, reason: String },
    /// Record a new protocol version
    SystemUpgrade { version: String, code_hash: String },
}

impl ProposalAction {
    pub fn kind(&self) -> ProposalKind {
        match self {
            Self::ParameterChange { .. } => ProposalKind::ParameterChange,
            Self::GovernanceUpdate(_) => ProposalKind::GovernanceUpdate,
            Self::AgentSuspension { .. } => ProposalKind::AgentSuspension,
            Self::SystemUpgrade { .. } => ProposalKind::SystemUpgrade,
        }
    }

    /// Configuration that would result from executing this action, if any.
    pub fn resulting_config(&self, current: &EngineConfig) -> Option<EngineConfig> {
        match self {
            Self::ParameterChange { changes } => {
                let mut next = current.clone();
                for change in changes {
                    change.apply(&mut next);
                }
                Some(next)
            }
            Self::GovernanceUpdate(update) => {
                let mut next = current.clone();
                update.apply(&mut next.governance);
                Some(next)
            }
            Self::AgentSuspension { .. } | Self::SystemUpgrade { .. } => None,
        }
    }

    /// Validate the payload against the current configuration.
    ///
    /// Registry membership of a suspension target is checked by the caller.
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        match self {
            Self::ParameterChange { changes } if changes.is_empty() => {
                return Err(invalid("parameter_change has no changes"));
            }
            Self::GovernanceUpdate(update) if update.is_empty() => {
                return Err(invalid("governance_update has no changes"));
            }
            Self::AgentSuspension { reason, .. } => {
                if reason.trim().is_empty() {
                    return Err(invalid("suspension reason is empty"));
                }
                if reason.chars().count() > MAX_SUSPENSION_REASON_LEN {
                    return Err(invalid("suspension reason too long"));
                }
            }
            Self::SystemUpgrade { version, code_hash } => {
                if version.trim().is_empty() || version.len() > MAX_VERSION_LEN {
                    return Err(invalid("upgrade version must be 1-32 characters"));
                }
                if !is_sha256_hex(code_hash) {
                    return Err(invalid("code_hash must be a hex SHA-256 digest"));
                }
            }
            _ => {}
        }

        if let Some(next) = self.resulting_config(config) {
            next.validate()
                .map_err(|e| invalid(&format!("resulting configuration is invalid: {e}")))?;
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> KarmaError {
    KarmaError::InvalidProposal {
        reason: reason.to_string(),
    }
}

/// Karma-weighted sums per option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub yes: f64,
    pub no: f64,
    pub abstain: f64,
    pub no_with_veto: f64,
}

impl Tally {
    fn slot(&mut self, option: VoteOption) -> &mut f64 {
        match option {
            VoteOption::Yes => &mut self.yes,
            VoteOption::No => &mut self.no,
            VoteOption::Abstain => &mut self.abstain,
            VoteOption::NoWithVeto => &mut self.no_with_veto,
        }
    }

    /// Sum the given votes in iteration order.
    pub fn from_votes<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> Self {
        let mut tally = Self::default();
        for vote in votes {
            *tally.slot(vote.option) += vote.weight;
        }
        tally
    }

    /// Total weight cast across all options.
    pub fn total_cast(&self) -> f64 {
        self.yes + self.no + self.abstain + self.no_with_veto
    }
}

/// Why a proposal ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TallyOutcome {
    Passed,
    QuorumNotMet,
    Vetoed,
    ThresholdNotMet,
    Cancelled,
}

/// A governance proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Sequential identifier
    pub id: u64,
    pub title: String,
    pub description: String,
    pub proposer: Address,
    pub action: ProposalAction,
    pub status: ProposalStatus,
    pub created_at: Timestamp,
    pub voting_start: Timestamp,
    pub voting_end: Timestamp,
    pub tally: Tally,
    /// Total voting power of active agents at creation
    pub quorum_base: f64,
    /// Curve fixed at creation; used for `quorum_base` and every vote
    pub voting_power: VotingPowerCurve,
    pub outcome: Option<TallyOutcome>,
    pub finalized_at: Option<Timestamp>,
    pub executed_at: Option<Timestamp>,
}

impl Proposal {
    pub fn kind(&self) -> ProposalKind {
        self.action.kind()
    }
}

/// A cast vote. Weight is frozen at cast time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub proposal_id: u64,
    pub voter: Address,
    pub option: VoteOption,
    pub weight: f64,
    pub karma_at_cast: f64,
    pub cast_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn vote(voter: &str, option: VoteOption, weight: f64) -> Vote {
        Vote {
            proposal_id: 1,
            voter: Address::new(voter),
            option,
            weight,
            karma_at_cast: weight,
            cast_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_tally_from_votes() {
        let votes = [
            vote("a", VoteOption::Yes, 40.0),
            vote("b", VoteOption::No, 55.0),
            vote("c", VoteOption::NoWithVeto, 5.0),
        ];
        let tally = Tally::from_votes(&votes);
        assert_eq!(tally.yes, 40.0);
        assert_eq!(tally.no, 55.0);
        assert_eq!(tally.no_with_veto, 5.0);
        assert_eq!(tally.total_cast(), 100.0);
    }

    #[test]
    fn test_action_validation() {
        let config = EngineConfig::default();

        let empty = ProposalAction::ParameterChange { changes: vec![] };
        assert_eq!(empty.validate(&config).unwrap_err().code(), "INVALID_PROPOSAL");

        let bad_value = ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::DecayConstantSecs(0)],
        };
        assert!(bad_value.validate(&config).is_err());

        let good = ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(2.0)],
        };
        assert!(good.validate(&config).is_ok());

        let upgrade = ProposalAction::SystemUpgrade {
            version: "1.1.0".into(),
            code_hash: "not-a-hash".into(),
        };
        assert!(upgrade.validate(&config).is_err());

        let upgrade = ProposalAction::SystemUpgrade {
            version: "1.1.0".into(),
            code_hash: "ab".repeat(32),
        };
        assert!(upgrade.validate(&config).is_ok());
    }

    #[test]
    fn test_action_wire_format() {
        let action = ProposalAction::AgentSuspension {
            agent: Address::new("spammer"),
            reason: "sybil ring".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "agent_suspension");
        assert_eq!(json["payload"]["agent"], "spammer");
        assert_eq!(action.kind(), ProposalKind::AgentSuspension);
    }
}
