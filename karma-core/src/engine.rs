//! The authoritative state machine.
//!
//! [`KarmaLedger::apply`] takes one authenticated [`Envelope`] and either
//! commits its full effect set or rejects it without touching state. Every
//! operation validates completely before its first mutation, and
//! recomputation of derived karma happens inside the same call.

use crate::config::EngineConfig;
use crate::error::{KarmaError, Result};
use crate::events::DomainEvent;
use crate::governance::{
    GovernanceModule, Proposal, ProposalAction, ProposalDraft, ProposalStatus, ProtocolVersion,
    TallyOutcome, Transition, Vote, VoteOption,
};
use crate::interactions::{InteractionLedger, LogOutcome};
use crate::karma::formula::rating_weight;
use crate::karma::{
    leaderboard, KarmaBreakdown, KarmaEngine, KarmaReason, KarmaScore, KarmaSnapshot, KarmaUpdate,
    LeaderboardEntry,
};
use crate::ratings::{RatingAggregator, RatingStats, RatingSubmission};
use crate::registry::{IdentityRegistry, RegistrationOutcome};
use crate::types::{
    Address, Agent, AgentMetadata, AgentProfile, Interaction, InteractionMetadata, MetadataPatch,
    Rating, Timestamp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A write operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case", tag = "operation", content = "params")]
pub enum Request {
    /// Register or re-register an identity
    Register {
        address: Address,
        metadata: AgentMetadata,
    },
    /// Partially update an identity's metadata
    UpdateMetadata {
        address: Address,
        patch: MetadataPatch,
    },
    /// Record an interaction between the caller and others
    LogInteraction {
        participants: Vec<Address>,
        interaction_type: String,
        #[serde(default)]
        metadata: InteractionMetadata,
    },
    /// Rate another participant of an interaction
    SubmitRating(RatingSubmission),
    /// Commit a decayed recomputation of an agent's karma
    RecalculateKarma { agent: Address },
    /// Open a governance proposal
    CreateProposal(ProposalDraft),
    /// Cast or replace a vote
    Vote { proposal_id: u64, option: VoteOption },
    /// Tally a proposal whose voting period has ended
    FinalizeProposal { proposal_id: u64 },
    /// Activate and finalize every due proposal
    AdvanceProposals,
    /// Apply a passed proposal's action
    ExecuteProposal { proposal_id: u64 },
    /// Withdraw an open proposal
    CancelProposal { proposal_id: u64 },
}

impl Request {
    /// Operation name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::UpdateMetadata { .. } => "update_metadata",
            Self::LogInteraction { .. } => "log_interaction",
            Self::SubmitRating(_) => "submit_rating",
            Self::RecalculateKarma { .. } => "recalculate_karma",
            Self::CreateProposal(_) => "create_proposal",
            Self::Vote { .. } => "vote",
            Self::FinalizeProposal { .. } => "finalize_proposal",
            Self::AdvanceProposals => "advance_proposals",
            Self::ExecuteProposal { .. } => "execute_proposal",
            Self::CancelProposal { .. } => "cancel_proposal",
        }
    }
}

/// An authenticated write request stamped by the ordering log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub caller: Address,
    pub timestamp: Timestamp,
    pub request: Request,
}

impl Envelope {
    pub fn new(caller: impl Into<Address>, timestamp: Timestamp, request: Request) -> Self {
        Self {
            caller: caller.into(),
            timestamp,
            request,
        }
    }
}

/// Operation-specific result of a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Outcome {
    Registered(RegistrationOutcome),
    MetadataUpdated { metadata_hash: String },
    InteractionLogged(LogOutcome),
    RatingSubmitted { rating_id: String, karma: KarmaUpdate },
    KarmaRecalculated(KarmaUpdate),
    ProposalCreated { proposal_id: u64 },
    VoteCast { weight: f64, replaced: bool },
    ProposalFinalized {
        status: ProposalStatus,
        outcome: TallyOutcome,
    },
    ProposalsAdvanced {
        activated: Vec<u64>,
        finalized: Vec<u64>,
    },
    ProposalExecuted { proposal_id: u64 },
    ProposalCancelled { proposal_id: u64 },
}

/// Result of an accepted write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Commit sequence holding this request's effects
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub outcome: Outcome,
    /// Events emitted; empty when the request changed nothing
    pub events: Vec<DomainEvent>,
}

impl Receipt {
    /// Whether the request changed state.
    pub fn committed(&self) -> bool {
        !self.events.is_empty()
    }
}

/// The complete ledger state.
#[derive(Debug, Clone, Default)]
pub struct KarmaLedger {
    config: EngineConfig,
    registry: IdentityRegistry,
    interactions: InteractionLedger,
    ratings: RatingAggregator,
    karma: KarmaEngine,
    governance: GovernanceModule,
    sequence: u64,
    last_committed: Option<Timestamp>,
}

impl KarmaLedger {
    /// Create an empty ledger with a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    /// Apply one write request.
    pub fn apply(&mut self, envelope: Envelope) -> Result<Receipt> {
        let Envelope {
            caller,
            timestamp: now,
            request,
        } = envelope;
        let operation = request.name();

        if let Some(last_committed) = self.last_committed {
            if now < last_committed {
                return Err(KarmaError::TimestampRegression {
                    timestamp: now,
                    last_committed,
                });
            }
        }

        let mut events = Vec::new();
        let result = match request {
            Request::Register { address, metadata } => {
                self.register(&caller, &address, metadata, now, &mut events)
            }
            Request::UpdateMetadata { address, patch } => {
                self.update_metadata(&caller, &address, &patch, now, &mut events)
            }
            Request::LogInteraction {
                participants,
                interaction_type,
                metadata,
            } => self.log_interaction(
                &caller,
                participants,
                &interaction_type,
                metadata,
                now,
                &mut events,
            ),
            Request::SubmitRating(submission) => {
                self.submit_rating(&caller, submission, now, &mut events)
            }
            Request::RecalculateKarma { agent } => self.recalculate_karma(&agent, now, &mut events),
            Request::CreateProposal(draft) => self.create_proposal(&caller, draft, now, &mut events),
            Request::Vote {
                proposal_id,
                option,
            } => self.vote(&caller, proposal_id, option, now, &mut events),
            Request::FinalizeProposal { proposal_id } => {
                self.finalize_proposal(proposal_id, now, &mut events)
            }
            Request::AdvanceProposals => Ok(self.advance_proposals(now, &mut events)),
            Request::ExecuteProposal { proposal_id } => {
                self.execute_proposal(proposal_id, now, &mut events)
            }
            Request::CancelProposal { proposal_id } => {
                self.cancel_proposal(&caller, proposal_id, now, &mut events)
            }
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    operation,
                    caller = %caller,
                    code = e.code(),
                    error = %e,
                    "Write rejected"
                );
                return Err(e);
            }
        };

        if events.is_empty() {
            debug!(operation, caller = %caller, "Write accepted without state change");
        } else {
            self.sequence += 1;
            self.last_committed = Some(now);
            info!(
                operation,
                caller = %caller,
                sequence = self.sequence,
                events = events.len(),
                "Write committed"
            );
        }

        Ok(Receipt {
            sequence: self.sequence,
            timestamp: now,
            outcome,
            events,
        })
    }

    fn register(
        &mut self,
        caller: &Address,
        address: &Address,
        metadata: AgentMetadata,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        let outcome = self
            .registry
            .register(&self.config.registry, caller, address, metadata, now)?;

        if outcome.created {
            events.push(DomainEvent::AgentRegistered {
                address: address.clone(),
                metadata_hash: outcome.metadata_hash.clone(),
                registered_at: now,
            });
            let update = self.karma.initialize(&self.config.karma, address, now);
            events.push(karma_event(update));
            info!(address = %address, "Agent registered");
        } else {
            events.push(DomainEvent::AgentMetadataUpdated {
                address: address.clone(),
                metadata_hash: outcome.metadata_hash.clone(),
            });
        }
        Ok(Outcome::Registered(outcome))
    }

    fn update_metadata(
        &mut self,
        caller: &Address,
        address: &Address,
        patch: &MetadataPatch,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        let metadata_hash =
            self.registry
                .update_metadata(&self.config.registry, caller, address, patch, now)?;
        events.push(DomainEvent::AgentMetadataUpdated {
            address: address.clone(),
            metadata_hash: metadata_hash.clone(),
        });
        Ok(Outcome::MetadataUpdated { metadata_hash })
    }

    fn log_interaction(
        &mut self,
        caller: &Address,
        participants: Vec<Address>,
        interaction_type: &str,
        metadata: InteractionMetadata,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        let outcome = self.interactions.log(
            &self.config.interactions,
            &self.registry,
            caller,
            participants,
            interaction_type,
            metadata,
            now,
        )?;
        if !outcome.created {
            debug!(interaction_id = %outcome.id, "Interaction already logged in this bucket");
            return Ok(Outcome::InteractionLogged(outcome));
        }

        let participants = self.interactions.get(&outcome.id)?.participants.clone();
        events.push(DomainEvent::InteractionLogged {
            interaction_id: outcome.id.clone(),
            participants: participants.clone(),
            interaction_type: interaction_type.to_string(),
        });
        for participant in &participants {
            let update = self.recompute(participant, now, KarmaReason::InteractionLogged);
            events.push(karma_event(update));
        }
        Ok(Outcome::InteractionLogged(outcome))
    }

    fn submit_rating(
        &mut self,
        rater: &Address,
        submission: RatingSubmission,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        let rater_weight = rating_weight(&self.config.karma, self.karma_of(rater, now));
        let rating = self.ratings.submit(
            &self.config.ratings,
            &self.registry,
            &self.interactions,
            rater,
            submission,
            now,
            rater_weight,
        )?;

        events.push(DomainEvent::RatingSubmitted {
            rating_id: rating.id.clone(),
            rater: rating.rater.clone(),
            rated: rating.rated.clone(),
            score: rating.score,
            interaction_id: rating.interaction_id.clone(),
        });
        let update = self.recompute(&rating.rated, now, KarmaReason::RatingReceived);
        events.push(karma_event(update.clone()));

        Ok(Outcome::RatingSubmitted {
            rating_id: rating.id,
            karma: update,
        })
    }

    fn recalculate_karma(
        &mut self,
        agent: &Address,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        self.registry.get(agent)?;
        let update = self.recompute(agent, now, KarmaReason::Recalculated);
        events.push(karma_event(update.clone()));
        Ok(Outcome::KarmaRecalculated(update))
    }

    fn create_proposal(
        &mut self,
        proposer: &Address,
        draft: ProposalDraft,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        self.registry.require_active(proposer)?;
        if let ProposalAction::AgentSuspension { agent, .. } = &draft.action {
            self.registry.get(agent)?;
        }

        let proposer_karma = self.karma_of(proposer, now);
        let quorum_base = self.quorum_base(now);
        let proposal = self.governance.create(
            &self.config,
            proposer,
            proposer_karma,
            quorum_base,
            draft,
            now,
        )?;

        events.push(DomainEvent::ProposalCreated {
            proposal_id: proposal.id,
            proposer: proposer.clone(),
            kind: proposal.kind(),
            voting_start: proposal.voting_start,
            voting_end: proposal.voting_end,
        });
        Ok(Outcome::ProposalCreated {
            proposal_id: proposal.id,
        })
    }

    fn vote(
        &mut self,
        voter: &Address,
        proposal_id: u64,
        option: VoteOption,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        self.governance.ensure_voting_open(proposal_id, now)?;
        self.registry.require_active(voter)?;

        let voter_karma = self.karma_of(voter, now);
        let cast = self.governance.cast(
            &self.config.governance,
            proposal_id,
            voter,
            voter_karma,
            option,
            now,
        )?;

        if cast.activated {
            events.push(DomainEvent::ProposalActivated { proposal_id });
        }
        events.push(DomainEvent::VoteCast {
            proposal_id,
            voter: voter.clone(),
            option,
            weight: cast.vote.weight,
            replaced: cast.replaced.is_some(),
        });
        Ok(Outcome::VoteCast {
            weight: cast.vote.weight,
            replaced: cast.replaced.is_some(),
        })
    }

    fn finalize_proposal(
        &mut self,
        proposal_id: u64,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        let result = self
            .governance
            .finalize(&self.config.governance, proposal_id, now)?;
        let status = self.governance.get(proposal_id)?.status;
        events.push(DomainEvent::ProposalFinalized {
            proposal_id,
            status,
            outcome: result.outcome,
        });
        Ok(Outcome::ProposalFinalized {
            status,
            outcome: result.outcome,
        })
    }

    fn advance_proposals(&mut self, now: Timestamp, events: &mut Vec<DomainEvent>) -> Outcome {
        let mut activated = Vec::new();
        let mut finalized = Vec::new();

        for transition in self.governance.advance(&self.config.governance, now) {
            match transition {
                Transition::Activated { proposal_id } => {
                    activated.push(proposal_id);
                    events.push(DomainEvent::ProposalActivated { proposal_id });
                }
                Transition::Finalized {
                    proposal_id,
                    result,
                } => {
                    finalized.push(proposal_id);
                    events.push(DomainEvent::ProposalFinalized {
                        proposal_id,
                        status: if result.passed() {
                            ProposalStatus::Passed
                        } else {
                            ProposalStatus::Rejected
                        },
                        outcome: result.outcome,
                    });
                }
            }
        }

        Outcome::ProposalsAdvanced {
            activated,
            finalized,
        }
    }

    fn execute_proposal(
        &mut self,
        proposal_id: u64,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        let proposal = self
            .governance
            .ensure_executable(&self.config.governance, proposal_id, now)?;
        let action = proposal.action.clone();
        let kind = proposal.kind();

        // Parameters may have moved since creation; re-check the result.
        let next_config = match action.resulting_config(&self.config) {
            Some(next) => {
                next.validate().map_err(|e| KarmaError::InvalidProposal {
                    reason: format!("resulting configuration is invalid: {e}"),
                })?;
                Some(next)
            }
            None => None,
        };
        if let ProposalAction::AgentSuspension { agent, .. } = &action {
            self.registry.get(agent)?;
        }

        self.governance.mark_executed(proposal_id, now)?;
        events.push(DomainEvent::ProposalExecuted { proposal_id, kind });

        match action {
            ProposalAction::ParameterChange { .. } => {
                if let Some(next) = next_config {
                    self.config = next;
                }
                let agents: Vec<Address> =
                    self.registry.agents().map(|a| a.address.clone()).collect();
                for agent in &agents {
                    let update = self.recompute(agent, now, KarmaReason::ParametersChanged);
                    events.push(karma_event(update));
                }
            }
            ProposalAction::GovernanceUpdate(_) => {
                if let Some(next) = next_config {
                    self.config = next;
                }
            }
            ProposalAction::AgentSuspension { agent, reason } => {
                self.registry.suspend(&agent, proposal_id, &reason, now)?;
                events.push(DomainEvent::AgentSuspended {
                    address: agent.clone(),
                    proposal_id,
                });
                info!(address = %agent, proposal_id, "Agent suspended");
            }
            ProposalAction::SystemUpgrade { version, .. } => {
                info!(proposal_id, version = %version, "Protocol version recorded");
            }
        }

        Ok(Outcome::ProposalExecuted { proposal_id })
    }

    fn cancel_proposal(
        &mut self,
        caller: &Address,
        proposal_id: u64,
        now: Timestamp,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Outcome> {
        self.governance.cancel(caller, proposal_id, now)?;
        events.push(DomainEvent::ProposalCancelled { proposal_id });
        Ok(Outcome::ProposalCancelled { proposal_id })
    }

    fn recompute(&mut self, address: &Address, now: Timestamp, reason: KarmaReason) -> KarmaUpdate {
        self.karma.recompute(
            &self.config.karma,
            address,
            &self.ratings,
            &self.interactions,
            now,
            reason,
        )
    }

    fn karma_of(&self, address: &Address, now: Timestamp) -> f64 {
        self.karma
            .karma_at(&self.config.karma, address, &self.ratings, &self.interactions, now)
    }

    // Reads. All are pure functions of committed state and `now`.

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of committed writes.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_committed(&self) -> Option<Timestamp> {
        self.last_committed
    }

    pub fn agent(&self, address: &Address) -> Result<&Agent> {
        self.registry.get(address)
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.registry.is_registered(address)
    }

    /// Agent with its karma evaluated at `now`.
    pub fn agent_profile(&self, address: &Address, now: Timestamp) -> Result<AgentProfile> {
        let agent = self.registry.get(address)?.clone();
        Ok(AgentProfile {
            karma_score: self.karma_of(address, now),
            agent,
        })
    }

    /// Karma of a registered agent with decay applied up to `now`.
    pub fn karma_at(&self, address: &Address, now: Timestamp) -> Result<f64> {
        self.registry.get(address)?;
        Ok(self.karma_of(address, now))
    }

    /// Every term of the karma formula at `now`.
    pub fn karma_breakdown(&self, address: &Address, now: Timestamp) -> Result<KarmaBreakdown> {
        self.registry.get(address)?;
        Ok(self.karma.breakdown(
            &self.config.karma,
            address,
            &self.ratings,
            &self.interactions,
            now,
        ))
    }

    /// Last committed score, without decay since.
    pub fn committed_karma(&self, address: &Address) -> Option<&KarmaScore> {
        self.karma.committed(address)
    }

    /// Karma snapshots, oldest first.
    pub fn karma_history(&self, address: &Address) -> Result<&[KarmaSnapshot]> {
        self.registry.get(address)?;
        Ok(self.karma.history(address))
    }

    /// All registered agents ranked by karma at `now`.
    pub fn leaderboard(&self, now: Timestamp, limit: Option<usize>) -> Vec<LeaderboardEntry> {
        leaderboard::rank(
            self.registry
                .agents()
                .map(|agent| (agent, self.karma_of(&agent.address, now))),
            limit,
        )
    }

    pub fn rating_stats(&self, address: &Address) -> Result<RatingStats> {
        self.registry.get(address)?;
        Ok(self.ratings.stats(address))
    }

    /// Ratings received by an agent, oldest first.
    pub fn ratings_for(&self, address: &Address) -> Vec<&Rating> {
        self.ratings.ratings_for(address)
    }

    /// Ratings given by an agent, oldest first.
    pub fn ratings_by(&self, address: &Address) -> Vec<&Rating> {
        self.ratings.ratings_by(address)
    }

    pub fn interaction(&self, id: &str) -> Result<&Interaction> {
        self.interactions.get(id)
    }

    /// Interactions of an agent, oldest first.
    pub fn interactions_for(&self, address: &Address) -> Vec<&Interaction> {
        self.interactions.history_for(address)
    }

    pub fn interactions_between(&self, a: &Address, b: &Address) -> Vec<&Interaction> {
        self.interactions.between(a, b)
    }

    pub fn interaction_count(&self, address: &Address) -> u64 {
        self.interactions.count_for(address)
    }

    /// Recompute an interaction's id from its stored content and compare.
    pub fn verify_interaction(&self, id: &str) -> Result<bool> {
        self.interactions.verify(id)
    }

    pub fn proposal(&self, proposal_id: u64) -> Result<&Proposal> {
        self.governance.get(proposal_id)
    }

    pub fn proposals(&self) -> Vec<&Proposal> {
        self.governance.proposals().collect()
    }

    pub fn votes(&self, proposal_id: u64) -> Vec<&Vote> {
        self.governance.votes(proposal_id)
    }

    pub fn vote_of(&self, proposal_id: u64, voter: &Address) -> Option<&Vote> {
        self.governance.vote_of(proposal_id, voter)
    }

    pub fn protocol_version(&self) -> Option<&ProtocolVersion> {
        self.governance.protocol_version()
    }

    /// Total voting power of active agents at `now`.
    pub fn quorum_base(&self, now: Timestamp) -> f64 {
        let curve = self.config.governance.voting_power;
        self.registry
            .agents()
            .filter(|agent| agent.status.is_active())
            .map(|agent| curve.power(self.karma_of(&agent.address, now)))
            .sum()
    }
}

fn karma_event(update: KarmaUpdate) -> DomainEvent {
    DomainEvent::KarmaUpdated {
        address: update.address,
        previous: update.previous,
        score: update.score,
        delta: update.delta,
        reason: update.reason,
    }
}
